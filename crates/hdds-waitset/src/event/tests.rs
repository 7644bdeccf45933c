// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;

#[test]
fn test_trigger_default() {
    let trigger = Trigger::new();
    assert!(!trigger.has_triggered());
    assert!(!trigger.is_attached());
    assert_eq!(trigger.mode(), TriggerMode::AutoReset);
}

#[test]
fn test_trigger_fire_and_reset() {
    let trigger = Trigger::new();

    trigger.trigger();
    trigger.trigger();
    assert!(trigger.has_triggered());

    assert!(trigger.reset());
    assert!(!trigger.has_triggered());
    assert!(!trigger.reset(), "second reset reports nothing to clear");
}

#[test]
fn test_origin_ids_unique() {
    let a = Trigger::new();
    let b = Trigger::new();
    assert_ne!(a.origin_id(), b.origin_id());
    assert_ne!(OriginId::next(), OriginId::next());
}

#[test]
fn test_auto_reset_observe_consumes() {
    let trigger = Trigger::new();
    let source = trigger.event_source();
    let fired: EventId = TriggerEvent::Fired.into();

    trigger.trigger();
    assert!(source.is_ready(fired));
    assert!(source.is_ready(fired), "is_ready has no side effect");
    assert!(source.observe(fired));
    assert!(!source.observe(fired));
    assert!(!trigger.has_triggered());
}

#[test]
fn test_latched_observe_keeps_state() {
    let trigger = Trigger::latched();
    let source = trigger.event_source();
    let fired: EventId = TriggerEvent::Fired.into();

    trigger.trigger();
    assert!(source.observe(fired));
    assert!(source.observe(fired));
    assert!(trigger.reset());
    assert!(!source.observe(fired));
}

#[test]
fn test_trigger_rejects_unknown_event() {
    let trigger = Trigger::new();
    let source = trigger.event_source();
    let unknown = EventId::new(42);

    trigger.trigger();
    assert!(!source.is_ready(unknown));
    assert!(source.hook(unknown).is_none());
}

#[test]
fn test_handle_fires_trigger() {
    let trigger = Trigger::new();
    let handle = trigger.handle();
    assert_eq!(handle.origin_id(), trigger.origin_id());

    std::thread::spawn(move || handle.trigger())
        .join()
        .expect("firing thread");
    assert!(trigger.has_triggered());
}

#[test]
fn test_handle_outlives_trigger() {
    let trigger = Trigger::new();
    let handle = trigger.handle();
    let source = trigger.event_source();
    drop(trigger);

    handle.trigger();
    let hook = source
        .hook(TriggerEvent::Fired.into())
        .expect("trigger hook");
    assert!(hook.is_retired());
}

#[test]
fn test_event_id_display() {
    assert_eq!(EventId::new(3).to_string(), "event#3");
    assert_eq!(EventId::new(3).raw(), 3);
}
