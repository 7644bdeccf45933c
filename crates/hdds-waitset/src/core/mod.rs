// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core runtime building blocks (wake primitives, chunk pool).

pub mod rt;
