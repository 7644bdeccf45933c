// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service identity: the (service, instance, event) name triple.

use crate::config::MAX_IDENTIFIER_LENGTH;
use crate::{Error, Result};
use std::fmt;

/// Identifies one publish/subscribe channel.
///
/// Each part is a non-empty string of at most
/// [`MAX_IDENTIFIER_LENGTH`](crate::config::MAX_IDENTIFIER_LENGTH) bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceDescription {
    service: String,
    instance: String,
    event: String,
}

impl ServiceDescription {
    /// Validate and build a description.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hdds_waitset::ServiceDescription;
    ///
    /// let desc = ServiceDescription::new("Odometry", "Position", "Vehicle")?;
    /// assert_eq!(desc.to_string(), "Odometry/Position/Vehicle");
    /// assert!(ServiceDescription::new("", "Position", "Vehicle").is_err());
    /// # Ok::<(), hdds_waitset::Error>(())
    /// ```
    pub fn new(
        service: impl Into<String>,
        instance: impl Into<String>,
        event: impl Into<String>,
    ) -> Result<Self> {
        let desc = Self {
            service: service.into(),
            instance: instance.into(),
            event: event.into(),
        };
        validate_identifier("service", &desc.service)?;
        validate_identifier("instance", &desc.instance)?;
        validate_identifier("event", &desc.event)?;
        Ok(desc)
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn instance(&self) -> &str {
        &self.instance
    }

    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }
}

impl fmt::Display for ServiceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.service, self.instance, self.event)
    }
}

fn validate_identifier(part: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidServiceDescription(format!(
            "{} identifier is empty",
            part
        )));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(Error::InvalidServiceDescription(format!(
            "{} identifier is {} bytes (max {})",
            part,
            value.len(),
            MAX_IDENTIFIER_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_limits() {
        let max = "x".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(ServiceDescription::new(max.clone(), "i", "e").is_ok());

        let too_long = "x".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(matches!(
            ServiceDescription::new("s", too_long, "e"),
            Err(Error::InvalidServiceDescription(_))
        ));
        assert!(ServiceDescription::new("s", "i", "").is_err());
    }

    #[test]
    fn test_accessors() {
        let desc = ServiceDescription::new("Radar", "FrontLeft", "Objects").expect("valid");
        assert_eq!(desc.service(), "Radar");
        assert_eq!(desc.instance(), "FrontLeft");
        assert_eq!(desc.event(), "Objects");
    }
}
