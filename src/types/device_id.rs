// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identifier type.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a physical sensor, as reported by the sensor itself.
///
/// The identifier is opaque text. It is trimmed on construction and is
/// guaranteed to be non-empty, so it can be used directly as a map key.
///
/// # Examples
///
/// ```
/// use thermolink_lib::types::DeviceId;
///
/// let id = DeviceId::new("  kitchen-01 ").unwrap();
/// assert_eq!(id.as_str(), "kitchen-01");
///
/// assert!(DeviceId::new("   ").is_none());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device identifier from raw text.
    ///
    /// Returns `None` when the text is empty after trimming.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({:?})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeviceId {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value).ok_or("device id must not be empty")
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_whitespace() {
        let id = DeviceId::new("\tsensor-7\r\n").unwrap();
        assert_eq!(id.as_str(), "sensor-7");
    }

    #[test]
    fn new_rejects_blank() {
        assert!(DeviceId::new("").is_none());
        assert!(DeviceId::new(" \t ").is_none());
    }

    #[test]
    fn display_and_debug_format() {
        let id = DeviceId::new("dev1").unwrap();
        assert_eq!(id.to_string(), "dev1");
        assert_eq!(format!("{id:?}"), "DeviceId(\"dev1\")");
    }

    #[test]
    fn hash_lookup_by_str() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(DeviceId::new("dev1").unwrap());
        assert!(set.contains("dev1"));
        assert!(!set.contains("dev2"));
    }

    #[test]
    fn serde_rejects_empty_id() {
        let id: DeviceId = serde_json::from_str("\" dev1 \"").unwrap();
        assert_eq!(id.as_str(), "dev1");

        assert!(serde_json::from_str::<DeviceId>("\"  \"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"dev1\"");
    }
}
