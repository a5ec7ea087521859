// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notification topics.

use std::fmt;

use crate::types::DeviceId;

const DEVICE_DISCOVERED: &str = "device_discovered";
const DEVICE_UPDATED: &str = "device_updated";

/// Name of a notification channel on the [`NotificationBus`](super::NotificationBus).
///
/// Topics are plain strings; the constructors below name the ones the
/// listener publishes to.
///
/// # Examples
///
/// ```
/// use thermolink_lib::subscription::Topic;
/// use thermolink_lib::types::DeviceId;
///
/// let id = DeviceId::new("dev1").unwrap();
/// assert_eq!(Topic::device_updated_for(&id).as_str(), "device_updated/dev1");
/// assert_eq!(Topic::from("custom").as_str(), "custom");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Creates a topic from any name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Topic carrying every `DeviceDiscovered` event.
    #[must_use]
    pub fn device_discovered() -> Self {
        Self::new(DEVICE_DISCOVERED)
    }

    /// Topic carrying every `DeviceUpdated` event, for all devices.
    #[must_use]
    pub fn device_updated() -> Self {
        Self::new(DEVICE_UPDATED)
    }

    /// Topic carrying `DeviceUpdated` events of a single device.
    #[must_use]
    pub fn device_updated_for(device_id: &DeviceId) -> Self {
        Self(format!("{DEVICE_UPDATED}/{device_id}"))
    }

    /// Returns the topic name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Topic {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_topics() {
        assert_eq!(Topic::device_discovered().as_str(), "device_discovered");
        assert_eq!(Topic::device_updated().as_str(), "device_updated");
    }

    #[test]
    fn per_device_topics_differ() {
        let a = Topic::device_updated_for(&DeviceId::new("a").unwrap());
        let b = Topic::device_updated_for(&DeviceId::new("b").unwrap());
        assert_ne!(a, b);
        assert_ne!(a, Topic::device_updated());
        assert_eq!(a.to_string(), "device_updated/a");
    }
}
