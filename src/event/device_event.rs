// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use serde::{Deserialize, Serialize};

use crate::types::DeviceId;

/// Events emitted by the listener to the host.
///
/// # Examples
///
/// ```
/// use thermolink_lib::event::DeviceEvent;
/// use thermolink_lib::types::DeviceId;
///
/// let device_id = DeviceId::new("dev1").unwrap();
///
/// let discovered = DeviceEvent::discovered(device_id.clone(), Some("ht".to_string()));
/// let updated = DeviceEvent::updated(device_id.clone());
///
/// assert!(discovered.is_discovery());
/// assert_eq!(updated.device_id(), &device_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// A device the host has not configured started reporting.
    ///
    /// The host should start its onboarding workflow. It must tolerate this
    /// event for an identity it has configured in the meantime.
    DeviceDiscovered {
        /// The identity of the new device.
        device_id: DeviceId,
        /// The device type code reported on the wire, if any.
        device_type: Option<String>,
    },

    /// A configured device reported new data.
    ///
    /// Consumers should re-read the device's state from the store.
    DeviceUpdated {
        /// The identity of the updated device.
        device_id: DeviceId,
    },
}

impl DeviceEvent {
    /// Returns the device ID associated with this event.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::DeviceDiscovered { device_id, .. } | Self::DeviceUpdated { device_id } => {
                device_id
            }
        }
    }

    /// Returns `true` if this is a discovery event.
    #[must_use]
    pub fn is_discovery(&self) -> bool {
        matches!(self, Self::DeviceDiscovered { .. })
    }

    /// Returns `true` if this is an update event.
    #[must_use]
    pub fn is_update(&self) -> bool {
        matches!(self, Self::DeviceUpdated { .. })
    }

    /// Creates a device discovered event.
    #[must_use]
    pub fn discovered(device_id: DeviceId, device_type: Option<String>) -> Self {
        Self::DeviceDiscovered {
            device_id,
            device_type,
        }
    }

    /// Creates a device updated event.
    #[must_use]
    pub fn updated(device_id: DeviceId) -> Self {
        Self::DeviceUpdated { device_id }
    }
}
