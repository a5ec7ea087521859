// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery of previously unseen sensors.
//!
//! When a sensor the host has not configured yet starts reporting, the
//! listener emits a one-shot [`DeviceEvent::DeviceDiscovered`] so the host can
//! run its onboarding workflow. Two pieces decide this:
//!
//! - [`DeviceRegistry`] - the host's answer to "is this device configured?"
//! - [`DiscoveryTracker`] - remembers which identities already fired, so each
//!   identity triggers at most once per process lifetime
//!
//! [`DeviceEvent::DeviceDiscovered`]: crate::event::DeviceEvent::DeviceDiscovered
//!
//! # Examples
//!
//! ```
//! use thermolink_lib::discovery::DiscoveryTracker;
//! use thermolink_lib::types::DeviceId;
//!
//! let tracker = DiscoveryTracker::new();
//! let id = DeviceId::new("dev1").unwrap();
//!
//! // Registered devices never trigger
//! assert!(!tracker.should_trigger(&id, true));
//!
//! // Unregistered devices trigger exactly once
//! assert!(tracker.should_trigger(&id, false));
//! assert!(!tracker.should_trigger(&id, false));
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::DeviceId;

/// Host query telling whether a device is already fully configured.
///
/// Any `Fn(&DeviceId) -> bool` closure is a registry.
///
/// # Examples
///
/// ```
/// use thermolink_lib::discovery::DeviceRegistry;
/// use thermolink_lib::types::DeviceId;
///
/// let registry = |id: &DeviceId| id.as_str() == "known";
/// assert!(registry.is_device_registered(&DeviceId::new("known").unwrap()));
/// ```
pub trait DeviceRegistry: Send + Sync {
    /// Returns `true` if the host has configured this device.
    fn is_device_registered(&self, device_id: &DeviceId) -> bool;
}

impl<F> DeviceRegistry for F
where
    F: Fn(&DeviceId) -> bool + Send + Sync,
{
    fn is_device_registered(&self, device_id: &DeviceId) -> bool {
        self(device_id)
    }
}

/// Registry that considers no device configured.
///
/// Every new device is then surfaced through discovery, and no
/// `DeviceUpdated` notifications are emitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegisteredDevices;

impl DeviceRegistry for NoRegisteredDevices {
    fn is_device_registered(&self, _device_id: &DeviceId) -> bool {
        false
    }
}

/// Registry backed by a shared, host-maintained set of device ids.
///
/// # Examples
///
/// ```
/// use thermolink_lib::discovery::{DeviceRegistry, SharedRegistry};
/// use thermolink_lib::types::DeviceId;
///
/// let registry = SharedRegistry::new();
/// let id = DeviceId::new("dev1").unwrap();
///
/// assert!(!registry.is_device_registered(&id));
/// registry.register(id.clone());
/// assert!(registry.is_device_registered(&id));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    ids: Arc<parking_lot::RwLock<HashSet<DeviceId>>>,
}

impl SharedRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a device as configured. Returns `false` if it already was.
    pub fn register(&self, device_id: DeviceId) -> bool {
        self.ids.write().insert(device_id)
    }

    /// Marks a device as no longer configured. Returns `true` if it was.
    pub fn unregister(&self, device_id: &DeviceId) -> bool {
        self.ids.write().remove(device_id)
    }

    /// Returns the number of configured devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    /// Returns `true` if no device is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }
}

impl DeviceRegistry for SharedRegistry {
    fn is_device_registered(&self, device_id: &DeviceId) -> bool {
        self.ids.read().contains(device_id)
    }
}

/// Remembers which device identities already triggered discovery.
///
/// A discovery trigger is fire-and-forget: once an identity has fired it is
/// never re-armed within the lifetime of the tracker, even if the host later
/// removes or never completes the configuration. Hosts are expected to ignore
/// a discovery for an identity they have already configured.
///
/// An identity is marked when its `DeviceDiscovered` event is queued, not
/// when it is delivered. An event lost to a full queue or to a listener
/// stop is therefore never retried; the listener counts only published
/// events in its statistics.
#[derive(Debug, Default)]
pub struct DiscoveryTracker {
    started: Mutex<HashSet<DeviceId>>,
}

impl DiscoveryTracker {
    /// Creates a tracker with no discovery started.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether discovery should fire for `device_id`.
    ///
    /// Returns `true` at most once per identity, and only while
    /// `is_registered` is `false`. Marking the identity as started happens
    /// in the same critical section as the check, so concurrent callers can
    /// never both receive `true`.
    pub fn should_trigger(&self, device_id: &DeviceId, is_registered: bool) -> bool {
        if is_registered {
            return false;
        }

        let first = self.started.lock().insert(device_id.clone());
        if first {
            tracing::info!(device_id = %device_id, "Discovered new device");
        } else {
            tracing::trace!(device_id = %device_id, "Discovery already started");
        }
        first
    }

    /// Returns `true` if discovery already fired for `device_id`.
    #[must_use]
    pub fn has_started(&self, device_id: &DeviceId) -> bool {
        self.started.lock().contains(device_id)
    }

    /// Returns the number of identities for which discovery fired.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.started.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> DeviceId {
        DeviceId::new(raw).unwrap()
    }

    #[test]
    fn triggers_once_for_unregistered() {
        let tracker = DiscoveryTracker::new();

        assert!(tracker.should_trigger(&id("dev1"), false));
        assert!(!tracker.should_trigger(&id("dev1"), false));
        assert!(tracker.has_started(&id("dev1")));
        assert_eq!(tracker.started_count(), 1);
    }

    #[test]
    fn registered_never_triggers() {
        let tracker = DiscoveryTracker::new();

        assert!(!tracker.should_trigger(&id("dev1"), true));
        assert!(!tracker.has_started(&id("dev1")));

        // Still eligible once the host reports it unregistered
        assert!(tracker.should_trigger(&id("dev1"), false));
    }

    #[test]
    fn not_rearmed_after_registration() {
        let tracker = DiscoveryTracker::new();

        assert!(tracker.should_trigger(&id("dev1"), false));
        assert!(!tracker.should_trigger(&id("dev1"), true));
        assert!(!tracker.should_trigger(&id("dev1"), false));
    }

    #[test]
    fn distinct_ids_trigger_independently() {
        let tracker = DiscoveryTracker::new();
        assert!(tracker.should_trigger(&id("a"), false));
        assert!(tracker.should_trigger(&id("b"), false));
        assert_eq!(tracker.started_count(), 2);
    }

    #[test]
    fn concurrent_calls_trigger_once() {
        let tracker = Arc::new(DiscoveryTracker::new());
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    tracker.should_trigger(&id("racy"), false)
                })
            })
            .collect();

        let triggered = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|t| *t)
            .count();
        assert_eq!(triggered, 1);
    }

    #[test]
    fn closure_registry() {
        let registry = |device_id: &DeviceId| device_id.as_str().starts_with("known");
        assert!(registry.is_device_registered(&id("known-1")));
        assert!(!registry.is_device_registered(&id("other")));
    }

    #[test]
    fn shared_registry_clones_share_state() {
        let registry = SharedRegistry::new();
        let view = registry.clone();

        assert!(registry.register(id("dev1")));
        assert!(!registry.register(id("dev1")));
        assert!(view.is_device_registered(&id("dev1")));
        assert_eq!(view.len(), 1);

        assert!(registry.unregister(&id("dev1")));
        assert!(view.is_empty());
        assert!(!NoRegisteredDevices.is_device_registered(&id("dev1")));
    }
}
