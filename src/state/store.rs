// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thread-safe store of device states.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::decoder::Reading;
use crate::error::StoreError;
use crate::types::DeviceId;

use super::DeviceState;

type Entry = Arc<Mutex<DeviceState>>;

/// Source of truth for the latest state of every observed device.
///
/// The store is shared by handle (`Arc<DeviceStore>`) between the listener,
/// which writes to it, and any number of read-only consumers.
///
/// # Locking
///
/// The outer map lock is held only to look up or insert an entry. Each
/// device state sits behind its own mutex, so updates for different devices
/// proceed independently while updates for the same device are serialized.
/// Callers never lock the store themselves.
///
/// # Examples
///
/// ```
/// use thermolink_lib::decoder::Reading;
/// use thermolink_lib::state::DeviceStore;
/// use thermolink_lib::types::DeviceId;
///
/// let store = DeviceStore::new();
/// let id = DeviceId::new("dev1").unwrap();
///
/// let (state, was_new) = store
///     .upsert(&Reading::new(id.clone()).with_temperature(21.3), 100)
///     .unwrap();
/// assert!(was_new);
/// assert_eq!(state.temperature_c(), Some(21.3));
///
/// let (_, was_new) = store.upsert(&Reading::new(id.clone()), 160).unwrap();
/// assert!(!was_new);
/// assert_eq!(store.get(&id).unwrap().received_time(), 160);
/// ```
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: RwLock<HashMap<DeviceId, Entry>>,
    max_devices: Option<usize>,
}

impl DeviceStore {
    /// Creates an empty store without a device limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that admits at most `max_devices` devices.
    ///
    /// Devices already in the store keep updating once the limit is reached;
    /// only new identities are refused.
    #[must_use]
    pub fn with_max_devices(max_devices: usize) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            max_devices: Some(max_devices),
        }
    }

    /// Applies a reading to the state of its device, creating it if needed.
    ///
    /// Returns a snapshot of the updated state and whether the device was
    /// unknown to the store before this call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CapacityExceeded`] if the device is new and the
    /// store is full.
    pub fn upsert(
        &self,
        reading: &Reading,
        received_time: i64,
    ) -> Result<(DeviceState, bool), StoreError> {
        loop {
            let (entry, was_new) = self.entry(&reading.device_id)?;
            if let Some(state) = self.apply_current(&entry, reading, received_time) {
                return Ok((state, was_new));
            }
            tracing::trace!(device_id = %reading.device_id, "Device removed during update, retrying");
        }
    }

    /// Applies the reading if `entry` is still the one stored for its device.
    ///
    /// Returns `None` when [`remove`](Self::remove) detached the entry after
    /// it was looked up.
    fn apply_current(
        &self,
        entry: &Entry,
        reading: &Reading,
        received_time: i64,
    ) -> Option<DeviceState> {
        let mut state = entry.lock();
        // Entry lock is taken before the map lock here, so never queue
        // behind a waiting writer
        let current = self
            .devices
            .read_recursive()
            .get(&reading.device_id)
            .is_some_and(|stored| Arc::ptr_eq(stored, entry));
        if !current {
            return None;
        }
        state.apply(reading, received_time);
        Some(state.clone())
    }

    /// Looks up or inserts the entry for `device_id`.
    fn entry(&self, device_id: &DeviceId) -> Result<(Entry, bool), StoreError> {
        if let Some(entry) = self.devices.read().get(device_id) {
            return Ok((Arc::clone(entry), false));
        }

        let mut devices = self.devices.write();
        // Another writer may have inserted it between the two locks
        if let Some(entry) = devices.get(device_id) {
            return Ok((Arc::clone(entry), false));
        }

        if let Some(limit) = self.max_devices
            && devices.len() >= limit
        {
            return Err(StoreError::CapacityExceeded { limit });
        }

        let entry = Arc::new(Mutex::new(DeviceState::new(device_id.clone())));
        devices.insert(device_id.clone(), Arc::clone(&entry));
        Ok((entry, true))
    }

    /// Returns a snapshot of a device's state.
    #[must_use]
    pub fn get(&self, device_id: &DeviceId) -> Option<DeviceState> {
        self.devices
            .read()
            .get(device_id)
            .map(|entry| entry.lock().clone())
    }

    /// Returns `true` if the device has been observed.
    #[must_use]
    pub fn contains(&self, device_id: &DeviceId) -> bool {
        self.devices.read().contains_key(device_id)
    }

    /// Returns the number of observed devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// Returns `true` if no device has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Returns the identities of all observed devices, sorted.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.devices.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns snapshots of all device states, sorted by device id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceState> {
        let mut states: Vec<DeviceState> = self
            .devices
            .read()
            .values()
            .map(|entry| entry.lock().clone())
            .collect();
        states.sort_by(|a, b| a.device_id().cmp(b.device_id()));
        states
    }

    /// Removes a device, returning its last state.
    ///
    /// The listener never removes devices. This is meant for hosts that
    /// delete a device administratively. A later message from the same
    /// device recreates it as new.
    ///
    /// An [`upsert`](Self::upsert) racing with this call is either part of
    /// the returned state or lands in a fresh record reported as new. It is
    /// never applied to the removed record.
    pub fn remove(&self, device_id: &DeviceId) -> Option<DeviceState> {
        let entry = self.devices.write().remove(device_id)?;
        let state = entry.lock().clone();
        tracing::debug!(device_id = %device_id, "Removed device from store");
        Some(state)
    }
}
