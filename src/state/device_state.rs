// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Last known state of one sensor.

use serde::{Deserialize, Serialize};

use crate::decoder::Reading;
use crate::types::DeviceId;

/// Latest known state of a sensor.
///
/// Measured fields are optional because a sensor may report them in separate
/// messages. Applying a [`Reading`] only overwrites the fields the reading
/// carries; `received_time` is refreshed on every applied reading.
///
/// # Examples
///
/// ```
/// use thermolink_lib::decoder::Reading;
/// use thermolink_lib::state::DeviceState;
/// use thermolink_lib::types::DeviceId;
///
/// let id = DeviceId::new("dev1").unwrap();
/// let mut state = DeviceState::new(id.clone());
///
/// state.apply(&Reading::new(id.clone()).with_temperature(21.3), 100);
/// state.apply(&Reading::new(id).with_humidity(45.6), 160);
///
/// assert_eq!(state.temperature_c(), Some(21.3));
/// assert_eq!(state.humidity_percent(), Some(45.6));
/// assert_eq!(state.received_time(), 160);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    device_id: DeviceId,
    device_type: Option<String>,
    temperature_c: Option<f64>,
    humidity_percent: Option<f64>,
    /// Measurement time claimed by the device (UTC seconds).
    measurement_time: Option<i64>,
    /// Time the last message was accepted (UTC seconds).
    received_time: i64,
}

impl DeviceState {
    /// Creates an empty state for a device that has not reported yet.
    #[must_use]
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            device_type: None,
            temperature_c: None,
            humidity_percent: None,
            measurement_time: None,
            received_time: 0,
        }
    }

    /// Returns the device identity.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Returns the last reported device type code.
    #[must_use]
    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref()
    }

    /// Returns the last reported temperature in degrees Celsius.
    #[must_use]
    pub fn temperature_c(&self) -> Option<f64> {
        self.temperature_c
    }

    /// Returns the last reported relative humidity in percent.
    #[must_use]
    pub fn humidity_percent(&self) -> Option<f64> {
        self.humidity_percent
    }

    /// Returns the last measurement time claimed by the device.
    #[must_use]
    pub fn measurement_time(&self) -> Option<i64> {
        self.measurement_time
    }

    /// Returns when the last message for this device was accepted.
    #[must_use]
    pub fn received_time(&self) -> i64 {
        self.received_time
    }

    /// Merges a reading into this state.
    ///
    /// Fields absent from the reading keep their stored values.
    /// `received_time` is always updated.
    ///
    /// Returns `true` if any measured value changed.
    pub fn apply(&mut self, reading: &Reading, received_time: i64) -> bool {
        let mut changed = false;

        if let Some(device_type) = &reading.device_type {
            self.device_type = Some(device_type.clone());
        }
        if let Some(time) = reading.measurement_time {
            self.measurement_time = Some(time);
        }
        if let Some(celsius) = reading.temperature_c {
            changed |= self.temperature_c != Some(celsius);
            self.temperature_c = Some(celsius);
        }
        if let Some(percent) = reading.humidity_percent {
            changed |= self.humidity_percent != Some(percent);
            self.humidity_percent = Some(percent);
        }

        self.received_time = received_time;
        changed
    }
}
