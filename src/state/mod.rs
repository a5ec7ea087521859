// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking.
//!
//! [`DeviceState`] holds the latest known values of one sensor and
//! [`DeviceStore`] owns the states of all sensors seen by the process.
//! State is memory-resident only; it is rebuilt from the next packet after a
//! restart.
//!
//! # Examples
//!
//! ```
//! use thermolink_lib::decoder::Reading;
//! use thermolink_lib::state::DeviceStore;
//! use thermolink_lib::types::DeviceId;
//!
//! let store = DeviceStore::new();
//! let id = DeviceId::new("dev2").unwrap();
//!
//! store.upsert(&Reading::new(id.clone()).with_temperature(21.3), 1).unwrap();
//! store.upsert(&Reading::new(id.clone()).with_humidity(45.6), 2).unwrap();
//!
//! let state = store.get(&id).unwrap();
//! assert_eq!(state.temperature_c(), Some(21.3));
//! assert_eq!(state.humidity_percent(), Some(45.6));
//! ```

mod device_state;
mod store;

pub use device_state::DeviceState;
pub use store::DeviceStore;
