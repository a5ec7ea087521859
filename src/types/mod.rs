// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the library.
//!
//! # Types
//!
//! - [`DeviceId`] - Trimmed, non-empty sensor identity
//! - [`Clock`] - Source of the current UTC time, with [`SystemClock`] and
//!   [`FixedClock`] implementations

mod clock;
mod device_id;

pub use clock::{Clock, FixedClock, SystemClock};
pub use device_id::DeviceId;
