// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events emitted to the host.
//!
//! The listener publishes [`DeviceEvent`]s on the
//! [`NotificationBus`](crate::subscription::NotificationBus):
//!
//! - [`DeviceEvent::DeviceDiscovered`] on [`Topic::device_discovered`](crate::subscription::Topic::device_discovered)
//! - [`DeviceEvent::DeviceUpdated`] on [`Topic::device_updated`](crate::subscription::Topic::device_updated)
//!   and on the device's own [`Topic::device_updated_for`](crate::subscription::Topic::device_updated_for)

mod device_event;

pub use device_event::DeviceEvent;
