// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription system for device notifications.
//!
//! The [`NotificationBus`] lets any number of consumers learn that a device
//! was discovered or updated without the listener knowing who they are.
//!
//! # Overview
//!
//! - [`Topic`] - Name of a notification channel
//! - [`NotificationBus`] - Registry that dispatches payloads to topic handlers
//! - [`Subscription`] - Handle returned by `subscribe`, used to unsubscribe
//!
//! # Usage
//!
//! ```
//! use thermolink_lib::event::DeviceEvent;
//! use thermolink_lib::subscription::{NotificationBus, Topic};
//! use thermolink_lib::types::DeviceId;
//!
//! let bus = NotificationBus::<DeviceEvent>::new();
//! let id = DeviceId::new("dev1").unwrap();
//!
//! // An entity refreshes only when its own device changes
//! let sub = bus.subscribe(Topic::device_updated_for(&id), |event| {
//!     println!("refresh {}", event.device_id());
//! });
//!
//! bus.publish(&Topic::device_updated_for(&id), &DeviceEvent::updated(id.clone()));
//! sub.unsubscribe();
//! ```

mod bus;
mod topic;

pub use bus::{NotificationBus, Subscription, SubscriptionId};
pub use topic::Topic;
