// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ThermoLink` Lib - Ingestion core for DIY temperature/humidity sensors.
//!
//! Small sensors push readings over the local network. This library receives
//! them, keeps the latest state of every sensor and tells the host when a
//! sensor reports for the first time or updates its values.
//!
//! # Wire Formats
//!
//! - **UDP, delimited text**: `<ts>;<type>;<device_id>[;<temp_x10>[;<hum_x10>]]`,
//!   acknowledged with `"<utc_seconds>;1"`
//! - **TCP, JSON lines**: `{"device": "<id>", "type": "ht", "data": {"t": 21.3, "h": 45.6}}`,
//!   not acknowledged
//!
//! # Components
//!
//! - [`Listener`] - Owns the socket and runs every message through the pipeline
//! - [`Decoder`] - Turns one raw message into a [`Reading`](decoder::Reading)
//! - [`DeviceStore`] - Latest merged state per device
//! - [`DiscoveryTracker`] - Fires discovery at most once per unknown device
//! - [`NotificationBus`] - Delivers [`DeviceEvent`]s to subscribers
//!
//! # Quick Start
//!
//! ```no_run
//! use thermolink_lib::discovery::SharedRegistry;
//! use thermolink_lib::subscription::Topic;
//! use thermolink_lib::{DeviceEvent, Listener, ListenerConfig};
//!
//! #[tokio::main]
//! async fn main() -> thermolink_lib::Result<()> {
//!     // Devices the host has already configured
//!     let registry = SharedRegistry::new();
//!
//!     let listener = Listener::builder()
//!         .config(ListenerConfig::udp(55355))
//!         .registry(registry.clone())
//!         .build()?;
//!
//!     let store = listener.store().clone();
//!     listener.bus().subscribe(Topic::device_updated(), move |event: &DeviceEvent| {
//!         if let Some(state) = store.get(event.device_id()) {
//!             println!("{}: {:?} C", state.device_id(), state.temperature_c());
//!         }
//!     });
//!
//!     let onboarding = registry.clone();
//!     listener.bus().subscribe(Topic::device_discovered(), move |event: &DeviceEvent| {
//!         // Accept every new sensor
//!         onboarding.register(event.device_id().clone());
//!     });
//!
//!     listener.start_configured().await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
//!     listener.stop().await;
//!     Ok(())
//! }
//! ```

pub mod decoder;
pub mod discovery;
pub mod error;
pub mod event;
pub mod listener;
pub mod state;
pub mod subscription;
pub mod types;

pub use decoder::{Decoded, Decoder, Reading};
pub use discovery::{DeviceRegistry, DiscoveryTracker, SharedRegistry};
pub use error::{BindError, ConfigError, DecodeError, Error, Result, StoreError};
pub use event::DeviceEvent;
pub use listener::{Listener, ListenerBuilder, ListenerConfig, ListenerState, Transport};
pub use state::{DeviceState, DeviceStore};
pub use subscription::{NotificationBus, Subscription, SubscriptionId, Topic};
pub use types::{Clock, DeviceId, FixedClock, SystemClock};
