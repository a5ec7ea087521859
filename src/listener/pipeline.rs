// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-message processing shared by all transports.

use std::sync::Arc;

use crate::decoder::{Decoded, Decoder};
use crate::discovery::{DeviceRegistry, DiscoveryTracker};
use crate::event::DeviceEvent;
use crate::state::DeviceStore;

use super::stats::ListenerStats;

/// Longest payload excerpt written to the log for a rejected message.
const LOG_PREVIEW_CHARS: usize = 64;

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The reading was stored. Carries the event to emit, if any.
    Stored(Option<DeviceEvent>),
    /// A well-formed record of an unsupported type.
    Ignored,
    /// The message could not be decoded.
    Invalid,
    /// The device store refused the reading.
    Rejected,
}

impl ProcessOutcome {
    /// Returns the event to emit, if any.
    #[must_use]
    pub fn into_event(self) -> Option<DeviceEvent> {
        match self {
            Self::Stored(event) => event,
            Self::Ignored | Self::Invalid | Self::Rejected => None,
        }
    }
}

/// Decodes a raw message, stores the reading and decides which event follows.
///
/// The pipeline is synchronous and never fails: every per-message problem is
/// logged, counted and turned into a [`ProcessOutcome`].
pub struct MessagePipeline {
    decoder: Decoder,
    store: Arc<DeviceStore>,
    registry: Arc<dyn DeviceRegistry>,
    tracker: Arc<DiscoveryTracker>,
    stats: Arc<ListenerStats>,
}

impl MessagePipeline {
    /// Creates a pipeline over shared components.
    #[must_use]
    pub fn new(
        decoder: Decoder,
        store: Arc<DeviceStore>,
        registry: Arc<dyn DeviceRegistry>,
        tracker: Arc<DiscoveryTracker>,
        stats: Arc<ListenerStats>,
    ) -> Self {
        Self {
            decoder,
            store,
            registry,
            tracker,
            stats,
        }
    }

    /// Processes one message received at `now` (UTC seconds).
    pub fn process(&self, raw: &[u8], now: i64) -> ProcessOutcome {
        let reading = match self.decoder.decode(raw, now) {
            Ok(Decoded::Reading(reading)) => reading,
            Ok(Decoded::Ignored(record)) => {
                self.stats.record_ignored();
                tracing::debug!(
                    device_id = %record.device_id,
                    record_type = %record.record_type,
                    "Ignoring unsupported record type"
                );
                return ProcessOutcome::Ignored;
            }
            Err(e) => {
                self.stats.record_decode_failure();
                tracing::warn!(
                    decoder = self.decoder.name(),
                    error = %e,
                    payload = %preview(raw),
                    "Dropping undecodable message"
                );
                return ProcessOutcome::Invalid;
            }
        };

        let (state, was_new) = match self.store.upsert(&reading, now) {
            Ok(result) => result,
            Err(e) => {
                self.stats.record_store_failure();
                tracing::warn!(device_id = %reading.device_id, error = %e, "Dropping reading");
                return ProcessOutcome::Rejected;
            }
        };
        self.stats.record_reading();
        tracing::debug!(
            device_id = %state.device_id(),
            temperature = ?state.temperature_c(),
            humidity = ?state.humidity_percent(),
            was_new,
            "Stored reading"
        );

        // Discovery is consumed here even if the event never gets published
        let device_id = reading.device_id;
        let event = if self.registry.is_device_registered(&device_id) {
            Some(DeviceEvent::updated(device_id))
        } else if was_new && self.tracker.should_trigger(&device_id, false) {
            Some(DeviceEvent::discovered(device_id, reading.device_type))
        } else {
            None
        };

        ProcessOutcome::Stored(event)
    }
}

impl std::fmt::Debug for MessagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePipeline")
            .field("decoder", &self.decoder)
            .field("devices", &self.store.len())
            .finish_non_exhaustive()
    }
}

fn preview(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim()
        .chars()
        .take(LOG_PREVIEW_CHARS)
        .collect()
}
