// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listener counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the listener counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerStatsSnapshot {
    /// Datagrams or stream lines received.
    pub messages_received: u64,
    /// Acknowledgements sent back to UDP senders.
    pub acks_sent: u64,
    /// Acknowledgements that could not be sent.
    pub ack_failures: u64,
    /// Stream connections accepted.
    pub connections_accepted: u64,
    /// Readings applied to the device store.
    pub readings_accepted: u64,
    /// Messages dropped because they could not be decoded.
    pub decode_failures: u64,
    /// Well-formed records of an unsupported type.
    pub ignored_records: u64,
    /// Readings the device store refused.
    pub store_failures: u64,
    /// `DeviceDiscovered` events published.
    pub devices_discovered: u64,
    /// `DeviceUpdated` events published.
    pub updates_emitted: u64,
    /// Events dropped because the dispatcher queue was full.
    pub events_dropped: u64,
}

/// Thread-safe counters shared by the receive loops.
#[derive(Debug, Default)]
pub struct ListenerStats {
    messages_received: AtomicU64,
    acks_sent: AtomicU64,
    ack_failures: AtomicU64,
    connections_accepted: AtomicU64,
    readings_accepted: AtomicU64,
    decode_failures: AtomicU64,
    ignored_records: AtomicU64,
    store_failures: AtomicU64,
    devices_discovered: AtomicU64,
    updates_emitted: AtomicU64,
    events_dropped: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl ListenerStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_message(&self) {
        bump(&self.messages_received);
    }

    pub(crate) fn record_ack(&self, sent: bool) {
        bump(if sent {
            &self.acks_sent
        } else {
            &self.ack_failures
        });
    }

    pub(crate) fn record_connection(&self) {
        bump(&self.connections_accepted);
    }

    pub(crate) fn record_reading(&self) {
        bump(&self.readings_accepted);
    }

    pub(crate) fn record_decode_failure(&self) {
        bump(&self.decode_failures);
    }

    pub(crate) fn record_ignored(&self) {
        bump(&self.ignored_records);
    }

    pub(crate) fn record_store_failure(&self) {
        bump(&self.store_failures);
    }

    pub(crate) fn record_discovery(&self) {
        bump(&self.devices_discovered);
    }

    pub(crate) fn record_update(&self) {
        bump(&self.updates_emitted);
    }

    pub(crate) fn record_event_dropped(&self) {
        bump(&self.events_dropped);
    }

    /// Returns the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            acks_sent: self.acks_sent.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            ignored_records: self.ignored_records.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            devices_discovered: self.devices_discovered.load(Ordering::Relaxed),
            updates_emitted: self.updates_emitted.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(ListenerStats::new().snapshot(), ListenerStatsSnapshot::default());
    }

    #[test]
    fn counters_are_independent() {
        let stats = ListenerStats::new();
        stats.record_message();
        stats.record_message();
        stats.record_ack(true);
        stats.record_ack(false);
        stats.record_decode_failure();
        stats.record_discovery();
        stats.record_event_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.acks_sent, 1);
        assert_eq!(snapshot.ack_failures, 1);
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.devices_discovered, 1);
        assert_eq!(snapshot.events_dropped, 1);
        assert_eq!(snapshot.readings_accepted, 0);
    }

    #[test]
    fn snapshot_serializes() {
        let stats = ListenerStats::new();
        stats.record_update();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["updates_emitted"], 1);
    }
}
