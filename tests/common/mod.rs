// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Helpers shared by the listener integration tests.

#![allow(dead_code)]

use std::time::Duration;

use thermolink_lib::subscription::{NotificationBus, Topic};
use thermolink_lib::types::DeviceId;
use thermolink_lib::DeviceEvent;
use tokio::sync::mpsc;

/// Fixed wall clock used by the tests, in UTC seconds.
pub const NOW: i64 = 1_700_000_000;

/// Upper bound for anything the tests wait for.
pub const WAIT: Duration = Duration::from_secs(5);

/// How long "nothing happens" is observed.
pub const QUIET: Duration = Duration::from_millis(300);

pub fn id(raw: &str) -> DeviceId {
    DeviceId::new(raw).unwrap()
}

/// Polls `condition` until it holds, panicking after [`WAIT`].
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Events received on one topic, in delivery order.
pub struct Events {
    rx: mpsc::UnboundedReceiver<DeviceEvent>,
}

impl Events {
    /// Subscribes to `topic` and records every event published on it.
    pub fn collect(bus: &NotificationBus<DeviceEvent>, topic: Topic) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        bus.subscribe(topic, move |event: &DeviceEvent| {
            let _ = tx.send(event.clone());
        });
        Self { rx }
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> DeviceEvent {
        tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event channel closed")
    }

    /// Removes every event already delivered and returns how many there were.
    pub fn drain_now(&mut self) -> usize {
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    /// Asserts that no event arrives for a while.
    pub async fn assert_quiet(&mut self) {
        if let Ok(Some(event)) = tokio::time::timeout(QUIET, self.rx.recv()).await {
            panic!("unexpected event: {event:?}");
        }
    }
}
