// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Context shared by the receive loops of one binding.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::event::DeviceEvent;
use crate::types::Clock;

use super::pipeline::MessagePipeline;
use super::stats::ListenerStats;

/// Everything a receive loop needs to turn raw bytes into events.
///
/// Cloned into every connection task. Dropping the last clone closes the
/// event channel.
#[derive(Clone)]
pub(crate) struct Session {
    pub(crate) pipeline: Arc<MessagePipeline>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) stats: Arc<ListenerStats>,
    pub(crate) cancel: CancellationToken,
    pub(crate) max_line_bytes: usize,
    events: mpsc::Sender<DeviceEvent>,
}

impl Session {
    pub(crate) fn new(
        pipeline: Arc<MessagePipeline>,
        clock: Arc<dyn Clock>,
        stats: Arc<ListenerStats>,
        cancel: CancellationToken,
        max_line_bytes: usize,
        events: mpsc::Sender<DeviceEvent>,
    ) -> Self {
        Self {
            pipeline,
            clock,
            stats,
            cancel,
            max_line_bytes,
            events,
        }
    }

    /// Current time in UTC seconds.
    pub(crate) fn now(&self) -> i64 {
        self.clock.now_utc()
    }

    /// Runs one message through the pipeline and queues its event.
    ///
    /// Never waits: when the dispatcher queue is full the event is dropped
    /// and counted.
    pub(crate) fn handle(&self, raw: &[u8], now: i64) {
        self.stats.record_message();
        let Some(event) = self.pipeline.process(raw, now).into_event() else {
            return;
        };

        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.stats.record_event_dropped();
                tracing::warn!(
                    device_id = %event.device_id(),
                    "Event queue full, dropping event"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("Event dispatcher gone, dropping event");
            }
        }
    }
}
