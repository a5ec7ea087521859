// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall-clock source in UTC seconds.
//!
//! All timestamps handled by the library are Unix seconds (`i64`). The
//! listener reads the clock once per inbound message, so the acknowledgement
//! and the stored `received_time` of that message always agree.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// A source of the current UTC time in seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time as Unix seconds.
    fn now_utc(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock returning a settable fixed time.
///
/// Useful for deterministic tests of timestamp handling.
///
/// # Examples
///
/// ```
/// use thermolink_lib::types::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1_700_000_000);
/// assert_eq!(clock.now_utc(), 1_700_000_000);
///
/// clock.advance(30);
/// assert_eq!(clock.now_utc(), 1_700_000_030);
/// ```
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    /// Creates a clock frozen at `now` (Unix seconds).
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the clock forward by `secs` seconds.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_utc() > 1_577_836_800);
    }

    #[test]
    fn fixed_clock_set_and_advance() {
        let clock = FixedClock::new(100);
        clock.advance(-40);
        assert_eq!(clock.now_utc(), 60);

        clock.set(5);
        assert_eq!(clock.now_utc(), 5);
    }
}
