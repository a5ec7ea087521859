// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire decoders for sensor messages.
//!
//! Sensors push one logical message at a time: a UDP datagram payload or a
//! single newline-terminated line of a TCP stream. Two wire formats exist and
//! both are exposed through the [`Decoder`] enum:
//!
//! - [`Decoder::DelimitedText`] - `<ts>;<type>;<device_id>[;<temp_x10>[;<hum_x10>]]`
//! - [`Decoder::JsonLine`] - `{"device": "<id>", "type": "ht", "data": {"t": 21.3, "h": 45.6}}`
//!
//! Decoding has three outcomes:
//!
//! - `Ok(Decoded::Reading(_))` - a measurement to store
//! - `Ok(Decoded::Ignored(_))` - a well-formed record of a type this library
//!   does not handle; drop it silently
//! - `Err(DecodeError)` - a malformed message; log it and drop it
//!
//! # Examples
//!
//! ```
//! use thermolink_lib::decoder::{Decoded, Decoder};
//!
//! let now = 1_700_000_000;
//! let decoded = Decoder::DelimitedText.decode(b"-40;ht;dev1;213;455", now).unwrap();
//!
//! if let Decoded::Reading(reading) = decoded {
//!     assert_eq!(reading.device_id.as_str(), "dev1");
//!     assert_eq!(reading.measurement_time, Some(now - 40));
//!     assert_eq!(reading.temperature_c, Some(21.3));
//!     assert_eq!(reading.humidity_percent, Some(45.5));
//! }
//! ```

mod delimited;
mod json_line;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::types::DeviceId;

/// Device type code for combined humidity/temperature sensors.
pub const DEVICE_TYPE_HT: &str = "ht";

/// A decoded, possibly partial, measurement from one inbound message.
///
/// Absent fields mean "not reported in this message", not "unknown": applying
/// a reading to stored state leaves those fields untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Identity of the reporting sensor.
    pub device_id: DeviceId,
    /// Device type code as declared by the wire format (e.g. `"ht"`).
    pub device_type: Option<String>,
    /// Measurement time claimed by the device, in UTC seconds.
    pub measurement_time: Option<i64>,
    /// Temperature in degrees Celsius.
    pub temperature_c: Option<f64>,
    /// Relative humidity in percent.
    pub humidity_percent: Option<f64>,
}

impl Reading {
    /// Creates a reading with no measured values.
    #[must_use]
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            device_type: None,
            measurement_time: None,
            temperature_c: None,
            humidity_percent: None,
        }
    }

    /// Sets the device type code.
    #[must_use]
    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    /// Sets the measurement time.
    #[must_use]
    pub fn with_measurement_time(mut self, time: i64) -> Self {
        self.measurement_time = Some(time);
        self
    }

    /// Sets the temperature in degrees Celsius.
    #[must_use]
    pub fn with_temperature(mut self, celsius: f64) -> Self {
        self.temperature_c = Some(celsius);
        self
    }

    /// Sets the relative humidity in percent.
    #[must_use]
    pub fn with_humidity(mut self, percent: f64) -> Self {
        self.humidity_percent = Some(percent);
        self
    }
}

/// A well-formed record that carries a record type this library ignores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredRecord {
    /// Identity of the sending sensor.
    pub device_id: DeviceId,
    /// The unsupported record type code, as received.
    pub record_type: String,
}

/// Successful outcome of decoding one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A measurement to apply to the device store.
    Reading(Reading),
    /// A valid record that should be dropped without a warning.
    Ignored(IgnoredRecord),
}

/// Wire format used to decode inbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decoder {
    /// Semicolon-delimited text, as sent over UDP.
    #[default]
    DelimitedText,
    /// One JSON object per line, as sent over TCP.
    JsonLine,
}

impl Decoder {
    /// Decodes a single raw message.
    ///
    /// `now` is the current UTC time in seconds. It is used when the message
    /// carries no timestamp or a relative (negative) one.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the message is malformed. Records of an
    /// unsupported type are reported as [`Decoded::Ignored`] instead.
    pub fn decode(self, raw: &[u8], now: i64) -> Result<Decoded, DecodeError> {
        match self {
            Self::DelimitedText => delimited::decode(raw, now),
            Self::JsonLine => json_line::decode(raw),
        }
    }

    /// Returns a short name for logging.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DelimitedText => "delimited_text",
            Self::JsonLine => "json_line",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_builder() {
        let id = DeviceId::new("dev1").unwrap();
        let reading = Reading::new(id.clone())
            .with_device_type(DEVICE_TYPE_HT)
            .with_temperature(20.5);

        assert_eq!(reading.device_id, id);
        assert_eq!(reading.device_type.as_deref(), Some("ht"));
        assert_eq!(reading.temperature_c, Some(20.5));
        assert_eq!(reading.humidity_percent, None);
        assert_eq!(reading.measurement_time, None);
    }

    #[test]
    fn decoder_dispatches_by_variant() {
        let text = Decoder::DelimitedText.decode(b"100;ht;dev1;200", 500);
        assert!(matches!(text, Ok(Decoded::Reading(_))));

        // The same payload is not JSON
        let json = Decoder::JsonLine.decode(b"100;ht;dev1;200", 500);
        assert!(matches!(json, Err(DecodeError::Json(_))));
    }

    #[test]
    fn decoder_deserializes_from_snake_case() {
        let decoder: Decoder = serde_json::from_str("\"json_line\"").unwrap();
        assert_eq!(decoder, Decoder::JsonLine);
        assert_eq!(Decoder::default(), Decoder::DelimitedText);
        assert_eq!(decoder.name(), "json_line");
    }
}
