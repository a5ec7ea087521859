// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoder for newline-delimited JSON messages.
//!
//! Each line holds one object:
//!
//! ```text
//! {"device": "dev2", "type": "ht", "data": {"t": 21.3, "h": 45.6}}
//! ```
//!
//! The envelope is validated strictly (`device`, `type` and `data` must be
//! present with the right JSON types). Inside `data`, each measurement is
//! taken only if it is a number; anything else is skipped on its own.

use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::types::DeviceId;

use super::{DEVICE_TYPE_HT, Decoded, Reading};

/// Device types accepted by this decoder.
const SUPPORTED_DEVICE_TYPES: [&str; 1] = [DEVICE_TYPE_HT];

/// Key of the temperature value inside `data`.
const KEY_TEMPERATURE: &str = "t";

/// Key of the humidity value inside `data`.
const KEY_HUMIDITY: &str = "h";

pub(super) fn decode(raw: &[u8]) -> Result<Decoded, DecodeError> {
    let value: Value = serde_json::from_slice(raw)?;
    let Value::Object(envelope) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let device = required_str(&envelope, "device")?;
    let device_id = DeviceId::new(device).ok_or(DecodeError::EmptyDeviceId)?;

    let device_type = required_str(&envelope, "type")?.trim();
    let Some(device_type) = SUPPORTED_DEVICE_TYPES
        .iter()
        .find(|supported| supported.eq_ignore_ascii_case(device_type))
    else {
        return Err(DecodeError::UnsupportedDeviceType(device_type.to_string()));
    };

    let data = match envelope.get("data") {
        None => return Err(DecodeError::MissingField("data")),
        Some(Value::Object(data)) => data,
        Some(_) => {
            return Err(DecodeError::InvalidFieldType {
                field: "data",
                expected: "object",
            });
        }
    };

    let mut reading = Reading::new(device_id).with_device_type(*device_type);
    reading.temperature_c = number(data, KEY_TEMPERATURE);
    reading.humidity_percent = number(data, KEY_HUMIDITY);

    Ok(Decoded::Reading(reading))
}

fn required_str<'a>(
    envelope: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, DecodeError> {
    match envelope.get(field) {
        None => Err(DecodeError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(DecodeError::InvalidFieldType {
            field,
            expected: "string",
        }),
    }
}

fn number(data: &Map<String, Value>, key: &str) -> Option<f64> {
    data.get(key).and_then(Value::as_f64)
}
