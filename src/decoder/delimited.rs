// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoder for the semicolon-delimited text format.
//!
//! Layout: `<ts>;<record_type>;<device_id>[;<temp_x10>[;<hum_x10>]]`
//!
//! - `ts` is absolute UTC seconds, or a negative age in seconds relative to
//!   now. Empty or unparsable means now.
//! - `record_type` is `11` or `ht` (case-insensitive) for humidity/temperature
//!   records. Other types are ignored.
//! - `temp_x10` and `hum_x10` are integers holding the value times ten.

use crate::error::DecodeError;
use crate::types::DeviceId;

use super::{DEVICE_TYPE_HT, Decoded, IgnoredRecord, Reading};

/// Record type codes accepted as humidity/temperature records.
const HT_RECORD_TYPES: [&str; 2] = ["11", DEVICE_TYPE_HT];

pub(super) fn decode(raw: &[u8], now: i64) -> Result<Decoded, DecodeError> {
    let text = String::from_utf8_lossy(raw);
    let parts: Vec<&str> = text.trim().split(';').collect();

    if parts.len() < 3 {
        return Err(DecodeError::TooFewFields { found: parts.len() });
    }

    let device_id = DeviceId::new(parts[2]).ok_or(DecodeError::EmptyDeviceId)?;

    let record_type = parts[1].trim();
    if !is_ht_record(record_type) {
        return Ok(Decoded::Ignored(IgnoredRecord {
            device_id,
            record_type: record_type.to_string(),
        }));
    }

    let mut reading = Reading::new(device_id)
        .with_device_type(DEVICE_TYPE_HT)
        .with_measurement_time(measurement_time(parts[0], now));

    reading.temperature_c = parts.get(3).copied().and_then(scaled_value);
    reading.humidity_percent = parts.get(4).copied().and_then(scaled_value);

    Ok(Decoded::Reading(reading))
}

fn is_ht_record(record_type: &str) -> bool {
    HT_RECORD_TYPES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(record_type))
}

/// Resolves the timestamp field against `now`.
fn measurement_time(raw: &str, now: i64) -> i64 {
    match raw.trim().parse::<i64>() {
        Ok(age) if age < 0 => now.saturating_add(age),
        Ok(absolute) => absolute,
        Err(_) => now,
    }
}

/// Parses a value transmitted as an integer times ten.
#[allow(clippy::cast_precision_loss)]
fn scaled_value(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .map(|tenths| tenths as f64 / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn reading(raw: &str) -> Reading {
        match decode(raw.as_bytes(), NOW) {
            Ok(Decoded::Reading(reading)) => reading,
            other => panic!("expected a reading, got {other:?}"),
        }
    }

    #[test]
    fn full_record() {
        let r = reading("1699999000;ht;dev1;213;455");
        assert_eq!(r.device_id.as_str(), "dev1");
        assert_eq!(r.device_type.as_deref(), Some("ht"));
        assert_eq!(r.measurement_time, Some(1_699_999_000));
        assert_eq!(r.temperature_c, Some(21.3));
        assert_eq!(r.humidity_percent, Some(45.5));
    }

    #[test]
    fn negative_timestamp_is_relative_to_now() {
        for age in [-1, -40, -3600] {
            let r = reading(&format!("{age};ht;dev1;213;455"));
            assert_eq!(r.measurement_time, Some(NOW + age));
        }
    }

    #[test]
    fn dash_timestamp_defaults_to_now() {
        let r = reading("-;ht;dev1;213;455");
        assert_eq!(r.measurement_time, Some(NOW));
        assert_eq!(r.temperature_c, Some(21.3));
        assert_eq!(r.humidity_percent, Some(45.5));
    }

    #[test]
    fn empty_timestamp_defaults_to_now() {
        let r = reading(";ht;dev1;213");
        assert_eq!(r.measurement_time, Some(NOW));
    }

    #[test]
    fn record_type_is_case_insensitive() {
        assert_eq!(reading("0;HT;dev1").device_id.as_str(), "dev1");
        assert_eq!(reading("0;Ht;dev1").device_id.as_str(), "dev1");
        assert_eq!(reading("0;11;dev1").device_id.as_str(), "dev1");
    }

    #[test]
    fn unsupported_record_type_is_ignored() {
        let decoded = decode(b"100;99;dev1;213;455", NOW).unwrap();
        assert_eq!(
            decoded,
            Decoded::Ignored(IgnoredRecord {
                device_id: DeviceId::new("dev1").unwrap(),
                record_type: "99".to_string(),
            })
        );
    }

    #[test]
    fn missing_values_are_absent() {
        let r = reading("100;ht;dev1");
        assert_eq!(r.temperature_c, None);
        assert_eq!(r.humidity_percent, None);

        let r = reading("100;ht;dev1;;455");
        assert_eq!(r.temperature_c, None);
        assert_eq!(r.humidity_percent, Some(45.5));
    }

    #[test]
    fn unparsable_values_are_absent() {
        let r = reading("100;ht;dev1;abc;4x5");
        assert_eq!(r.temperature_c, None);
        assert_eq!(r.humidity_percent, None);
        assert_eq!(r.measurement_time, Some(100));
    }

    #[test]
    fn negative_temperature() {
        let r = reading("100;ht;dev1;-52;900");
        assert_eq!(r.temperature_c, Some(-5.2));
        assert_eq!(r.humidity_percent, Some(90.0));
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let r = reading("  100 ; ht ; dev 1 ; 213 ; 455 \r\n");
        assert_eq!(r.device_id.as_str(), "dev 1");
        assert_eq!(r.measurement_time, Some(100));
        assert_eq!(r.temperature_c, Some(21.3));
        assert_eq!(r.humidity_percent, Some(45.5));
    }

    #[test]
    fn too_few_fields_is_an_error() {
        assert!(matches!(
            decode(b"100;ht", NOW),
            Err(DecodeError::TooFewFields { found: 2 })
        ));
        assert!(matches!(
            decode(b"", NOW),
            Err(DecodeError::TooFewFields { found: 1 })
        ));
    }

    #[test]
    fn empty_device_id_is_an_error() {
        assert!(matches!(
            decode(b"100;ht; ;213", NOW),
            Err(DecodeError::EmptyDeviceId)
        ));
        // Checked before the record type
        assert!(matches!(
            decode(b"100;99;;213", NOW),
            Err(DecodeError::EmptyDeviceId)
        ));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let r = match decode(b"100;ht;dev\xff;213", NOW).unwrap() {
            Decoded::Reading(r) => r,
            Decoded::Ignored(_) => panic!("expected a reading"),
        };
        assert_eq!(r.device_id.as_str(), "dev\u{fffd}");
    }

    #[test]
    fn extra_fields_are_ignored() {
        let r = reading("100;ht;dev1;213;455;extra;fields");
        assert_eq!(r.humidity_percent, Some(45.5));
    }
}
