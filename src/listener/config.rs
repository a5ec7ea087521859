// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listener configuration.

use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decoder::Decoder;
use crate::error::ConfigError;

/// Default port sensors push to.
pub const DEFAULT_PORT: u16 = 55355;

/// Default address the listener binds to.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

const DEFAULT_GRACE_PERIOD_MS: u64 = 2_000;
const DEFAULT_MAX_LINE_BYTES: usize = 4096;
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Transport the listener accepts messages on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// One message per datagram; every datagram is acknowledged.
    #[default]
    Udp,
    /// Newline-delimited messages over accepted stream connections.
    Tcp,
}

impl Transport {
    /// Returns the decoder conventionally paired with this transport.
    #[must_use]
    pub fn default_decoder(self) -> Decoder {
        match self {
            Self::Udp => Decoder::DelimitedText,
            Self::Tcp => Decoder::JsonLine,
        }
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Udp => f.write_str("udp"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// Configuration for a [`Listener`](super::Listener).
///
/// Every field has a default, so a configuration document only needs to name
/// what it changes.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use thermolink_lib::listener::{ListenerConfig, Transport};
///
/// // UDP with the delimited-text format on the default port
/// let config = ListenerConfig::default();
/// assert_eq!(config.port, 55355);
///
/// // TCP with JSON lines
/// let config = ListenerConfig::tcp(9000)
///     .with_bind_address("127.0.0.1")
///     .with_grace_period(Duration::from_millis(500))
///     .with_max_devices(64);
/// assert_eq!(config.transport, Transport::Tcp);
///
/// // From a JSON document
/// let config = ListenerConfig::from_json_str(r#"{"transport": "tcp", "port": 9000}"#).unwrap();
/// assert_eq!(config.port, 9000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerConfig {
    /// IP address to bind to.
    pub bind_address: String,
    /// Port to bind to. `0` picks an ephemeral port.
    pub port: u16,
    /// Transport to listen on.
    pub transport: Transport,
    /// Wire format of inbound messages.
    pub decoder: Decoder,
    /// How long `stop()` waits for the receive loop and for a subscriber
    /// still handling an event, in milliseconds.
    pub grace_period_ms: u64,
    /// Longest accepted stream line, excluding the newline.
    pub max_line_bytes: usize,
    /// Maximum number of devices the store admits (None = unlimited).
    pub max_devices: Option<usize>,
    /// Events waiting for the dispatcher before new ones are dropped.
    pub event_queue_capacity: usize,
}

impl ListenerConfig {
    /// Creates a UDP configuration with the delimited-text decoder.
    #[must_use]
    pub fn udp(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Creates a TCP configuration with the JSON-line decoder.
    #[must_use]
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            transport: Transport::Tcp,
            decoder: Transport::Tcp.default_decoder(),
            ..Self::default()
        }
    }

    /// Parses a configuration from a JSON document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown fields,
    /// and [`ConfigError::InvalidValue`] if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the bind address.
    #[must_use]
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the decoder.
    ///
    /// Use this to pair a transport with the other wire format.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period_ms = u64::try_from(grace_period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the maximum stream line length.
    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Caps the number of devices the store admits.
    #[must_use]
    pub fn with_max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = Some(max_devices);
        self
    }

    /// Sets how many events may wait for the dispatcher.
    #[must_use]
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().parse::<IpAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "bind_address",
                message: format!("{:?} is not an IP address", self.bind_address),
            });
        }

        if self.max_line_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_line_bytes",
                message: "must be greater than zero".to_string(),
            });
        }

        if self.max_devices == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_devices",
                message: "must be greater than zero when set".to_string(),
            });
        }

        if self.event_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_queue_capacity",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            transport: Transport::Udp,
            decoder: Transport::Udp.default_decoder(),
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_devices: None,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ListenerConfig::default();

        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.transport, Transport::Udp);
        assert_eq!(config.decoder, Decoder::DelimitedText);
        assert_eq!(config.grace_period(), Duration::from_secs(2));
        assert_eq!(config.max_line_bytes, 4096);
        assert_eq!(config.max_devices, None);
        assert_eq!(config.event_queue_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn transport_constructors_pick_matching_decoder() {
        let udp = ListenerConfig::udp(1234);
        assert_eq!(udp.port, 1234);
        assert_eq!(udp.decoder, Decoder::DelimitedText);

        let tcp = ListenerConfig::tcp(1234);
        assert_eq!(tcp.transport, Transport::Tcp);
        assert_eq!(tcp.decoder, Decoder::JsonLine);
    }

    #[test]
    fn builder_methods() {
        let config = ListenerConfig::udp(0)
            .with_bind_address("127.0.0.1")
            .with_port(4000)
            .with_decoder(Decoder::JsonLine)
            .with_grace_period(Duration::from_millis(250))
            .with_max_line_bytes(128)
            .with_max_devices(8);

        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.decoder, Decoder::JsonLine);
        assert_eq!(config.grace_period_ms, 250);
        assert_eq!(config.max_line_bytes, 128);
        assert_eq!(config.max_devices, Some(8));
    }

    #[test]
    fn from_json_fills_defaults() {
        let config =
            ListenerConfig::from_json_str(r#"{"transport": "tcp", "decoder": "json_line"}"#)
                .unwrap();

        assert_eq!(config.transport, Transport::Tcp);
        assert_eq!(config.decoder, Decoder::JsonLine);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    }

    #[test]
    fn from_json_rejects_unknown_fields() {
        let err = ListenerConfig::from_json_str(r#"{"prot": 1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let err = ListenerConfig::default()
            .with_bind_address("not-an-ip")
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "bind_address",
                ..
            }
        ));

        let err = ListenerConfig::default()
            .with_max_line_bytes(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "max_line_bytes",
                ..
            }
        ));

        let err = ListenerConfig::default()
            .with_max_devices(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "max_devices",
                ..
            }
        ));

        let err = ListenerConfig::default()
            .with_event_queue_capacity(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "event_queue_capacity",
                ..
            }
        ));
    }

    #[test]
    fn transport_display() {
        assert_eq!(Transport::Udp.to_string(), "udp");
        assert_eq!(Transport::Tcp.to_string(), "tcp");
    }
}
