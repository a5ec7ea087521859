// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `ThermoLink` library.
//!
//! Errors are split by how far they travel:
//!
//! - [`BindError`] is fatal to [`Listener::start`](crate::Listener::start) and
//!   is returned to the caller.
//! - [`DecodeError`] and [`StoreError`] are per-message failures. The listener
//!   logs them and drops the message; they never leave the receive loop.
//! - [`ConfigError`] reports an invalid [`ListenerConfig`](crate::ListenerConfig).
//!
//! A record with an unsupported record type is not an error at all, see
//! [`IgnoredRecord`](crate::decoder::IgnoredRecord).

use std::net::SocketAddr;

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The listener socket could not be bound.
    #[error("bind error: {0}")]
    Bind(#[from] BindError),

    /// An inbound message could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The device store rejected an update.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The listener configuration is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while binding the listener socket.
#[derive(Debug, Error)]
pub enum BindError {
    /// The bind address is not a valid IP address.
    #[error("invalid bind address: {0}")]
    InvalidAddress(String),

    /// Another socket already owns the address.
    #[error("address {addr} is already in use")]
    AddrInUse {
        /// The address that was requested.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Any other socket-level failure while binding or listening.
    #[error("failed to bind {addr}: {source}")]
    Io {
        /// The address that was requested.
        addr: SocketAddr,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl BindError {
    /// Classifies an I/O error returned while binding `addr`.
    pub(crate) fn from_io(addr: SocketAddr, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::AddrInUse {
            Self::AddrInUse { addr, source }
        } else {
            Self::Io { addr, source }
        }
    }
}

/// Errors raised while decoding a single inbound message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A delimited-text message has fewer than the three mandatory fields.
    #[error("expected at least 3 ';'-separated fields, found {found}")]
    TooFewFields {
        /// Number of fields present in the message.
        found: usize,
    },

    /// The device identity is empty after trimming.
    #[error("device id is empty")]
    EmptyDeviceId,

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON document is not an object.
    #[error("expected a JSON object")]
    NotAnObject,

    /// A mandatory field is missing.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has the wrong JSON type.
    #[error("field {field} must be of type {expected}")]
    InvalidFieldType {
        /// The offending field.
        field: &'static str,
        /// The expected JSON type.
        expected: &'static str,
    },

    /// The declared device type is not in the supported allowlist.
    #[error("unsupported device type: {0}")]
    UnsupportedDeviceType(String),

    /// A stream line exceeded the configured maximum length.
    #[error("line of {len} bytes exceeds the {max} byte limit")]
    LineTooLong {
        /// Length of the discarded line in bytes.
        len: usize,
        /// The configured limit.
        max: usize,
    },
}

/// Errors raised by the [`DeviceStore`](crate::DeviceStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Admitting a new device would exceed the configured device limit.
    #[error("device limit of {limit} reached")]
    CapacityExceeded {
        /// The configured maximum number of devices.
        limit: usize,
    },
}

/// Errors related to listener configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its allowed range.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The field that failed validation.
        field: &'static str,
        /// Description of the failure.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
