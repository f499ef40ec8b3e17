// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `indego_lib` library.
//!
//! The hierarchy mirrors how failures are handled by the polling engine:
//!
//! - [`Error::Authentication`]: the credentials were rejected. Not fixable
//!   without operator intervention, but the engine keeps retrying on its
//!   normal schedule.
//! - [`Error::InvalidCommand`]: the server refused a command for the current
//!   device state. Logged and discarded.
//! - [`Error::Transport`]: any other I/O or network failure. Always retried.
//! - [`Error::Configuration`]: malformed startup configuration. Only returned
//!   while building the adapter, never mid-run.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The device API rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The device refused the command in its current state.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Error occurred during network communication.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error occurred while loading or validating configuration.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Error occurred while decoding a response or a command token.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A local file could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client has no session.
    #[error("not connected to the Indego server")]
    NotConnected,

    /// The client already holds a session.
    #[error("already connected to the Indego server")]
    AlreadyConnected,

    /// The polling engine is already running.
    #[error("the adapter is already started")]
    AlreadyStarted,

    /// The polling engine is not running.
    #[error("the adapter is not started")]
    NotStarted,
}

impl Error {
    /// Returns true if the failure is expected to go away on its own.
    ///
    /// Authentication and configuration failures need someone to fix them;
    /// transport failures and a lost session do not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::NotConnected)
    }
}

/// Errors related to the HTTP and MQTT transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT client request failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The server answered with an unexpected status.
    #[error("HTTP {status} - {reason}")]
    Status {
        /// The numeric HTTP status.
        status: u16,
        /// The canonical reason phrase.
        reason: String,
    },

    /// A connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A local listener could not be bound.
    #[error("failed to bind: {0}")]
    Bind(String),
}

impl TransportError {
    /// Builds a [`TransportError::Status`] from a response status.
    #[must_use]
    pub fn status(status: reqwest::StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

/// Errors related to startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML.
    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A configuration value is missing or out of range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// The offending configuration key.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors related to decoding server responses and command tokens.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A command token did not name a known command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
