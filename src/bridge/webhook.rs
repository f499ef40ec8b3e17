// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFTTT Maker webhook sink.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{BridgeEvent, EventKind, EventSink};
use crate::error::{Result, TransportError};

/// Trigger names per event kind.
///
/// A kind without a name is not forwarded; its transitions count as
/// delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IftttEvents {
    pub offline: Option<String>,
    pub online: Option<String>,
    pub state_change: Option<String>,
    pub error: Option<String>,
    pub error_cleared: Option<String>,
}

impl IftttEvents {
    /// Returns the trigger name configured for `kind`.
    #[must_use]
    pub fn name_for(&self, kind: EventKind) -> Option<&str> {
        let name = match kind {
            EventKind::Offline => &self.offline,
            EventKind::Online => &self.online,
            EventKind::StateChanged(_) => &self.state_change,
            EventKind::Error(_) => &self.error,
            EventKind::ErrorCleared => &self.error_cleared,
        };
        name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Configuration of an [`IftttSink`].
///
/// # Examples
///
/// ```
/// use indego_lib::bridge::{IftttConfig, IftttEvents};
///
/// let config = IftttConfig::new("maker-key").with_events(IftttEvents {
///     state_change: Some("indego_state".to_string()),
///     ..IftttEvents::default()
/// });
/// assert_eq!(config.base_url(), "https://maker.ifttt.com");
/// ```
#[derive(Clone)]
pub struct IftttConfig {
    maker_key: String,
    base_url: String,
    events: IftttEvents,
    ignore_server_certificate: bool,
    timeout: Duration,
}

impl IftttConfig {
    /// Default Maker service endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://maker.ifttt.com";
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    #[must_use]
    pub fn new(maker_key: impl Into<String>) -> Self {
        Self {
            maker_key: maker_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            events: IftttEvents::default(),
            ignore_server_certificate: false,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the service endpoint. A trailing slash is removed.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: IftttEvents) -> Self {
        self.events = events;
        self
    }

    /// Accepts any TLS certificate from the endpoint.
    #[must_use]
    pub fn with_ignore_server_certificate(mut self, ignore: bool) -> Self {
        self.ignore_server_certificate = ignore;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn events(&self) -> &IftttEvents {
        &self.events
    }

    #[must_use]
    pub fn ignore_server_certificate(&self) -> bool {
        self.ignore_server_certificate
    }

    fn trigger_url(&self, event_name: &str) -> String {
        format!(
            "{}/trigger/{}/with/key/{}",
            self.base_url,
            urlencoding::encode(event_name),
            urlencoding::encode(&self.maker_key)
        )
    }
}

impl fmt::Debug for IftttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IftttConfig")
            .field("maker_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("events", &self.events)
            .field("ignore_server_certificate", &self.ignore_server_certificate)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sends each event to an IFTTT Maker trigger.
///
/// The request is `PUT <base>/trigger/<event>/with/key/<key>` with the JSON
/// body `{"value1", "value2", "value3"}`. Only `200 OK` counts as delivered.
#[derive(Debug)]
pub struct IftttSink {
    config: IftttConfig,
    http: Client,
}

impl IftttSink {
    /// Creates the sink and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the HTTP client cannot be built.
    pub fn new(config: IftttConfig) -> Result<Self> {
        if config.ignore_server_certificate {
            tracing::warn!("TLS certificate verification disabled for the webhook endpoint");
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.ignore_server_certificate)
            .build()
            .map_err(TransportError::Http)?;
        Ok(Self { config, http })
    }

    #[must_use]
    pub fn config(&self) -> &IftttConfig {
        &self.config
    }
}

impl EventSink for IftttSink {
    async fn emit(&self, event: &BridgeEvent) -> Result<()> {
        let Some(name) = self.config.events.name_for(event.kind()) else {
            tracing::debug!(kind = %event.kind(), "No trigger configured, skipping");
            return Ok(());
        };

        let (value1, value2, value3) = (event.value1(), event.value2(), event.value3());
        tracing::info!(
            trigger = name,
            event_id = %event.id(),
            value1 = %value1,
            value2 = %value2,
            value3 = %value3,
            "Sending IFTTT trigger"
        );
        let body = serde_json::json!({
            "value1": value1,
            "value2": value2,
            "value3": value3,
        });

        let response = self
            .http
            .put(self.config.trigger_url(name))
            .json(&body)
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::error!(trigger = name, status = %status, "IFTTT trigger was not accepted");
            return Err(TransportError::status(status).into());
        }
        tracing::debug!(trigger = name, "IFTTT trigger sent");
        Ok(())
    }
}
