// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session client for the Indego HTTP API.
//!
//! An [`IndegoClient`] owns at most one authenticated session. Every
//! operation takes the same async lock, so calls on one instance never
//! interleave. Separate instances are fully independent.
//!
//! State queries are served from a cache for
//! [`ClientConfig::min_refresh_interval`]; sending a command clears the cache
//! so the next query reflects the command's effect.

mod config;
mod session;

pub use config::ClientConfig;

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::error::{Error, ParseError, Result, TransportError};
use crate::response::{
    AuthenticationRequest, AuthenticationResponse, DeviceCalendar, DeviceState,
    LocationWeather, PredictiveAdjustment, PredictiveCuttingTime, PredictiveStatus,
    SetStateRequest,
};
use crate::types::DeviceCommand;
use session::{CachedState, Session};

/// Header carrying the session identifier on every request after login.
const CONTEXT_HEADER: &str = "x-im-context-id";

/// Client for one Indego account.
///
/// # Examples
///
/// ```no_run
/// use indego_lib::{ClientConfig, DeviceCommand, IndegoClient};
///
/// # async fn example() -> indego_lib::Result<()> {
/// let client = IndegoClient::new(ClientConfig::new("user@example.com", "secret"));
/// client.connect().await?;
///
/// let state = client.get_state().await?;
/// println!("status {} mowed {}%", state.status_code, state.mowed_percent);
///
/// client.send_command(DeviceCommand::Return).await?;
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IndegoClient {
    config: ClientConfig,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    http: Option<Client>,
    session: Option<Session>,
    cache: Option<CachedState>,
}

impl IndegoClient {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns the configuration this client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Logs in and opens the session.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyConnected`] if a session is already open
    /// - [`Error::Authentication`] if the server rejects the credentials
    /// - [`Error::Transport`] or [`Error::Parse`] for any other failure
    ///
    /// On failure the client stays disconnected.
    pub async fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.session.is_some() {
            return Err(Error::AlreadyConnected);
        }

        let http = Client::builder()
            .timeout(self.config.timeout())
            .build()
            .map_err(TransportError::Http)?;

        let url = format!("{}authenticate", self.config.base_url());
        tracing::debug!(url = %url, username = %self.config.username(), "Authenticating");

        let response = http
            .post(&url)
            .basic_auth(self.config.username(), Some(self.config.password()))
            .json(&AuthenticationRequest::default())
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication(
                "the server rejected the credentials".to_string(),
            ));
        }
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(TransportError::status(status).into());
        }

        let auth: AuthenticationResponse = decode(response).await?;
        let session = Session::from(auth);
        tracing::info!(
            serial = %session.device_serial_number,
            "Connected to Indego server"
        );

        inner.http = Some(http);
        inner.session = Some(session);
        inner.cache = None;
        Ok(())
    }

    /// Closes the session. Calling it on a disconnected client does nothing.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.session.take() {
            tracing::info!(serial = %session.device_serial_number, "Disconnected from Indego server");
        }
        inner.http = None;
        inner.cache = None;
    }

    /// Returns true while a session is open.
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.session.is_some()
    }

    /// Returns the serial number of the mower, once logged in.
    pub async fn device_serial_number(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.device_serial_number.clone())
    }

    /// Returns the user identifier issued on login.
    pub async fn user_id(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.user_id.clone())
    }

    /// Returns the device state.
    ///
    /// A state fetched less than `min_refresh_interval` ago is returned
    /// without contacting the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn get_state(&self) -> Result<DeviceState> {
        let mut inner = self.inner.lock().await;

        if let Some(state) = inner
            .cache
            .as_ref()
            .and_then(|c| c.fresh(self.config.min_refresh_interval()))
        {
            tracing::debug!("Serving device state from cache");
            return Ok(state.clone());
        }

        let state: DeviceState = inner.get_json(self.config.base_url(), "state").await?;
        tracing::debug!(status = state.status_code, error = state.error_code, "Fetched device state");
        inner.cache = Some(CachedState::new(state.clone()));
        Ok(state)
    }

    /// Sends a command to the mower.
    ///
    /// The state cache is cleared before the request is sent, whatever its
    /// outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCommand`] if the device refuses the command in its
    ///   current state
    /// - [`Error::Authentication`] if the session is no longer accepted
    /// - [`Error::Transport`] for any other failure
    pub async fn send_command(&self, command: DeviceCommand) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.cache = None;

        tracing::info!(command = %command, "Sending command");
        let body = SetStateRequest {
            state: command.action_code(),
        };
        inner.put_json(self.config.base_url(), "state", &body).await
    }

    /// Returns the mowing calendar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn get_calendar(&self) -> Result<DeviceCalendar> {
        let inner = self.inner.lock().await;
        inner.get_json(self.config.base_url(), "calendar").await
    }

    /// Returns whether predictive mowing is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn get_predictive_moving(&self) -> Result<bool> {
        let inner = self.inner.lock().await;
        let status: PredictiveStatus = inner.get_json(self.config.base_url(), "predictive").await?;
        Ok(status.enabled)
    }

    /// Enables or disables predictive mowing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn set_predictive_moving(&self, enabled: bool) -> Result<()> {
        let inner = self.inner.lock().await;
        inner
            .put_json(
                self.config.base_url(),
                "predictive",
                &PredictiveStatus { enabled },
            )
            .await
    }

    /// Returns the user adjustment of the predictive schedule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn get_predictive_adjustment(&self) -> Result<i32> {
        let inner = self.inner.lock().await;
        let adjustment: PredictiveAdjustment = inner
            .get_json(self.config.base_url(), "predictive/useradjustment")
            .await?;
        Ok(adjustment.adjustment)
    }

    /// Sets the user adjustment of the predictive schedule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn set_predictive_adjustment(&self, adjustment: i32) -> Result<()> {
        let inner = self.inner.lock().await;
        inner
            .put_json(
                self.config.base_url(),
                "predictive/useradjustment",
                &PredictiveAdjustment { adjustment },
            )
            .await
    }

    /// Returns the next cutting time planned by the predictive scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, [`Error::Parse`]
    /// for a malformed timestamp, otherwise any request failure.
    pub async fn get_predictive_next_cutting(
        &self,
    ) -> Result<Option<chrono::DateTime<chrono::FixedOffset>>> {
        let inner = self.inner.lock().await;
        let next: PredictiveCuttingTime = inner
            .get_json(self.config.base_url(), "predictive/nextcutting")
            .await?;
        Ok(next.next_cutting()?)
    }

    /// Returns the time windows in which predictive mowing is not allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn get_predictive_exclusion_time(&self) -> Result<DeviceCalendar> {
        let inner = self.inner.lock().await;
        inner
            .get_json(self.config.base_url(), "predictive/calendar")
            .await
    }

    /// Replaces the predictive exclusion calendar.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn set_predictive_exclusion_time(&self, calendar: &DeviceCalendar) -> Result<()> {
        let inner = self.inner.lock().await;
        inner
            .put_json(self.config.base_url(), "predictive/calendar", calendar)
            .await
    }

    /// Returns the weather forecast the predictive scheduler works with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn get_weather(&self) -> Result<LocationWeather> {
        let inner = self.inner.lock().await;
        inner
            .get_json(self.config.base_url(), "predictive/weather")
            .await
    }

    /// Downloads the lawn map as an SVG document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] without a session, otherwise any
    /// request failure.
    pub async fn get_map_svg(&self) -> Result<String> {
        let inner = self.inner.lock().await;
        let response = inner.get(self.config.base_url(), "map").await?;
        Ok(response.text().await.map_err(TransportError::Http)?)
    }
}

impl Inner {
    fn parts(&self) -> Result<(&Client, &Session)> {
        match (&self.http, &self.session) {
            (Some(http), Some(session)) => Ok((http, session)),
            _ => Err(Error::NotConnected),
        }
    }

    fn device_url(base_url: &str, session: &Session, path: &str) -> String {
        format!(
            "{base_url}alms/{}/{path}",
            urlencoding::encode(&session.device_serial_number)
        )
    }

    async fn get(&self, base_url: &str, path: &str) -> Result<Response> {
        let (http, session) = self.parts()?;
        let url = Self::device_url(base_url, session, path);
        tracing::debug!(url = %url, "GET");

        let response = http
            .get(&url)
            .header(CONTEXT_HEADER, session.context_id.as_str())
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Authentication(format!("GET {path} refused: {status}")));
        }
        if !status.is_success() {
            return Err(TransportError::status(status).into());
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, base_url: &str, path: &str) -> Result<T> {
        let response = self.get(base_url, path).await?;
        decode(response).await
    }

    async fn put_json<B: Serialize + ?Sized>(
        &self,
        base_url: &str,
        path: &str,
        body: &B,
    ) -> Result<()> {
        let (http, session) = self.parts()?;
        let url = Self::device_url(base_url, session, path);
        tracing::debug!(url = %url, "PUT");

        let response = http
            .put(&url)
            .header(CONTEXT_HEADER, session.context_id.as_str())
            .json(body)
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(Error::InvalidCommand(format!("PUT {path} refused: {status}")));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Authentication(format!("PUT {path} refused: {status}")));
        }
        if !status.is_success() {
            return Err(TransportError::status(status).into());
        }
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await.map_err(TransportError::Http)?;
    tracing::debug!(body = %body, "Received response");
    serde_json::from_str(&body).map_err(|e| Error::Parse(ParseError::Json(e)))
}
