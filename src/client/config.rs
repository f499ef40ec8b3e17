// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection parameters for the Indego server.

use std::fmt;
use std::time::Duration;

/// Configuration of an [`IndegoClient`](super::IndegoClient).
///
/// Built once, then handed to the client (or to the polling engine, which
/// creates clients from it as needed).
///
/// # Examples
///
/// ```
/// use indego_lib::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("user@example.com", "secret")
///     .with_base_url("http://localhost:8080/api/v1")
///     .with_min_refresh_interval(Duration::from_secs(10));
///
/// assert_eq!(config.base_url(), "http://localhost:8080/api/v1/");
/// assert_eq!(config.min_refresh_interval(), Duration::from_secs(10));
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    base_url: String,
    username: String,
    password: String,
    timeout: Duration,
    min_refresh_interval: Duration,
}

impl ClientConfig {
    /// Default vendor API endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.indego.iot.bosch-si.com/api/v1/";
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default maximum age of a cached state.
    pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

    /// Creates a configuration for the default endpoint.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            username: username.into(),
            password: password.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            min_refresh_interval: Self::DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Sets the API endpoint. A missing trailing slash is added.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how long a fetched state is served from cache.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Returns the API endpoint, always ending with `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the account name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the maximum age of a cached state.
    #[must_use]
    pub fn min_refresh_interval(&self) -> Duration {
        self.min_refresh_interval
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish()
    }
}
