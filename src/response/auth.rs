// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Login exchange.

use serde::{Deserialize, Serialize};

/// Body of the `authenticate` request.
///
/// The server only accepts logins that look like they come from the mobile
/// app, so the defaults announce an Android client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationRequest {
    /// Device identifier, left empty.
    pub device: String,
    /// Operating system family.
    pub os_type: String,
    /// Operating system version.
    pub os_version: String,
    /// Manufacturer of the client device.
    #[serde(rename = "dvc_manuf")]
    pub device_manufacturer: String,
    /// Model of the client device.
    #[serde(rename = "dvc_type")]
    pub device_type: String,
}

impl Default for AuthenticationRequest {
    fn default() -> Self {
        Self {
            device: String::new(),
            os_type: "Android".to_string(),
            os_version: "4.0".to_string(),
            device_manufacturer: "unknown".to_string(),
            device_type: "unknown".to_string(),
        }
    }
}

/// Answer to a successful login.
///
/// # Examples
///
/// ```
/// use indego_lib::response::AuthenticationResponse;
///
/// let json = r#"{"contextId":"ctx-1","userId":"user-1","alm_sn":"123456789"}"#;
/// let auth: AuthenticationResponse = serde_json::from_str(json).unwrap();
/// assert_eq!(auth.device_serial_number(), "123456789");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthenticationResponse {
    #[serde(rename = "contextId")]
    context_id: String,
    #[serde(rename = "userId", default)]
    user_id: String,
    #[serde(rename = "alm_sn")]
    device_serial_number: String,
}

impl AuthenticationResponse {
    /// Returns the session identifier sent in `x-im-context-id`.
    #[must_use]
    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Returns the user identifier.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the serial number of the mower bound to the account.
    #[must_use]
    pub fn device_serial_number(&self) -> &str {
        &self.device_serial_number
    }
}
