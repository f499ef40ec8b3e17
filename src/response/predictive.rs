// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Predictive (weather driven) mowing settings.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Whether predictive mowing is enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictiveStatus {
    pub enabled: bool,
}

/// User bias applied to the predictive schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictiveAdjustment {
    #[serde(rename = "user_adjustment")]
    pub adjustment: i32,
}

/// Next cutting time planned by the predictive scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PredictiveCuttingTime {
    #[serde(rename = "mow_next")]
    next_cutting: Option<String>,
}

impl PredictiveCuttingTime {
    /// Parses the planned time.
    ///
    /// Returns `Ok(None)` when nothing is planned.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if the server sent a timestamp that
    /// is not RFC 3339.
    ///
    /// # Examples
    ///
    /// ```
    /// use indego_lib::response::PredictiveCuttingTime;
    ///
    /// let json = r#"{"mow_next":"2017-06-12T14:00:00+02:00"}"#;
    /// let next: PredictiveCuttingTime = serde_json::from_str(json).unwrap();
    /// let at = next.next_cutting().unwrap().unwrap();
    /// assert_eq!(at.to_rfc3339(), "2017-06-12T14:00:00+02:00");
    /// ```
    pub fn next_cutting(&self) -> Result<Option<DateTime<FixedOffset>>, ParseError> {
        match self.next_cutting.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(Some)
                .map_err(|e| ParseError::InvalidValue {
                    field: "mow_next".to_string(),
                    message: e.to_string(),
                }),
        }
    }
}
