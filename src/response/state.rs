// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state snapshot.

use serde::{Deserialize, Serialize};

/// Operation and charge counters, in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeCounters {
    /// Time spent operating.
    pub operate: i64,
    /// Time spent charging.
    pub charge: i64,
}

/// Lifetime and current-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Runtime {
    /// Counters since the device was built.
    pub total: RuntimeCounters,
    /// Counters of the current mowing session.
    pub session: RuntimeCounters,
}

/// One immutable snapshot of the device as reported by `GET alms/<sn>/state`.
///
/// # Examples
///
/// ```
/// use indego_lib::response::DeviceState;
///
/// let json = r#"{"state":513,"mowed":42,"runtime":{"total":{"operate":100}}}"#;
/// let state: DeviceState = serde_json::from_str(json).unwrap();
/// assert_eq!(state.status_code, 513);
/// assert_eq!(state.mowed_percent, 42);
/// assert_eq!(state.runtime.total.operate, 100);
/// assert_eq!(state.error_code, 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    /// Numeric status code, see [`StatusTable`](crate::types::StatusTable).
    #[serde(rename = "state")]
    pub status_code: i32,
    /// Active error code, 0 when none.
    #[serde(rename = "error")]
    pub error_code: i32,
    /// Percentage of the lawn mowed in the current run.
    #[serde(rename = "mowed")]
    pub mowed_percent: i32,
    #[serde(rename = "mowed_ts")]
    pub mowed_timestamp: i64,
    #[serde(rename = "mowmode")]
    pub mow_mode: i64,
    /// Timestamp of the cached SVG map.
    #[serde(rename = "mapsvgcache_ts")]
    pub map_timestamp: i64,
    pub map_update_available: bool,
    pub runtime: Runtime,
}

#[derive(Debug, Serialize)]
pub(crate) struct SetStateRequest<'a> {
    pub(crate) state: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_state() {
        let json = r#"{
            "state": 258,
            "error": 0,
            "mowed": 100,
            "mowed_ts": 1500000000000,
            "mowmode": 1,
            "mapsvgcache_ts": 1500000000001,
            "map_update_available": true,
            "runtime": {
                "total": {"operate": 6000, "charge": 1200},
                "session": {"operate": 30, "charge": 5}
            },
            "xPos": 12
        }"#;
        let state: DeviceState = serde_json::from_str(json).unwrap();
        assert_eq!(state.status_code, 258);
        assert_eq!(state.mowed_percent, 100);
        assert_eq!(state.mowed_timestamp, 1_500_000_000_000);
        assert_eq!(state.mow_mode, 1);
        assert_eq!(state.map_timestamp, 1_500_000_000_001);
        assert!(state.map_update_available);
        assert_eq!(state.runtime.total.charge, 1200);
        assert_eq!(state.runtime.session.operate, 30);
    }

    #[test]
    fn empty_object_defaults() {
        let state: DeviceState = serde_json::from_str("{}").unwrap();
        assert_eq!(state, DeviceState::default());
    }

    #[test]
    fn set_state_body() {
        let body = serde_json::to_string(&SetStateRequest { state: "returnToDock" }).unwrap();
        assert_eq!(body, r#"{"state":"returnToDock"}"#);
    }
}
