// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mowing and exclusion calendars.
//!
//! The same layout is used for the mowing calendar (`alms/<sn>/calendar`) and
//! the predictive exclusion calendar (`alms/<sn>/predictive/calendar`).

use serde::{Deserialize, Serialize};

/// A time window within a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSlot {
    #[serde(rename = "En")]
    pub enabled: bool,
    #[serde(rename = "StHr")]
    pub start_hour: u8,
    #[serde(rename = "StMin")]
    pub start_minute: u8,
    #[serde(rename = "EnHr")]
    pub end_hour: u8,
    #[serde(rename = "EnMin")]
    pub end_minute: u8,
}

/// The slots of one weekday, 0 being Monday.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarDay {
    #[serde(rename = "day")]
    pub number: u8,
    pub slots: Vec<CalendarSlot>,
}

/// One numbered calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarEntry {
    #[serde(rename = "cal")]
    pub number: u8,
    pub days: Vec<CalendarDay>,
}

/// The set of calendars stored on the device.
///
/// # Examples
///
/// ```
/// use indego_lib::response::DeviceCalendar;
///
/// let json = r#"{"sel_cal":1,"cals":[{"cal":1,"days":[{"day":0,"slots":[
///     {"En":true,"StHr":9,"StMin":0,"EnHr":12,"EnMin":30}]}]}]}"#;
/// let calendar: DeviceCalendar = serde_json::from_str(json).unwrap();
/// let selected = calendar.selected().unwrap();
/// assert_eq!(selected.days[0].slots[0].end_minute, 30);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceCalendar {
    #[serde(rename = "sel_cal")]
    pub selected_entry: u8,
    #[serde(rename = "cals")]
    pub entries: Vec<CalendarEntry>,
}

impl DeviceCalendar {
    /// Returns the currently selected calendar, if present.
    #[must_use]
    pub fn selected(&self) -> Option<&CalendarEntry> {
        self.entries
            .iter()
            .find(|entry| entry.number == self.selected_entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_names() {
        let calendar = DeviceCalendar {
            selected_entry: 2,
            entries: vec![CalendarEntry {
                number: 2,
                days: vec![CalendarDay {
                    number: 4,
                    slots: vec![CalendarSlot {
                        enabled: true,
                        start_hour: 8,
                        start_minute: 15,
                        end_hour: 10,
                        end_minute: 0,
                    }],
                }],
            }],
        };

        let json = serde_json::to_value(&calendar).unwrap();
        assert_eq!(json["sel_cal"], 2);
        assert_eq!(json["cals"][0]["cal"], 2);
        assert_eq!(json["cals"][0]["days"][0]["day"], 4);
        assert_eq!(json["cals"][0]["days"][0]["slots"][0]["StMin"], 15);
        assert_eq!(json["cals"][0]["days"][0]["slots"][0]["En"], true);
    }

    #[test]
    fn selected_missing() {
        let calendar: DeviceCalendar = serde_json::from_str(r#"{"sel_cal":3,"cals":[]}"#).unwrap();
        assert!(calendar.selected().is_none());
    }
}
