// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Weather forecast used by the predictive scheduler (`alms/<sn>/predictive/weather`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Where the forecast applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherLocation {
    #[serde(rename = "name")]
    pub town: String,
    pub country: String,
    #[serde(rename = "tzn")]
    pub time_zone: String,
}

/// One forecast interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherInterval {
    #[serde(rename = "dateTime")]
    pub date_time: String,
    /// Length of the interval in hours.
    #[serde(rename = "intervalLength")]
    pub interval_length: i32,
    /// Rain probability in percent.
    #[serde(rename = "prrr")]
    pub rain: i32,
    /// Temperature in degrees Celsius.
    #[serde(rename = "tt")]
    pub temperature: f32,
}

impl WeatherInterval {
    /// Parses the start of the interval.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if `dateTime` is not RFC 3339.
    pub fn start(&self) -> Result<DateTime<Utc>, ParseError> {
        DateTime::parse_from_rfc3339(&self.date_time)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| ParseError::InvalidValue {
                field: "dateTime".to_string(),
                message: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherForecast {
    pub intervals: Vec<WeatherInterval>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weather {
    pub location: WeatherLocation,
    pub forecast: WeatherForecast,
}

/// Forecast for the mower's location.
///
/// # Examples
///
/// ```
/// use indego_lib::response::LocationWeather;
///
/// let json = r#"{"LocationWeather":{
///     "location":{"name":"Stuttgart","country":"DE","tzn":"Europe/Berlin"},
///     "forecast":{"intervals":[
///         {"dateTime":"2017-06-12T12:00:00Z","intervalLength":3,"prrr":20,"tt":21.5}]}}}"#;
/// let weather: LocationWeather = serde_json::from_str(json).unwrap();
/// assert_eq!(weather.weather.location.town, "Stuttgart");
/// assert_eq!(weather.weather.forecast.intervals[0].rain, 20);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationWeather {
    #[serde(rename = "LocationWeather")]
    pub weather: Weather,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_decodes() {
        let weather: LocationWeather = serde_json::from_str("{}").unwrap();
        assert!(weather.weather.forecast.intervals.is_empty());
        assert!(weather.weather.location.town.is_empty());
    }

    #[test]
    fn interval_start() {
        let interval = WeatherInterval {
            date_time: "2017-06-12T14:00:00+02:00".to_string(),
            ..WeatherInterval::default()
        };
        assert_eq!(
            interval.start().unwrap().to_rfc3339(),
            "2017-06-12T12:00:00+00:00"
        );
    }

    #[test]
    fn bad_interval_start() {
        let interval = WeatherInterval::default();
        assert!(matches!(
            interval.start(),
            Err(ParseError::InvalidValue { ref field, .. }) if field == "dateTime"
        ));
    }
}
