// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON bodies exchanged with the Indego server.
//!
//! Every structure here is a plain serde value. Unknown fields are ignored
//! and missing fields fall back to zero or `false`, so a partial answer from
//! the server still decodes.

mod auth;
mod calendar;
mod predictive;
mod state;
mod weather;

pub use auth::{AuthenticationRequest, AuthenticationResponse};
pub use calendar::{CalendarDay, CalendarEntry, CalendarSlot, DeviceCalendar};
pub use predictive::{PredictiveAdjustment, PredictiveCuttingTime, PredictiveStatus};
pub(crate) use state::SetStateRequest;
pub use state::{DeviceState, Runtime, RuntimeCounters};
pub use weather::{LocationWeather, Weather, WeatherForecast, WeatherInterval, WeatherLocation};
