// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands understood by the mower.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// A control action that can be sent to the device.
///
/// The textual form (`MOW`, `PAUSE`, `RETURN`) is what external systems send
/// on the inbound command channel. It is matched case-sensitively.
///
/// # Examples
///
/// ```
/// use indego_lib::types::DeviceCommand;
///
/// let cmd: DeviceCommand = "MOW".parse().unwrap();
/// assert_eq!(cmd, DeviceCommand::Mow);
/// assert_eq!(cmd.action_code(), "mow");
///
/// assert!("mow".parse::<DeviceCommand>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceCommand {
    /// Start mowing.
    Mow,
    /// Pause mowing.
    Pause,
    /// Return to the docking station.
    Return,
}

impl DeviceCommand {
    /// All known commands.
    pub const ALL: [Self; 3] = [Self::Mow, Self::Pause, Self::Return];

    /// Returns the command name used on the inbound channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mow => "MOW",
            Self::Pause => "PAUSE",
            Self::Return => "RETURN",
        }
    }

    /// Returns the state value sent to the server.
    #[must_use]
    pub const fn action_code(&self) -> &'static str {
        match self {
            Self::Mow => "mow",
            Self::Pause => "pause",
            Self::Return => "returnToDock",
        }
    }

    /// Returns the `stateLevel` published over MQTT for this command.
    ///
    /// Higher means more active: mowing, paused, docked.
    #[must_use]
    pub const fn state_level(&self) -> i32 {
        match self {
            Self::Mow => 2,
            Self::Pause => 1,
            Self::Return => 0,
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceCommand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.as_str() == s)
            .ok_or_else(|| ParseError::UnknownCommand(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_commands() {
        assert_eq!("MOW".parse::<DeviceCommand>().unwrap(), DeviceCommand::Mow);
        assert_eq!(
            "PAUSE".parse::<DeviceCommand>().unwrap(),
            DeviceCommand::Pause
        );
        assert_eq!(
            "RETURN".parse::<DeviceCommand>().unwrap(),
            DeviceCommand::Return
        );
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert!("Mow".parse::<DeviceCommand>().is_err());
        assert!("return".parse::<DeviceCommand>().is_err());
    }

    #[test]
    fn parse_unknown_command() {
        let err = "DANCE".parse::<DeviceCommand>().unwrap_err();
        assert!(matches!(err, ParseError::UnknownCommand(ref c) if c == "DANCE"));
    }

    #[test]
    fn action_codes() {
        assert_eq!(DeviceCommand::Mow.action_code(), "mow");
        assert_eq!(DeviceCommand::Pause.action_code(), "pause");
        assert_eq!(DeviceCommand::Return.action_code(), "returnToDock");
    }

    #[test]
    fn display_matches_token() {
        for cmd in DeviceCommand::ALL {
            assert_eq!(cmd.to_string().parse::<DeviceCommand>().unwrap(), cmd);
        }
    }
}
