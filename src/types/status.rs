// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Status code descriptions.
//!
//! The device reports its activity as a bare integer. [`StatusTable`] maps
//! those integers to a label and to the command that most plausibly led to
//! the current state (its *associated command*). The table is built once and
//! never mutated; codes it does not know are described on the fly from their
//! high byte.

use std::collections::HashMap;

use super::DeviceCommand;

/// Known status codes: (code, message, associated command).
const KNOWN_STATUS: &[(i32, &str, Option<DeviceCommand>)] = &[
    (0, "Reading status", Some(DeviceCommand::Return)),
    (257, "Charging", Some(DeviceCommand::Return)),
    (258, "Docked", Some(DeviceCommand::Return)),
    (259, "Docked - Software update", Some(DeviceCommand::Return)),
    (260, "Docked", Some(DeviceCommand::Return)),
    (261, "Docked", Some(DeviceCommand::Return)),
    (262, "Docked - Loading map", Some(DeviceCommand::Mow)),
    (263, "Docked - Saving map", Some(DeviceCommand::Return)),
    (513, "Mowing", Some(DeviceCommand::Mow)),
    (514, "Relocalising", Some(DeviceCommand::Mow)),
    (515, "Loading map", Some(DeviceCommand::Mow)),
    (516, "Learning lawn", Some(DeviceCommand::Mow)),
    (517, "Paused", Some(DeviceCommand::Pause)),
    (518, "Border cut", Some(DeviceCommand::Mow)),
    (519, "Idle in lawn", Some(DeviceCommand::Mow)),
    (769, "Returning to dock", Some(DeviceCommand::Return)),
    (770, "Returning to dock", Some(DeviceCommand::Return)),
    (771, "Returning to dock - Battery low", Some(DeviceCommand::Return)),
    (
        772,
        "Returning to dock - Calendar timeslot ended",
        Some(DeviceCommand::Return),
    ),
    (
        773,
        "Returning to dock - Battery temp range",
        Some(DeviceCommand::Return),
    ),
    (774, "Returning to dock", Some(DeviceCommand::Return)),
    (775, "Returning to dock - Lawn complete", Some(DeviceCommand::Return)),
    (776, "Returning to dock - Relocalising", Some(DeviceCommand::Return)),
    (1025, "Diagnostic mode", None),
    (1026, "End of live", None),
    (1281, "Software update", None),
];

/// Description of a single status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDescriptor {
    code: i32,
    message: String,
    associated_command: Option<DeviceCommand>,
}

impl StatusDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(
        code: i32,
        message: impl Into<String>,
        associated_command: Option<DeviceCommand>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            associated_command,
        }
    }

    /// Describes a code that is not in the table.
    ///
    /// The high byte groups codes by activity: `0x1xx` docked, `0x2xx` in the
    /// lawn, `0x3xx` returning.
    #[must_use]
    pub fn synthesize(code: i32) -> Self {
        let associated_command = match code & 0xff00 {
            0x100 | 0x300 => Some(DeviceCommand::Return),
            0x200 => Some(DeviceCommand::Mow),
            _ => None,
        };
        Self::new(
            code,
            format!("Unknown status code {code}"),
            associated_command,
        )
    }

    /// Returns the numeric status code.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Returns the human readable label.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the command inferred from this status, if any.
    #[must_use]
    pub fn associated_command(&self) -> Option<DeviceCommand> {
        self.associated_command
    }
}

/// Immutable lookup table from status code to [`StatusDescriptor`].
///
/// Build it once and share it (for example behind an `Arc`) with every
/// component that decodes status codes.
///
/// # Examples
///
/// ```
/// use indego_lib::types::{DeviceCommand, StatusTable};
///
/// let table = StatusTable::new();
/// assert_eq!(table.describe(513).message(), "Mowing");
///
/// // Unknown codes are described from their high byte.
/// let unknown = table.describe(0x2ff);
/// assert_eq!(unknown.associated_command(), Some(DeviceCommand::Mow));
/// ```
#[derive(Debug, Clone)]
pub struct StatusTable {
    entries: HashMap<i32, StatusDescriptor>,
}

impl StatusTable {
    /// Creates the table of all known status codes.
    #[must_use]
    pub fn new() -> Self {
        let entries = KNOWN_STATUS
            .iter()
            .map(|&(code, message, command)| (code, StatusDescriptor::new(code, message, command)))
            .collect();
        Self { entries }
    }

    /// Returns the descriptor for a known code.
    #[must_use]
    pub fn get(&self, code: i32) -> Option<&StatusDescriptor> {
        self.entries.get(&code)
    }

    /// Describes any code, synthesizing a descriptor for unknown ones.
    #[must_use]
    pub fn describe(&self, code: i32) -> StatusDescriptor {
        self.get(code)
            .cloned()
            .unwrap_or_else(|| StatusDescriptor::synthesize(code))
    }

    /// Returns the associated command of a code.
    #[must_use]
    pub fn associated_command(&self, code: i32) -> Option<DeviceCommand> {
        match self.get(code) {
            Some(descriptor) => descriptor.associated_command(),
            None => StatusDescriptor::synthesize(code).associated_command(),
        }
    }

    /// Returns the number of known codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::new()
    }
}
