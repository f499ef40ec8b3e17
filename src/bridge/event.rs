// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notifications forwarded to external systems.

use std::fmt;

use uuid::Uuid;

use crate::types::DeviceCommand;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The device became reachable.
    Online,
    /// The device became unreachable.
    Offline,
    /// The inferred command changed. `None` means no command could be inferred.
    StateChanged(Option<DeviceCommand>),
    /// A non-zero error code appeared or changed.
    Error(i32),
    /// The error code went back to 0.
    ErrorCleared,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
            Self::StateChanged(Some(cmd)) => write!(f, "state changed to {cmd}"),
            Self::StateChanged(None) => f.write_str("state changed to UNKNOWN"),
            Self::Error(code) => write!(f, "error {code}"),
            Self::ErrorCleared => f.write_str("error cleared"),
        }
    }
}

/// One notification, with the payload slots sent to a webhook.
///
/// # Examples
///
/// ```
/// use indego_lib::bridge::{BridgeEvent, EventKind};
/// use indego_lib::DeviceCommand;
///
/// let event = BridgeEvent::new(EventKind::StateChanged(Some(DeviceCommand::Mow)), Some(37));
/// assert_eq!(event.value1(), "MOW");
/// assert_eq!(event.value2(), "");
/// assert_eq!(event.value3(), "37");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEvent {
    id: Uuid,
    kind: EventKind,
    mowed_percent: Option<i32>,
}

impl BridgeEvent {
    /// Creates an event with a fresh identifier.
    #[must_use]
    pub fn new(kind: EventKind, mowed_percent: Option<i32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            mowed_percent,
        }
    }

    pub(crate) fn with_id(id: Uuid, kind: EventKind, mowed_percent: Option<i32>) -> Self {
        Self {
            id,
            kind,
            mowed_percent,
        }
    }

    /// Returns the identifier of this event.
    ///
    /// Retries of an undelivered transition reuse the identifier, so
    /// receivers can use it to drop duplicates.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the mowed percentage at the time of the event, if known.
    #[must_use]
    pub fn mowed_percent(&self) -> Option<i32> {
        self.mowed_percent
    }

    /// Primary value: the new connectivity, command name or error code.
    #[must_use]
    pub fn value1(&self) -> String {
        match self.kind {
            EventKind::Online => "online".to_string(),
            EventKind::Offline => "offline".to_string(),
            EventKind::StateChanged(cmd) => cmd
                .map_or("UNKNOWN", |c| c.as_str())
                .to_string(),
            EventKind::Error(code) => code.to_string(),
            EventKind::ErrorCleared => "0".to_string(),
        }
    }

    /// Secondary value: a description of the error, empty otherwise.
    #[must_use]
    pub fn value2(&self) -> String {
        match self.kind {
            EventKind::Error(_) => "Unknown error".to_string(),
            _ => String::new(),
        }
    }

    /// Mowed percentage, or `unknown` while the device is unreachable.
    #[must_use]
    pub fn value3(&self) -> String {
        self.mowed_percent
            .map_or_else(|| "unknown".to_string(), |p| p.to_string())
    }
}

impl fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_values() {
        let offline = BridgeEvent::new(EventKind::Offline, None);
        assert_eq!(offline.value1(), "offline");
        assert_eq!(offline.value2(), "");
        assert_eq!(offline.value3(), "unknown");

        let online = BridgeEvent::new(EventKind::Online, Some(0));
        assert_eq!(online.value1(), "online");
        assert_eq!(online.value3(), "0");
    }

    #[test]
    fn unknown_state() {
        let event = BridgeEvent::new(EventKind::StateChanged(None), Some(5));
        assert_eq!(event.value1(), "UNKNOWN");
    }

    #[test]
    fn error_values() {
        let error = BridgeEvent::new(EventKind::Error(151), Some(12));
        assert_eq!(error.value1(), "151");
        assert_eq!(error.value2(), "Unknown error");

        let cleared = BridgeEvent::new(EventKind::ErrorCleared, Some(12));
        assert_eq!(cleared.value1(), "0");
        assert_eq!(cleared.value2(), "");
    }

    #[test]
    fn ids_are_unique() {
        let a = BridgeEvent::new(EventKind::Online, None);
        let b = BridgeEvent::new(EventKind::Online, None);
        assert_ne!(a.id(), b.id());
    }
}
