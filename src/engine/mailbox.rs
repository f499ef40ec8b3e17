// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-slot inbox for commands coming from outside.

use std::sync::Arc;

use parking_lot::Mutex;

use super::WakeSignal;

/// Holds at most one pending command token.
///
/// Transports [`deposit`](Self::deposit) raw tokens; a newer token replaces
/// an older one that was not yet taken. Every deposit wakes the polling
/// engine so the command runs without waiting for the poll interval.
///
/// Cloning yields a handle to the same slot.
///
/// # Examples
///
/// ```
/// use indego_lib::engine::CommandMailbox;
///
/// let mailbox = CommandMailbox::new();
/// mailbox.deposit("PAUSE");
/// mailbox.deposit("RETURN");
///
/// assert_eq!(mailbox.take().as_deref(), Some("RETURN"));
/// assert_eq!(mailbox.take(), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CommandMailbox {
    slot: Arc<Mutex<Option<String>>>,
    wake: Arc<WakeSignal>,
}

impl CommandMailbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `token`, replacing any pending one, and wakes the engine.
    ///
    /// Empty tokens are ignored.
    pub fn deposit(&self, token: impl Into<String>) {
        let token = token.into();
        if token.is_empty() {
            return;
        }
        tracing::debug!(token = %token, "Command deposited");
        *self.slot.lock() = Some(token);
        self.wake.signal();
    }

    /// Removes and returns the pending token.
    #[must_use]
    pub fn take(&self) -> Option<String> {
        self.slot.lock().take()
    }

    /// Returns true if a token is waiting.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub(crate) fn wake_signal(&self) -> &WakeSignal {
        &self.wake
    }
}
