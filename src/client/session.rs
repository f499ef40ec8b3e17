// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use tokio::time::Instant;

use crate::response::{AuthenticationResponse, DeviceState};

/// Identifiers issued by the server on login.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub(crate) context_id: String,
    pub(crate) user_id: String,
    pub(crate) device_serial_number: String,
}

impl From<AuthenticationResponse> for Session {
    fn from(auth: AuthenticationResponse) -> Self {
        Self {
            context_id: auth.context_id().to_string(),
            user_id: auth.user_id().to_string(),
            device_serial_number: auth.device_serial_number().to_string(),
        }
    }
}

/// Last fetched state and when it was fetched.
#[derive(Debug, Clone)]
pub(crate) struct CachedState {
    snapshot: DeviceState,
    fetched_at: Instant,
}

impl CachedState {
    pub(crate) fn new(snapshot: DeviceState) -> Self {
        Self {
            snapshot,
            fetched_at: Instant::now(),
        }
    }

    pub(crate) fn fresh(&self, max_age: Duration) -> Option<&DeviceState> {
        (self.fetched_at.elapsed() < max_age).then_some(&self.snapshot)
    }
}
