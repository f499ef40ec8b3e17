// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core domain types.
//!
//! - [`DeviceCommand`]: the control actions a mower understands
//! - [`StatusTable`] / [`StatusDescriptor`]: decoding of numeric status codes

mod command;
mod status;

pub use command::DeviceCommand;
pub use status::{StatusDescriptor, StatusTable};
