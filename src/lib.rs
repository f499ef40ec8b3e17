// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `indego_lib` - A Rust library to control Bosch Indego lawn mowers.
//!
//! This library talks to the Indego cloud API and keeps external systems in
//! sync with the mower:
//!
//! - **Session client** ([`IndegoClient`]): login, cached state queries,
//!   commands, calendars, predictive mowing settings and the lawn map
//! - **Polling engine** ([`engine::PollingEngine`]): a resilient worker that
//!   fetches the state forever, survives network failures and executes
//!   commands coming from outside
//! - **Bridges** ([`bridge`]): change detection with at-least-once delivery to
//!   an IFTTT webhook, and a full state mirror on an MQTT broker
//!
//! # Quick Start
//!
//! ## One-shot queries
//!
//! ```no_run
//! use indego_lib::{ClientConfig, DeviceCommand, IndegoClient, StatusTable};
//!
//! #[tokio::main]
//! async fn main() -> indego_lib::Result<()> {
//!     let client = IndegoClient::new(ClientConfig::new("user@example.com", "secret"));
//!     client.connect().await?;
//!
//!     let state = client.get_state().await?;
//!     let status = StatusTable::new().describe(state.status_code);
//!     println!("{} ({}% mowed)", status.message(), state.mowed_percent);
//!
//!     client.send_command(DeviceCommand::Mow).await?;
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## MQTT bridge
//!
//! ```no_run
//! use std::sync::Arc;
//! use indego_lib::bridge::{MqttSink, MqttSinkConfig};
//! use indego_lib::engine::{CommandMailbox, EngineConfig, PollingEngine};
//! use indego_lib::ClientConfig;
//!
//! #[tokio::main]
//! async fn main() -> indego_lib::Result<()> {
//!     let mailbox = CommandMailbox::new();
//!     let broker = MqttSinkConfig::from_broker_url("tcp://localhost:1883")?;
//!     let sink = Arc::new(MqttSink::connect(broker, mailbox.clone()).await?);
//!
//!     let mut engine = PollingEngine::new(
//!         ClientConfig::new("user@example.com", "secret"),
//!         EngineConfig::default(),
//!         sink.clone(),
//!         mailbox,
//!     );
//!     engine.startup()?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     engine.shutdown().await?;
//!     sink.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `mqtt` (default): [`bridge::MqttSink`], using `rumqttc`
//! - `ifttt` (default): [`bridge::IftttSink`] and [`bridge::CommandReceiver`],
//!   using `warp` for the receiver

pub mod bridge;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod response;
pub mod types;

pub use client::{ClientConfig, IndegoClient};
pub use config::AdapterConfig;
pub use engine::{CommandMailbox, EngineConfig, EngineState, PollingEngine};
pub use error::{ConfigError, Error, ParseError, Result, TransportError};
pub use response::DeviceState;
pub use types::{DeviceCommand, StatusDescriptor, StatusTable};
