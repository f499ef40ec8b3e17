// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridges between the device state and external event systems.
//!
//! The polling engine hands every observation to an [`EventSink`]. Change
//! events are computed by the [`ChangeDetector`]; sinks only have to deliver
//! them.
//!
//! Two sinks are provided:
//!
//! - [`IftttSink`] (feature `ifttt`): calls a webhook trigger per event, and
//!   [`CommandReceiver`] accepts commands over HTTP
//! - [`MqttSink`] (feature `mqtt`): publishes the full state under a topic
//!   root and receives commands on `<root>/command`

mod event;
mod facets;
#[cfg(feature = "mqtt")]
mod mqtt;
#[cfg(feature = "ifttt")]
mod receiver;
#[cfg(feature = "ifttt")]
mod webhook;

use std::future::Future;

pub use event::{BridgeEvent, EventKind};
pub use facets::{ChangeDetector, Facets, Observation};
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttSink, MqttSinkConfig, snapshot_fields};
#[cfg(feature = "ifttt")]
pub use receiver::CommandReceiver;
#[cfg(feature = "ifttt")]
pub use webhook::{IftttConfig, IftttEvents, IftttSink};

use crate::error::Result;

/// Destination of bridge events.
///
/// Returning `Ok(())` from [`emit`](Self::emit) confirms delivery; the facet
/// behind the event is then considered delivered and will not be sent again.
/// Any error leaves the facet pending so the same transition is retried on
/// the next cycle.
pub trait EventSink: Send + Sync + 'static {
    /// Delivers one change event.
    fn emit(&self, event: &BridgeEvent) -> impl Future<Output = Result<()>> + Send;

    /// Receives every observation, changed or not.
    ///
    /// Sinks that mirror the full state (MQTT) use this; the default does
    /// nothing.
    fn publish_snapshot(&self, _observation: &Observation) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Called after the engine took a command from the mailbox.
    fn command_consumed(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::{BridgeEvent, EventKind, EventSink, Observation};
    use crate::error::{Error, Result, TransportError};

    /// Sink that records what it receives.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        events: Mutex<Vec<BridgeEvent>>,
        tried: Mutex<Vec<BridgeEvent>>,
        snapshots: Mutex<Vec<Observation>>,
        rejected_kinds: Mutex<Vec<EventKind>>,
        attempts: AtomicUsize,
        consumed: AtomicUsize,
        failing: AtomicBool,
    }

    impl RecordingSink {
        pub(crate) fn events(&self) -> Vec<BridgeEvent> {
            self.events.lock().clone()
        }

        /// Every event passed to `emit`, accepted or not.
        pub(crate) fn tried(&self) -> Vec<BridgeEvent> {
            self.tried.lock().clone()
        }

        pub(crate) fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().iter().map(BridgeEvent::kind).collect()
        }

        pub(crate) fn snapshots(&self) -> Vec<Observation> {
            self.snapshots.lock().clone()
        }

        pub(crate) fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        pub(crate) fn consumed(&self) -> usize {
            self.consumed.load(Ordering::SeqCst)
        }

        pub(crate) fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub(crate) fn fail_kind(&self, kind: EventKind) {
            self.rejected_kinds.lock().push(kind);
        }
    }

    impl EventSink for RecordingSink {
        async fn emit(&self, event: &BridgeEvent) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.tried.lock().push(event.clone());
            if self.failing.load(Ordering::SeqCst) || self.rejected_kinds.lock().contains(&event.kind())
            {
                return Err(Error::Transport(TransportError::ConnectionFailed(
                    "sink unavailable".to_string(),
                )));
            }
            self.events.lock().push(event.clone());
            Ok(())
        }

        async fn publish_snapshot(&self, observation: &Observation) -> Result<()> {
            self.snapshots.lock().push(observation.clone());
            Ok(())
        }

        async fn command_consumed(&self) -> Result<()> {
            self.consumed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
