// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change detection over the three tracked facets of a device.
//!
//! Each cycle produces an [`Observation`]. The [`ChangeDetector`] reduces it
//! to [`Facets`] (connectivity, inferred command, error code) and compares
//! each facet with the last value that was successfully delivered. A facet is
//! only remembered once its event has been accepted by the sink, so a failed
//! delivery is retried on the next cycle.

use uuid::Uuid;

use crate::bridge::{BridgeEvent, EventKind, EventSink};
use crate::response::DeviceState;
use crate::types::{DeviceCommand, StatusDescriptor, StatusTable};

/// What one polling cycle saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    state: Option<(DeviceState, StatusDescriptor)>,
}

impl Observation {
    /// The device could not be reached.
    #[must_use]
    pub fn offline() -> Self {
        Self { state: None }
    }

    /// The device answered with `state`.
    #[must_use]
    pub fn online(state: DeviceState, table: &StatusTable) -> Self {
        let status = table.describe(state.status_code);
        Self {
            state: Some((state, status)),
        }
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.state.is_none()
    }

    /// Returns the fetched state, if online.
    #[must_use]
    pub fn state(&self) -> Option<&DeviceState> {
        self.state.as_ref().map(|(state, _)| state)
    }

    /// Returns the decoded status, if online.
    #[must_use]
    pub fn status(&self) -> Option<&StatusDescriptor> {
        self.state.as_ref().map(|(_, status)| status)
    }

    /// Returns the command inferred from the status code.
    #[must_use]
    pub fn command(&self) -> Option<DeviceCommand> {
        self.status().and_then(StatusDescriptor::associated_command)
    }

    /// Returns the mowed percentage, if online.
    #[must_use]
    pub fn mowed_percent(&self) -> Option<i32> {
        self.state().map(|s| s.mowed_percent)
    }

    /// Reduces the observation to its tracked facets.
    #[must_use]
    pub fn facets(&self) -> Facets {
        Facets {
            offline: self.is_offline(),
            command: self.command(),
            error_code: self.state().map_or(0, |s| s.error_code),
        }
    }
}

/// The tracked dimensions of the device state.
///
/// An unreachable device has no command and error code 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Facets {
    pub offline: bool,
    pub command: Option<DeviceCommand>,
    pub error_code: i32,
}

/// Remembers the last delivered facets and emits events on change.
///
/// # Examples
///
/// ```
/// use indego_lib::bridge::ChangeDetector;
///
/// let detector = ChangeDetector::new();
/// assert!(detector.last().is_none());
/// ```
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<Facets>,
    /// Undelivered event per facet, so a retry keeps its identifier.
    pending: [Option<(EventKind, Uuid)>; 3],
}

const CONNECTIVITY: usize = 0;
const COMMAND: usize = 1;
const ERROR: usize = 2;

impl ChangeDetector {
    /// Creates a detector that will take the next observation as baseline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the remembered facets, `None` before the first observation.
    #[must_use]
    pub fn last(&self) -> Option<Facets> {
        self.last
    }

    /// Compares `observation` with the remembered facets and forwards each
    /// change to `sink`, in the order connectivity, command, error.
    ///
    /// The first observation is only recorded. A facet whose event the sink
    /// rejects keeps its previous value, and the retry on a later cycle
    /// carries the same event id as long as the transition is unchanged.
    ///
    /// Returns the number of events the sink accepted.
    pub async fn process<S: EventSink>(&mut self, observation: &Observation, sink: &S) -> usize {
        let current = observation.facets();
        let Some(mut last) = self.last else {
            tracing::debug!(?current, "Recording baseline facets");
            self.last = Some(current);
            return 0;
        };

        let percent = observation.mowed_percent();
        let mut delivered = 0;

        if current.offline == last.offline {
            self.pending[CONNECTIVITY] = None;
        } else {
            let kind = if current.offline {
                EventKind::Offline
            } else {
                EventKind::Online
            };
            if self.deliver(CONNECTIVITY, kind, percent, sink).await {
                last.offline = current.offline;
                delivered += 1;
            }
        }

        if current.command == last.command {
            self.pending[COMMAND] = None;
        } else {
            let kind = EventKind::StateChanged(current.command);
            if self.deliver(COMMAND, kind, percent, sink).await {
                last.command = current.command;
                delivered += 1;
            }
        }

        if current.error_code == last.error_code {
            self.pending[ERROR] = None;
        } else {
            let kind = if current.error_code == 0 {
                EventKind::ErrorCleared
            } else {
                EventKind::Error(current.error_code)
            };
            if self.deliver(ERROR, kind, percent, sink).await {
                last.error_code = current.error_code;
                delivered += 1;
            }
        }

        self.last = Some(last);
        delivered
    }

    /// Sends one event, reusing the identifier of an earlier failed attempt
    /// at the same transition.
    async fn deliver<S: EventSink>(
        &mut self,
        facet: usize,
        kind: EventKind,
        percent: Option<i32>,
        sink: &S,
    ) -> bool {
        let event = match self.pending[facet] {
            Some((pending_kind, id)) if pending_kind == kind => {
                BridgeEvent::with_id(id, kind, percent)
            }
            _ => BridgeEvent::new(kind, percent),
        };

        match sink.emit(&event).await {
            Ok(()) => {
                tracing::info!(event_id = %event.id(), kind = %event.kind(), "Event delivered");
                self.pending[facet] = None;
                true
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id(),
                    kind = %event.kind(),
                    error = %e,
                    "Event delivery failed, will retry"
                );
                self.pending[facet] = Some((kind, event.id()));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::RecordingSink;

    fn online(code: i32, error: i32) -> Observation {
        let state = DeviceState {
            status_code: code,
            error_code: error,
            mowed_percent: 50,
            ..DeviceState::default()
        };
        Observation::online(state, &StatusTable::new())
    }

    #[tokio::test]
    async fn first_observation_is_baseline() {
        let sink = RecordingSink::default();
        let mut detector = ChangeDetector::new();

        assert_eq!(detector.process(&online(513, 7), &sink).await, 0);
        assert!(sink.events().is_empty());
        assert_eq!(
            detector.last(),
            Some(Facets {
                offline: false,
                command: Some(DeviceCommand::Mow),
                error_code: 7,
            })
        );
    }

    #[tokio::test]
    async fn docked_then_mowing_emits_once() {
        let sink = RecordingSink::default();
        let mut detector = ChangeDetector::new();

        detector.process(&online(258, 0), &sink).await;
        detector.process(&online(513, 0), &sink).await;
        detector.process(&online(513, 0), &sink).await;

        assert_eq!(
            sink.kinds(),
            vec![EventKind::StateChanged(Some(DeviceCommand::Mow))]
        );
        assert_eq!(sink.events()[0].value3(), "50");
    }

    #[tokio::test]
    async fn error_then_cleared() {
        let sink = RecordingSink::default();
        let mut detector = ChangeDetector::new();

        detector.process(&online(258, 0), &sink).await;
        detector.process(&online(258, 5), &sink).await;
        detector.process(&online(258, 0), &sink).await;

        assert_eq!(
            sink.kinds(),
            vec![EventKind::Error(5), EventKind::ErrorCleared]
        );
    }

    #[tokio::test]
    async fn failed_delivery_is_retried() {
        let sink = RecordingSink::default();
        let mut detector = ChangeDetector::new();

        detector.process(&online(258, 0), &sink).await;

        sink.set_failing(true);
        assert_eq!(detector.process(&online(513, 0), &sink).await, 0);
        assert_eq!(detector.last().unwrap().command, Some(DeviceCommand::Return));

        sink.set_failing(false);
        assert_eq!(detector.process(&online(513, 0), &sink).await, 1);
        assert_eq!(detector.last().unwrap().command, Some(DeviceCommand::Mow));

        // One rejected attempt, one accepted.
        assert_eq!(sink.attempts(), 2);
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn offline_resets_command_and_error() {
        let sink = RecordingSink::default();
        let mut detector = ChangeDetector::new();

        detector.process(&online(513, 3), &sink).await;
        detector.process(&Observation::offline(), &sink).await;

        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::Offline,
                EventKind::StateChanged(None),
                EventKind::ErrorCleared,
            ]
        );
        assert!(sink.events().iter().all(|e| e.value3() == "unknown"));
    }

    #[tokio::test]
    async fn facets_commit_independently() {
        let sink = RecordingSink::default();
        let mut detector = ChangeDetector::new();

        detector.process(&online(258, 0), &sink).await;

        // Only the error event is rejected.
        sink.fail_kind(EventKind::Error(9));
        detector.process(&online(513, 9), &sink).await;

        let last = detector.last().unwrap();
        assert_eq!(last.command, Some(DeviceCommand::Mow));
        assert_eq!(last.error_code, 0);
    }

    #[tokio::test]
    async fn repeated_offline_emits_once() {
        let sink = RecordingSink::default();
        let mut detector = ChangeDetector::new();

        detector.process(&online(258, 0), &sink).await;
        for _ in 0..3 {
            detector.process(&Observation::offline(), &sink).await;
        }
        detector.process(&online(258, 0), &sink).await;

        let connectivity: Vec<_> = sink
            .kinds()
            .into_iter()
            .filter(|k| matches!(k, EventKind::Online | EventKind::Offline))
            .collect();
        assert_eq!(connectivity, vec![EventKind::Offline, EventKind::Online]);
    }

    #[tokio::test]
    async fn retry_keeps_event_id() {
        let sink = RecordingSink::default();
        let mut detector = ChangeDetector::new();

        detector.process(&online(258, 0), &sink).await;
        sink.set_failing(true);
        detector.process(&online(513, 0), &sink).await;
        detector.process(&online(513, 0), &sink).await;
        sink.set_failing(false);
        detector.process(&online(513, 0), &sink).await;

        let tried = sink.tried();
        assert_eq!(tried.len(), 3);
        assert!(tried.iter().all(|e| e.id() == tried[0].id()));
        assert_eq!(sink.events()[0].id(), tried[0].id());
    }

    #[tokio::test]
    async fn new_transition_gets_new_id() {
        let sink = RecordingSink::default();
        let mut detector = ChangeDetector::new();

        detector.process(&online(258, 0), &sink).await;
        sink.set_failing(true);
        detector.process(&online(513, 0), &sink).await;
        // Back to the delivered state: the pending transition is dropped.
        detector.process(&online(258, 0), &sink).await;
        sink.set_failing(false);
        detector.process(&online(513, 0), &sink).await;

        let tried = sink.tried();
        assert_eq!(tried.len(), 2);
        assert_ne!(tried[0].id(), tried[1].id());

        // A different kind on the same facet is a different transition too.
        sink.set_failing(true);
        detector.process(&online(513, 4), &sink).await;
        sink.set_failing(false);
        detector.process(&online(513, 6), &sink).await;
        let tried = sink.tried();
        assert_eq!(tried[2].kind(), EventKind::Error(4));
        assert_eq!(tried[3].kind(), EventKind::Error(6));
        assert_ne!(tried[2].id(), tried[3].id());
    }
}
