// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Long-running synchronisation between the device and an [`EventSink`].
//!
//! A [`PollingEngine`] runs one worker task. Each cycle it
//!
//! 1. logs in if it has no session,
//! 2. fetches the device state (a failure drops the session and skips the
//!    rest of the cycle),
//! 3. executes at most one command from the [`CommandMailbox`],
//! 4. hands the observation to the [`ChangeDetector`] and to the sink,
//! 5. sleeps for the poll interval or until woken by a new command.
//!
//! Errors never stop the worker. A panic inside a cycle is caught by a
//! supervisor which restarts the worker with a fresh baseline.

mod mailbox;
mod wake;

pub use mailbox::CommandMailbox;
pub use wake::WakeSignal;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bridge::{ChangeDetector, EventSink, Observation};
use crate::client::{ClientConfig, IndegoClient};
use crate::error::{Error, Result};
use crate::types::{DeviceCommand, StatusTable};

/// Connection state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No session; the next cycle will try to log in.
    Disconnected,
    /// Logging in.
    Connecting,
    /// A session is open.
    Connected,
    /// The worker has stopped.
    ShutDown,
}

/// Settings of a [`PollingEngine`].
///
/// # Examples
///
/// ```
/// use indego_lib::engine::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::new(Duration::from_secs(90));
/// assert_eq!(config.poll_interval(), Duration::from_secs(90));
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    poll_interval: Duration,
    status_table: Arc<StatusTable>,
}

impl EngineConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            status_table: Arc::new(StatusTable::new()),
        }
    }

    /// Shares an existing status table instead of building one.
    #[must_use]
    pub fn with_status_table(mut self, table: Arc<StatusTable>) -> Self {
        self.status_table = table;
        self
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn status_table(&self) -> &Arc<StatusTable> {
        &self.status_table
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_POLL_INTERVAL)
    }
}

/// Keeps one device in sync with one sink.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use indego_lib::bridge::{IftttConfig, IftttSink};
/// use indego_lib::engine::{CommandMailbox, EngineConfig, PollingEngine};
/// use indego_lib::ClientConfig;
///
/// # async fn example() -> indego_lib::Result<()> {
/// let sink = Arc::new(IftttSink::new(IftttConfig::new("maker-key"))?);
/// let mut engine = PollingEngine::new(
///     ClientConfig::new("user@example.com", "secret"),
///     EngineConfig::new(Duration::from_secs(60)),
///     sink,
///     CommandMailbox::new(),
/// );
///
/// engine.startup()?;
/// tokio::signal::ctrl_c().await.ok();
/// engine.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct PollingEngine<S: EventSink> {
    worker: Arc<Worker<S>>,
    handle: Option<JoinHandle<()>>,
}

impl<S: EventSink> PollingEngine<S> {
    /// Creates a stopped engine.
    #[must_use]
    pub fn new(
        client_config: ClientConfig,
        config: EngineConfig,
        sink: Arc<S>,
        mailbox: CommandMailbox,
    ) -> Self {
        if config.poll_interval < client_config.min_refresh_interval() {
            tracing::warn!(
                poll_interval_ms = config.poll_interval.as_millis(),
                min_refresh_interval_ms = client_config.min_refresh_interval().as_millis(),
                "Poll interval is shorter than the state cache lifetime; some cycles will see cached state"
            );
        }

        let (state_tx, _) = watch::channel(EngineState::Disconnected);
        Self {
            worker: Arc::new(Worker {
                client_config,
                config,
                sink,
                mailbox,
                shutdown: AtomicBool::new(false),
                state_tx,
            }),
            handle: None,
        }
    }

    /// Starts the worker task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the worker is running.
    pub fn startup(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::AlreadyStarted);
        }
        self.worker.shutdown.store(false, Ordering::Release);
        self.worker.set_state(EngineState::Disconnected);

        tracing::info!(
            poll_interval_ms = self.worker.config.poll_interval.as_millis(),
            "Starting polling engine"
        );
        self.handle = Some(tokio::spawn(supervise(self.worker.clone())));
        Ok(())
    }

    /// Stops the worker and waits for it to finish its current cycle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] if the worker is not running.
    pub async fn shutdown(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or(Error::NotStarted)?;

        tracing::info!("Stopping polling engine");
        self.worker.shutdown.store(true, Ordering::Release);
        self.worker.mailbox.wake_signal().signal();

        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Polling engine terminated abnormally");
        }
        self.worker.set_state(EngineState::ShutDown);
        Ok(())
    }

    /// Returns true between [`startup`](Self::startup) and
    /// [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Subscribes to the worker's connection state.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<EngineState> {
        self.worker.state_tx.subscribe()
    }

    /// Returns a handle to the mailbox feeding this engine.
    #[must_use]
    pub fn mailbox(&self) -> &CommandMailbox {
        &self.worker.mailbox
    }

    #[must_use]
    pub fn sink(&self) -> &Arc<S> {
        &self.worker.sink
    }
}

impl<S: EventSink> Drop for PollingEngine<S> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            // Let the worker wind down on its own.
            self.worker.shutdown.store(true, Ordering::Release);
            self.worker.mailbox.wake_signal().signal();
        }
    }
}

struct Worker<S> {
    client_config: ClientConfig,
    config: EngineConfig,
    sink: Arc<S>,
    mailbox: CommandMailbox,
    shutdown: AtomicBool,
    state_tx: watch::Sender<EngineState>,
}

impl<S: EventSink> Worker<S> {
    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn set_state(&self, state: EngineState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::debug!(from = ?*current, to = ?state, "Engine state changed");
                *current = state;
                true
            }
        });
    }

    async fn run(&self) {
        let mut detector = ChangeDetector::new();
        let mut client: Option<IndegoClient> = None;

        while !self.stopping() {
            self.cycle(&mut client, &mut detector).await;
            if self.stopping() {
                break;
            }
            self.mailbox.wake_signal().wait(self.config.poll_interval).await;
        }

        if let Some(client) = client.take() {
            client.disconnect().await;
        }
    }

    async fn cycle(&self, slot: &mut Option<IndegoClient>, detector: &mut ChangeDetector) {
        if slot.is_none() {
            tracing::info!("No connection to Indego server, connecting");
            self.set_state(EngineState::Connecting);
            let client = IndegoClient::new(self.client_config.clone());
            match client.connect().await {
                Ok(()) => {
                    *slot = Some(client);
                    self.set_state(EngineState::Connected);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Connection to Indego server failed");
                    self.set_state(EngineState::Disconnected);
                }
            }
        }

        let observation = match slot.as_ref() {
            Some(client) => match client.get_state().await {
                Ok(state) => Observation::online(state, &self.config.status_table),
                Err(e) => {
                    tracing::error!(error = %e, "Fetching device state failed");
                    self.drop_client(slot).await;
                    return;
                }
            },
            None => Observation::offline(),
        };

        if slot.is_some() {
            self.execute_pending(slot).await;
        }

        detector.process(&observation, &*self.sink).await;
        if let Err(e) = self.sink.publish_snapshot(&observation).await {
            tracing::warn!(error = %e, "Publishing state snapshot failed");
        }
    }

    async fn execute_pending(&self, slot: &mut Option<IndegoClient>) {
        let Some(client) = slot.as_ref() else {
            return;
        };
        let Some(token) = self.mailbox.take() else {
            return;
        };
        tracing::info!(command = %token, "Processing command");

        let outcome = match token.parse::<DeviceCommand>() {
            Ok(command) => client.send_command(command).await,
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(()) => tracing::info!(command = %token, "Command sent"),
            Err(Error::InvalidCommand(reason)) => tracing::warn!(
                command = %token,
                reason = %reason,
                "Command refused in the current device state, ignoring it"
            ),
            Err(Error::Parse(e)) => {
                tracing::warn!(command = %token, error = %e, "Ignoring invalid command");
            }
            Err(e) => {
                tracing::error!(command = %token, error = %e, "Sending command failed");
                self.drop_client(slot).await;
                return;
            }
        }

        if let Err(e) = self.sink.command_consumed().await {
            tracing::warn!(error = %e, "Failed to acknowledge command");
        }
    }

    async fn drop_client(&self, slot: &mut Option<IndegoClient>) {
        if let Some(client) = slot.take() {
            client.disconnect().await;
        }
        self.set_state(EngineState::Disconnected);
    }
}

/// Runs the worker until shutdown, restarting it after a panic.
async fn supervise<S: EventSink>(worker: Arc<Worker<S>>) {
    loop {
        let attempt = worker.clone();
        match tokio::spawn(async move { attempt.run().await }).await {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                tracing::error!("Polling cycle panicked, restarting with a fresh baseline");
                worker.set_state(EngineState::Disconnected);
                if worker.stopping() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Polling task was cancelled");
                break;
            }
        }
    }
    worker.set_state(EngineState::ShutDown);
    tracing::info!("Polling engine stopped");
}
