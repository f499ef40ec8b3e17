// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT bridge.
//!
//! The device state is mirrored as retained messages below a topic root:
//!
//! | Topic | Payload |
//! |-------|---------|
//! | `<root>/online` | `1` or `0` (also the last will) |
//! | `<root>/stateCode` | numeric status code |
//! | `<root>/stateMessage` | status label |
//! | `<root>/errorCode` | numeric error code |
//! | `<root>/stateLevel` | `2` mowing, `1` paused, `0` docked, `-1` unknown or error, `-2` offline |
//! | `<root>/mowedPercent` | percentage of the lawn mowed |
//! | `<root>/mapSvgCacheTs`, `<root>/mapUpdateAvailable` | map metadata |
//! | `<root>/mowedTs`, `<root>/mowMode` | last mow timestamp and mode |
//! | `<root>/runtime{Total,Session}{Operation,Charge}Mins` | runtime counters |
//!
//! Commands are read from `<root>/command`. Once a command has been handled,
//! the retained message on that topic is cleared.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::{BridgeEvent, EventSink, Observation};
use crate::engine::CommandMailbox;
use crate::error::{ConfigError, Result, TransportError};

const TOPIC_ONLINE: &str = "online";
const TOPIC_COMMAND: &str = "command";

static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Configuration of an [`MqttSink`].
///
/// # Examples
///
/// ```
/// use indego_lib::bridge::MqttSinkConfig;
///
/// let config = MqttSinkConfig::from_broker_url("tcp://192.168.1.50:1883")
///     .unwrap()
///     .with_topic_root("garden/indego/");
///
/// assert_eq!(config.host(), "192.168.1.50");
/// assert_eq!(config.port(), 1883);
/// assert_eq!(config.topic("online"), "garden/indego/online");
/// ```
#[derive(Clone)]
pub struct MqttSinkConfig {
    host: String,
    port: u16,
    client_id: Option<String>,
    credentials: Option<(String, String)>,
    topic_root: String,
    qos: QoS,
    keep_alive: Duration,
    connection_timeout: Duration,
    reconnect_delay: Duration,
}

impl MqttSinkConfig {
    pub const DEFAULT_PORT: u16 = 1883;
    pub const DEFAULT_TOPIC_ROOT: &'static str = "indego";

    /// Creates a configuration for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: None,
            credentials: None,
            topic_root: Self::DEFAULT_TOPIC_ROOT.to_string(),
            qos: QoS::AtLeastOnce,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
        }
    }

    /// Parses `tcp://host:port`, `mqtt://host:port`, `host:port` or `host`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty host, an unsupported
    /// scheme or a bad port.
    pub fn from_broker_url(url: &str) -> std::result::Result<Self, ConfigError> {
        let rest = match url.split_once("://") {
            Some(("tcp" | "mqtt", rest)) => rest,
            Some((scheme, _)) => {
                return Err(ConfigError::invalid(
                    "mqtt.broker",
                    format!("unsupported scheme {scheme}"),
                ));
            }
            None => url,
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| ConfigError::invalid("mqtt.broker", format!("bad port: {e}")))?;
                (host, port)
            }
            None => (rest, Self::DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(ConfigError::invalid("mqtt.broker", "host is required"));
        }
        Ok(Self::new(host, port))
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the topic root. Leading and trailing slashes are removed.
    #[must_use]
    pub fn with_topic_root(mut self, root: impl Into<String>) -> Self {
        self.topic_root = root.into().trim_matches('/').to_string();
        self
    }

    /// Sets the QoS of every publish and subscription.
    #[must_use]
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets how long [`MqttSink::connect`] waits for the broker.
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the pause between reconnection attempts.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn topic_root(&self) -> &str {
        &self.topic_root
    }

    #[must_use]
    pub fn qos(&self) -> QoS {
        self.qos
    }

    /// Returns the full topic for `leaf`.
    #[must_use]
    pub fn topic(&self, leaf: &str) -> String {
        if self.topic_root.is_empty() {
            leaf.to_string()
        } else {
            format!("{}/{leaf}", self.topic_root)
        }
    }

    fn options(&self) -> MqttOptions {
        let client_id = self.client_id.clone().unwrap_or_else(|| {
            let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("indego_{}_{counter}", std::process::id())
        });

        let mut options = MqttOptions::new(client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options.set_last_will(LastWill::new(
            self.topic(TOPIC_ONLINE),
            "0",
            self.qos,
            true,
        ));
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        options
    }
}

impl fmt::Debug for MqttSinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSinkConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("has_credentials", &self.credentials.is_some())
            .field("topic_root", &self.topic_root)
            .field("qos", &self.qos)
            .finish_non_exhaustive()
    }
}

/// Returns the `(topic leaf, payload)` pairs mirroring `observation`.
///
/// An offline observation resets every value; `mowMode` is left untouched.
///
/// # Examples
///
/// ```
/// use indego_lib::bridge::{Observation, snapshot_fields};
///
/// let fields = snapshot_fields(&Observation::offline());
/// assert!(fields.contains(&("online", "0".to_string())));
/// assert!(fields.contains(&("stateLevel", "-2".to_string())));
/// ```
#[must_use]
pub fn snapshot_fields(observation: &Observation) -> Vec<(&'static str, String)> {
    let (Some(state), Some(status)) = (observation.state(), observation.status()) else {
        return vec![
            (TOPIC_ONLINE, "0".to_string()),
            ("stateCode", "0".to_string()),
            ("stateMessage", String::new()),
            ("errorCode", "0".to_string()),
            ("stateLevel", "-2".to_string()),
            ("mowedPercent", "0".to_string()),
            ("mapSvgCacheTs", "0".to_string()),
            ("mapUpdateAvailable", "0".to_string()),
            ("mowedTs", "0".to_string()),
            ("runtimeTotalOperationMins", "0".to_string()),
            ("runtimeTotalChargeMins", "0".to_string()),
            ("runtimeSessionOperationMins", "0".to_string()),
            ("runtimeSessionChargeMins", "0".to_string()),
        ];
    };

    let state_level = match observation.command() {
        _ if state.error_code != 0 => -1,
        Some(command) => command.state_level(),
        None => -1,
    };
    let flag = |b: bool| if b { "1" } else { "0" }.to_string();

    vec![
        (TOPIC_ONLINE, "1".to_string()),
        ("stateCode", status.code().to_string()),
        ("stateMessage", status.message().to_string()),
        ("errorCode", state.error_code.to_string()),
        ("stateLevel", state_level.to_string()),
        ("mowedPercent", state.mowed_percent.to_string()),
        ("mapSvgCacheTs", state.map_timestamp.to_string()),
        ("mapUpdateAvailable", flag(state.map_update_available)),
        ("mowedTs", state.mowed_timestamp.to_string()),
        ("mowMode", state.mow_mode.to_string()),
        (
            "runtimeTotalOperationMins",
            state.runtime.total.operate.to_string(),
        ),
        ("runtimeTotalChargeMins", state.runtime.total.charge.to_string()),
        (
            "runtimeSessionOperationMins",
            state.runtime.session.operate.to_string(),
        ),
        (
            "runtimeSessionChargeMins",
            state.runtime.session.charge.to_string(),
        ),
    ]
}

#[derive(Debug)]
struct Shared {
    connected: AtomicBool,
    stopping: AtomicBool,
}

/// Mirrors observations to an MQTT broker and feeds `<root>/command` into a
/// [`CommandMailbox`].
///
/// The connection is kept alive by a background task. If the broker goes
/// away, the task retries after the configured delay and restores the
/// subscription once reconnected; publishes fail in the meantime.
pub struct MqttSink {
    config: MqttSinkConfig,
    client: AsyncClient,
    shared: Arc<Shared>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttSink {
    /// Connects to the broker and subscribes to the command topic.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the broker does not
    /// acknowledge the connection within the connection timeout.
    pub async fn connect(config: MqttSinkConfig, mailbox: CommandMailbox) -> Result<Self> {
        let (client, event_loop) = AsyncClient::new(config.options(), 64);
        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
        });

        let (connack_tx, connack_rx) = oneshot::channel();
        let event_task = tokio::spawn(handle_events(
            event_loop,
            client.clone(),
            shared.clone(),
            EventContext {
                command_topic: config.topic(TOPIC_COMMAND),
                qos: config.qos,
                reconnect_delay: config.reconnect_delay,
                mailbox,
            },
            connack_tx,
        ));

        match tokio::time::timeout(config.connection_timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %config.host,
                    port = config.port,
                    root = %config.topic_root,
                    "Connected to MQTT broker"
                );
            }
            Ok(Err(_)) => {
                event_task.abort();
                return Err(TransportError::ConnectionFailed(
                    "MQTT event loop terminated unexpectedly".to_string(),
                )
                .into());
            }
            Err(_) => {
                event_task.abort();
                return Err(TransportError::ConnectionFailed(format!(
                    "MQTT connection timeout after {}s",
                    config.connection_timeout.as_secs()
                ))
                .into());
            }
        }

        Ok(Self {
            config,
            client,
            shared,
            event_task: Mutex::new(Some(event_task)),
        })
    }

    /// Returns true while the broker connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn config(&self) -> &MqttSinkConfig {
        &self.config
    }

    fn publish(&self, leaf: &str, payload: String) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::ConnectionFailed("not connected to MQTT broker".to_string()).into());
        }
        let topic = self.config.topic(leaf);
        tracing::trace!(topic = %topic, payload = %payload, "Publishing");
        self.client
            .try_publish(topic, self.config.qos, true, payload)
            .map_err(TransportError::Mqtt)?;
        Ok(())
    }

    /// Marks the device offline, then closes the connection.
    pub async fn disconnect(&self) {
        tracing::info!(host = %self.config.host, "Disconnecting from MQTT broker");
        self.shared.stopping.store(true, Ordering::Release);

        if let Err(e) = self.publish(TOPIC_ONLINE, "0".to_string()) {
            tracing::warn!(error = %e, "Failed to reset the online topic");
        }
        if let Err(e) = self.client.try_disconnect() {
            tracing::warn!(error = %e, "MQTT disconnect request failed");
        }

        let task = self.event_task.lock().take();
        if let Some(task) = task {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                tracing::warn!("MQTT event loop did not stop in time");
            }
        }
        self.shared.connected.store(false, Ordering::Release);
    }
}

impl fmt::Debug for MqttSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSink")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Drop for MqttSink {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.get_mut().take() {
            task.abort();
        }
    }
}

impl EventSink for MqttSink {
    async fn emit(&self, event: &BridgeEvent) -> Result<()> {
        // Transitions are visible through the retained state topics.
        tracing::debug!(kind = %event.kind(), "Change mirrored through state topics");
        Ok(())
    }

    async fn publish_snapshot(&self, observation: &Observation) -> Result<()> {
        tracing::debug!(offline = observation.is_offline(), "Pushing state to MQTT");
        for (leaf, payload) in snapshot_fields(observation) {
            self.publish(leaf, payload)?;
        }
        Ok(())
    }

    async fn command_consumed(&self) -> Result<()> {
        self.publish(TOPIC_COMMAND, String::new())
    }
}

struct EventContext {
    command_topic: String,
    qos: QoS,
    reconnect_delay: Duration,
    mailbox: CommandMailbox,
}

async fn handle_events(
    mut event_loop: EventLoop,
    client: AsyncClient,
    shared: Arc<Shared>,
    ctx: EventContext,
    connack_tx: oneshot::Sender<()>,
) {
    use rumqttc::{Event, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                shared.connected.store(true, Ordering::Release);
                // Clean sessions drop subscriptions, restore them on every connect.
                if let Err(e) = client.try_subscribe(&ctx.command_topic, ctx.qos) {
                    tracing::error!(topic = %ctx.command_topic, error = %e, "Failed to subscribe");
                }
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic != ctx.command_topic {
                    continue;
                }
                match std::str::from_utf8(&publish.payload) {
                    Ok(payload) => {
                        let command = payload.trim();
                        if !command.is_empty() {
                            tracing::info!(command = %command, "Received command over MQTT");
                        }
                        ctx.mailbox.deposit(command);
                    }
                    Err(e) => {
                        tracing::warn!(topic = %publish.topic, error = %e, "Ignoring non UTF-8 command");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                shared.connected.store(false, Ordering::Release);
                if shared.stopping.load(Ordering::Acquire) {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                shared.connected.store(false, Ordering::Release);
                if shared.stopping.load(Ordering::Acquire) {
                    tracing::debug!(error = %e, "MQTT event loop stopped");
                    break;
                }
                tracing::warn!(
                    error = %e,
                    delay_secs = ctx.reconnect_delay.as_secs(),
                    "MQTT connection lost, retrying"
                );
                tokio::time::sleep(ctx.reconnect_delay).await;
            }
        }
    }
}
