// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end tests of the polling engine against a mock Indego server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use indego_lib::bridge::{BridgeEvent, EventKind, EventSink, Observation};
use indego_lib::{
    ClientConfig, CommandMailbox, DeviceCommand, EngineConfig, EngineState, PollingEngine,
};
use parking_lot::Mutex;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERIAL: &str = "987654321";

#[derive(Debug, Default)]
struct Recorder {
    events: Mutex<Vec<BridgeEvent>>,
    snapshots: AtomicUsize,
    consumed: AtomicUsize,
}

impl Recorder {
    fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(BridgeEvent::kind).collect()
    }
}

impl EventSink for Recorder {
    async fn emit(&self, event: &BridgeEvent) -> indego_lib::Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    async fn publish_snapshot(&self, _observation: &Observation) -> indego_lib::Result<()> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn command_consumed(&self) -> indego_lib::Result<()> {
        self.consumed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn mount_device(server: &MockServer, state: i32, error: i32) {
    Mock::given(method("POST"))
        .and(path("/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "contextId": "ctx",
            "userId": "user",
            "alm_sn": SERIAL
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/alms/{SERIAL}/state")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "state": state,
            "error": error,
            "mowed": 10
        })))
        .mount(server)
        .await;
}

fn engine_for(
    server: &MockServer,
    sink: Arc<Recorder>,
    mailbox: CommandMailbox,
) -> PollingEngine<Recorder> {
    let client = ClientConfig::new("user@example.com", "secret")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_secs(2))
        .with_min_refresh_interval(Duration::from_millis(1));
    PollingEngine::new(
        client,
        EngineConfig::new(Duration::from_millis(50)),
        sink,
        mailbox,
    )
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn first_cycle_is_baseline_then_changes_are_emitted() {
    let server = MockServer::start().await;
    mount_device(&server, 258, 0).await;

    let sink = Arc::new(Recorder::default());
    let mut engine = engine_for(&server, sink.clone(), CommandMailbox::new());
    engine.startup().unwrap();

    wait_until("baseline snapshots", || sink.snapshots.load(Ordering::SeqCst) >= 2).await;
    assert!(sink.kinds().is_empty());

    server.reset().await;
    mount_device(&server, 513, 0).await;
    wait_until("state change", || !sink.kinds().is_empty()).await;

    // Give the engine a few more cycles on the same state.
    let seen = sink.snapshots.load(Ordering::SeqCst);
    wait_until("more cycles", || sink.snapshots.load(Ordering::SeqCst) >= seen + 3).await;
    assert_eq!(
        sink.kinds(),
        vec![EventKind::StateChanged(Some(DeviceCommand::Mow))]
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn outage_emits_single_offline_then_online() {
    let server = MockServer::start().await;
    mount_device(&server, 258, 0).await;

    let sink = Arc::new(Recorder::default());
    let mut engine = engine_for(&server, sink.clone(), CommandMailbox::new());
    let mut state = engine.watch_state();
    engine.startup().unwrap();

    wait_until("baseline", || sink.snapshots.load(Ordering::SeqCst) >= 1).await;

    // Nothing mounted: every request answers 404.
    server.reset().await;
    wait_until("offline", || sink.kinds().contains(&EventKind::Offline)).await;
    let seen = sink.snapshots.load(Ordering::SeqCst);
    wait_until("more offline cycles", || {
        sink.snapshots.load(Ordering::SeqCst) >= seen + 3
    })
    .await;
    assert_ne!(*state.borrow_and_update(), EngineState::Connected);

    mount_device(&server, 258, 0).await;
    wait_until("online", || sink.kinds().contains(&EventKind::Online)).await;

    let kinds = sink.kinds();
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::Offline).count(), 1);
    assert_eq!(kinds.iter().filter(|k| **k == EventKind::Online).count(), 1);
    assert_eq!(*state.borrow_and_update(), EngineState::Connected);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn device_error_and_recovery() {
    let server = MockServer::start().await;
    mount_device(&server, 258, 0).await;

    let sink = Arc::new(Recorder::default());
    let mut engine = engine_for(&server, sink.clone(), CommandMailbox::new());
    engine.startup().unwrap();
    wait_until("baseline", || sink.snapshots.load(Ordering::SeqCst) >= 1).await;

    server.reset().await;
    mount_device(&server, 258, 151).await;
    wait_until("error", || sink.kinds().contains(&EventKind::Error(151))).await;

    server.reset().await;
    mount_device(&server, 258, 0).await;
    wait_until("error cleared", || {
        sink.kinds().contains(&EventKind::ErrorCleared)
    })
    .await;

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn mailbox_command_is_sent_to_device() {
    let server = MockServer::start().await;
    mount_device(&server, 258, 0).await;
    Mock::given(method("PUT"))
        .and(path(format!("/alms/{SERIAL}/state")))
        .and(body_json(serde_json::json!({ "state": "mow" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(Recorder::default());
    let mailbox = CommandMailbox::new();
    let mut engine = engine_for(&server, sink.clone(), mailbox.clone());
    engine.startup().unwrap();
    wait_until("baseline", || sink.snapshots.load(Ordering::SeqCst) >= 1).await;

    mailbox.deposit("MOW");
    wait_until("command consumed", || sink.consumed.load(Ordering::SeqCst) == 1).await;
    assert!(!mailbox.is_pending());

    engine.shutdown().await.unwrap();
    // Dropping the server verifies the PUT expectation.
}

#[tokio::test]
async fn unknown_command_is_consumed_without_request() {
    let server = MockServer::start().await;
    mount_device(&server, 258, 0).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sink = Arc::new(Recorder::default());
    let mailbox = CommandMailbox::new();
    let mut engine = engine_for(&server, sink.clone(), mailbox.clone());
    engine.startup().unwrap();

    mailbox.deposit("mow");
    wait_until("command consumed", || sink.consumed.load(Ordering::SeqCst) == 1).await;

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn refused_command_is_consumed() {
    let server = MockServer::start().await;
    mount_device(&server, 258, 0).await;
    Mock::given(method("PUT"))
        .and(path(format!("/alms/{SERIAL}/state")))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(Recorder::default());
    let mailbox = CommandMailbox::new();
    let mut engine = engine_for(&server, sink.clone(), mailbox.clone());
    engine.startup().unwrap();
    wait_until("baseline", || sink.snapshots.load(Ordering::SeqCst) >= 1).await;

    mailbox.deposit("PAUSE");
    wait_until("command consumed", || sink.consumed.load(Ordering::SeqCst) == 1).await;
    assert!(engine.is_running());

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_joins_worker() {
    let server = MockServer::start().await;
    mount_device(&server, 258, 0).await;

    let sink = Arc::new(Recorder::default());
    let mut engine = PollingEngine::new(
        ClientConfig::new("user@example.com", "secret").with_base_url(server.uri()),
        EngineConfig::new(Duration::from_secs(3600)),
        sink.clone(),
        CommandMailbox::new(),
    );
    let state = engine.watch_state();
    engine.startup().unwrap();
    wait_until("first cycle", || sink.snapshots.load(Ordering::SeqCst) == 1).await;

    tokio::time::timeout(Duration::from_secs(2), engine.shutdown())
        .await
        .expect("shutdown interrupts the poll wait")
        .unwrap();
    assert!(!engine.is_running());
    assert_eq!(*state.borrow(), EngineState::ShutDown);
}
