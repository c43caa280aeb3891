/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for zelid-connect tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zelid_connect::channel::RecordingUrlOpener;
use zelid_connect::ws::{PushConnector, PushStream};
use zelid_connect::{ConnectorConfig, MemorySessionStore, PushHub, Result, WalletConnector};

pub const LOGIN_PHRASE: &str = "1700000000000abcdef";

/// Push connector whose connections stay silent; frames are injected with `PushHub::deliver`
pub struct SilentConnector;

#[async_trait]
impl PushConnector for SilentConnector {
    async fn connect(&self, _key: &str) -> Result<PushStream> {
        Ok(stream::pending().boxed())
    }
}

/// Setup a mock identity/verifier server
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub async fn mount_login_phrase(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/id/loginphrase"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "success", "data": LOGIN_PHRASE})),
        )
        .mount(server)
        .await;
}

pub async fn mount_verifier(server: &MockServer, message: &str) {
    Mock::given(method("POST"))
        .and(path("/api/verifyLogin"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": {"message": message}})),
        )
        .mount(server)
        .await;
}

pub struct Harness {
    pub connector: WalletConnector,
    pub hub: PushHub,
    pub opener: Arc<RecordingUrlOpener>,
    pub sessions: Arc<MemorySessionStore>,
}

/// Connector wired to `server` with an in-memory session slot and an injectable push hub
pub fn harness(server: &MockServer, relay_url: Option<String>) -> Harness {
    harness_with(
        server,
        ConnectorConfig {
            relay_url,
            response_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        },
    )
}

/// Like [`harness`], starting from `config` with the service URLs pointed at `server`
pub fn harness_with(server: &MockServer, config: ConnectorConfig) -> Harness {
    let hub = PushHub::new(Arc::new(SilentConnector));
    let opener = Arc::new(RecordingUrlOpener::new(true));
    let sessions = Arc::new(MemorySessionStore::new());
    let config = ConnectorConfig {
        id_base_url: server.uri(),
        verifier_base_url: server.uri(),
        ..config
    };
    let connector =
        WalletConnector::with_parts(config, sessions.clone(), hub.clone(), opener.clone())
            .expect("connector init");

    Harness {
        connector,
        hub,
        opener,
        sessions,
    }
}

/// Wait until the hub has a listener for `key`
pub async fn wait_for_listener(hub: &PushHub, key: &str) {
    for _ in 0..200 {
        if hub.listener_count(key) > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no listener registered for {key}");
}

/// Wait until the hub has any listener and return its key
pub async fn wait_for_any_key(hub: &PushHub) -> String {
    for _ in 0..200 {
        if let Some(key) = hub.active_keys().into_iter().next() {
            return key;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no push listener registered");
}
