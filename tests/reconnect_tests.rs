//! Reconnect Tests
//!
//! Session recovery through the reconnect manager:
//! - Redialing and replaying the handshake after a dropped connection
//! - Giving up after the configured number of attempts
//! - Failing fast once the session is closed

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_test::assert_err;
use tsdb_client::driver::protocol::Action;
use tsdb_client::driver::{Connector, Handshake, MuxConfig, ReconnectManager, ReconnectPolicy};
use tsdb_client::{DriverError, TsdbClientBuilder};

use common::{FakeConnector, FakeDb};

fn mux_config() -> MuxConfig {
    MuxConfig {
        request_timeout: Duration::from_secs(2),
        keepalive: None,
        queue_depth: 16,
    }
}

fn handshake() -> Handshake {
    Handshake {
        user: "root".to_string(),
        password: "taosdata".to_string(),
        database: Some("power".to_string()),
    }
}

fn policy(enabled: bool, retries: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        enabled,
        retries,
        interval: Duration::from_millis(10),
    }
}

/// First connection hangs up right after the handshake; later ones stay up.
fn flaky_connector(db: &FakeDb) -> Arc<FakeConnector> {
    let db = db.clone();
    FakeConnector::new(move |end, attempt| {
        let db = db.clone();
        let limit = if attempt == 0 { Some(1) } else { None };
        tokio::spawn(db.serve_limited(end, limit));
    })
}

async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}

// ============================================================================
// Recovery
// ============================================================================

#[tokio::test]
async fn test_reconnects_and_replays_handshake() {
    let db = FakeDb::new();
    let connector = flaky_connector(&db);
    let manager = ReconnectManager::connect(
        connector.clone() as Arc<dyn Connector>,
        mux_config(),
        policy(true, 3),
        handshake(),
    )
    .await
    .unwrap();

    wait_for(|| connector.dials() == 2 && !manager.is_reconnecting()).await;
    let reply = manager.send(Action::Version).await.unwrap();
    assert!(matches!(reply, tsdb_client::driver::Frame::Text(_)));

    assert_eq!(connector.dials(), 2);
    assert_eq!(db.actions(), vec!["conn", "conn", "version"]);
    db.with(|state| {
        for conn in state.requests.iter().filter(|r| r["action"] == "conn") {
            assert_eq!(conn["args"]["user"], "root");
            assert_eq!(conn["args"]["db"], "power");
        }
    });
    assert!(!manager.is_closed());
}

#[tokio::test]
async fn test_client_survives_dropped_connection() {
    let db = FakeDb::new();
    let connector = flaky_connector(&db);
    let client = TsdbClientBuilder::new("ws://fake:6041")
        .reconnect(3, 10)
        .keepalive_ms(0)
        .connector(connector.clone())
        .build()
        .await
        .unwrap();
    wait_for(|| connector.dials() == 2).await;

    assert_eq!(client.version().await.unwrap(), common::SERVER_VERSION);
    assert_eq!(client.exec("insert into t values(now, 1)").await.unwrap(), 3);
    assert!(!client.is_closed());
}

// ============================================================================
// Exhaustion
// ============================================================================

#[tokio::test]
async fn test_gives_up_after_retries() {
    let db = FakeDb::new();
    let connector = flaky_connector(&db);
    connector.refuse_from(1);
    let manager = ReconnectManager::connect(
        connector.clone() as Arc<dyn Connector>,
        mux_config(),
        policy(true, 2),
        handshake(),
    )
    .await
    .unwrap();

    wait_for(|| manager.is_closed()).await;
    // one initial dial plus two refused attempts
    assert_eq!(connector.dials(), 3);

    let err = assert_err!(manager.send(Action::Version).await);
    assert!(matches!(err, DriverError::Closed));
    assert_eq!(connector.dials(), 3);
}

#[tokio::test]
async fn test_disabled_reconnect_closes_session() {
    let db = FakeDb::new();
    let connector = flaky_connector(&db);
    let manager = ReconnectManager::connect(
        connector.clone() as Arc<dyn Connector>,
        mux_config(),
        policy(false, 3),
        handshake(),
    )
    .await
    .unwrap();

    wait_for(|| manager.is_closed()).await;
    assert!(matches!(
        manager.send(Action::Version).await,
        Err(DriverError::Closed)
    ));
    assert_eq!(connector.dials(), 1);
}

// ============================================================================
// Handshake and close
// ============================================================================

#[tokio::test]
async fn test_rejected_handshake_is_not_retried() {
    let connector = FakeConnector::serving(FakeDb::new());
    let result = ReconnectManager::connect(
        connector.clone() as Arc<dyn Connector>,
        mux_config(),
        policy(true, 3),
        Handshake {
            password: "wrong".to_string(),
            ..handshake()
        },
    )
    .await;

    match result {
        Err(DriverError::Protocol { code, message }) => {
            assert_eq!(code, 0x0357);
            assert_eq!(message, "Authentication failure");
        }
        Err(other) => panic!("expected a protocol error, got {:?}", other),
        Ok(_) => panic!("handshake should fail"),
    }
    assert_eq!(connector.dials(), 1);
}

#[tokio::test]
async fn test_initial_dial_failure_is_returned() {
    let connector = FakeConnector::serving(FakeDb::new());
    connector.refuse_from(0);
    let result = ReconnectManager::connect(
        connector.clone() as Arc<dyn Connector>,
        mux_config(),
        policy(true, 3),
        handshake(),
    )
    .await;
    assert!(matches!(result, Err(DriverError::Transport(_))));
    assert_eq!(connector.dials(), 1);
}

#[tokio::test]
async fn test_close_is_final() {
    let db = FakeDb::new();
    let connector = FakeConnector::serving(db.clone());
    let manager = ReconnectManager::connect(
        connector.clone() as Arc<dyn Connector>,
        mux_config(),
        policy(true, 3),
        handshake(),
    )
    .await
    .unwrap();

    manager.close().await;
    assert!(manager.is_closed());
    assert!(matches!(
        manager.send(Action::Version).await,
        Err(DriverError::Closed)
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.dials(), 1);
}
