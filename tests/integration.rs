//! Integration tests for the dispatch→merge→state pipeline.
//!
//! A real dispatcher is served on a loopback port and the client engine is
//! pointed at it through the local-endpoint override, so the full path
//! (HTTP dispatch, TCP probe, result merge) runs without leaving the host.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use edgeping::config::Config;
use edgeping::registry;
use edgeping::run::{ProbeClient, RunEngine};
use edgeping::server::{router, NodeIdentity};
use edgeping::state::{RegionStatus, Session, TargetSpec};

/// Serve a dispatcher on an ephemeral loopback port, returning its address
async fn spawn_dispatcher(colo: &str) -> String {
    let identity = NodeIdentity {
        colo: Some(colo.to_string()),
        placement: None,
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(identity)).await.ok();
    });
    format!("127.0.0.1:{}", addr.port())
}

/// A TCP listener standing in for the probe target
async fn spawn_target() -> (tokio::net::TcpListener, u16) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn test_config(endpoint: String, count: Option<u64>) -> Config {
    Config {
        count,
        interval: Duration::from_millis(200),
        timeout: Duration::from_secs(2),
        local_endpoint: Some(endpoint),
        ..Config::default()
    }
}

fn test_vps() -> Vec<&'static registry::VantagePoint> {
    registry::select(&["iad".to_string(), "lhr".to_string()]).unwrap()
}

#[tokio::test]
async fn test_single_round_merges_every_vantage_point() {
    let endpoint = spawn_dispatcher("lhr").await;
    let (_target, target_port) = spawn_target().await;

    let config = test_config(endpoint, Some(1));
    let vps = test_vps();
    let session = Arc::new(RwLock::new(Session::new(
        TargetSpec::new("127.0.0.1", target_port),
        config.clone(),
        &vps,
    )));
    let client = Arc::new(
        ProbeClient::new("unused.invalid".into(), config.local_endpoint.clone(), config.timeout)
            .unwrap(),
    );

    let engine = RunEngine::new(
        config,
        vps,
        session.clone(),
        client,
        CancellationToken::new(),
    );
    engine.run().await.unwrap();

    // The round fires without waiting on completions; give them time to land
    tokio::time::sleep(Duration::from_millis(500)).await;

    let session = session.read();
    assert_eq!(session.rounds, 1);
    for record in &session.records {
        assert_eq!(record.sent, 1, "{}", record.id);
        assert_eq!(record.received, 1, "{}", record.id);
        assert_eq!(record.latency_history.len(), 1, "{}", record.id);
        assert_eq!(record.status, RegionStatus::Connected);
        // The dispatcher's colo comes back through the trace id
        assert_eq!(record.ingress_colo.as_deref(), Some("LHR"));
    }
}

#[tokio::test]
async fn test_failed_probes_recorded_not_fatal() {
    let endpoint = spawn_dispatcher("fra").await;
    // A port with nothing behind it
    let (target, target_port) = spawn_target().await;
    drop(target);

    let config = test_config(endpoint, Some(1));
    let vps = test_vps();
    let session = Arc::new(RwLock::new(Session::new(
        TargetSpec::new("127.0.0.1", target_port),
        config.clone(),
        &vps,
    )));
    let client = Arc::new(
        ProbeClient::new("unused.invalid".into(), config.local_endpoint.clone(), config.timeout)
            .unwrap(),
    );

    RunEngine::new(config, vps, session.clone(), client, CancellationToken::new())
        .run()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let session = session.read();
    for record in &session.records {
        assert_eq!(record.sent, 1);
        assert_eq!(record.received, 0);
        assert_eq!(record.status, RegionStatus::Failed);
        assert!(record.last_error.is_some());
        assert!(record.latency_history.is_empty());
    }
}

#[tokio::test]
async fn test_transport_failure_counts_as_failed_probe() {
    // No dispatcher at all: the fetch to the vantage point itself fails
    let unreachable = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("127.0.0.1:{}", addr.port())
    };

    let config = test_config(unreachable, Some(1));
    let vps = test_vps();
    let session = Arc::new(RwLock::new(Session::new(
        TargetSpec::new("127.0.0.1", 80),
        config.clone(),
        &vps,
    )));
    let client = Arc::new(
        ProbeClient::new("unused.invalid".into(), config.local_endpoint.clone(), config.timeout)
            .unwrap(),
    );

    RunEngine::new(config, vps, session.clone(), client, CancellationToken::new())
        .run()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let session = session.read();
    for record in &session.records {
        assert_eq!(record.sent, 1);
        assert_eq!(record.status, RegionStatus::Failed);
        assert!(record.last_error.is_some());
    }
}

#[tokio::test]
async fn test_stop_does_not_drop_in_flight_results() {
    let endpoint = spawn_dispatcher("syd").await;
    let (_target, target_port) = spawn_target().await;

    // Infinite schedule; we stop it right after round 0 fires
    let config = test_config(endpoint, None);
    let vps = test_vps();
    let session = Arc::new(RwLock::new(Session::new(
        TargetSpec::new("127.0.0.1", target_port),
        config.clone(),
        &vps,
    )));
    let client = Arc::new(
        ProbeClient::new("unused.invalid".into(), config.local_endpoint.clone(), config.timeout)
            .unwrap(),
    );

    let schedule = RunEngine::spawn(config, vps, session.clone(), client);

    // Let round 0 dispatch, then cancel the schedule before responses land
    tokio::time::sleep(Duration::from_millis(20)).await;
    schedule.cancel();

    tokio::time::sleep(Duration::from_millis(700)).await;

    let session = session.read();
    for record in &session.records {
        // The already-sent probes still merged after stop
        assert_eq!(record.sent, 1, "{}", record.id);
        assert_eq!(record.received, 1, "{}", record.id);
    }
}

#[tokio::test]
async fn test_rounds_accumulate_history_in_arrival_order() {
    let endpoint = spawn_dispatcher("nrt").await;
    let (_target, target_port) = spawn_target().await;

    let config = test_config(endpoint, Some(3));
    let vps = registry::select(&["nrt".to_string()]).unwrap();
    let session = Arc::new(RwLock::new(Session::new(
        TargetSpec::new("127.0.0.1", target_port),
        config.clone(),
        &vps,
    )));
    let client = Arc::new(
        ProbeClient::new("unused.invalid".into(), config.local_endpoint.clone(), config.timeout)
            .unwrap(),
    );

    RunEngine::new(config, vps, session.clone(), client, CancellationToken::new())
        .run()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let session = session.read();
    let record = session.record("nrt").unwrap();
    assert_eq!(record.sent, 3);
    assert_eq!(record.received, 3);
    assert_eq!(record.latency_history.len(), 3);
    assert!(record.best_ms().unwrap() <= record.worst_ms().unwrap());
}
