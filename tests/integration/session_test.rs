// tests/integration/session_test.rs

use super::mock_server::{Action, MockServer, ping_only_responder, standard_responder};
use super::test_helpers::{expect_inbound, init_tracing, test_config, unused_port, utf8};
use castctl::ClientError;
use castctl::SessionController;
use castctl::core::protocol::Inbound;
use castctl::core::{SessionPhase, ShutdownReason};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Finished = (SessionController, Result<ShutdownReason, ClientError>);

/// Runs a controller against `port` in the background, fed by the returned sender.
fn spawn_session(
    controller: SessionController,
) -> (mpsc::Sender<String>, JoinHandle<Finished>) {
    let (tx, mut rx) = mpsc::channel(16);
    let handle = tokio::spawn(async move {
        let mut controller = controller;
        let result = controller.run(&mut rx).await;
        (controller, result)
    });
    (tx, handle)
}

async fn finish(handle: JoinHandle<Finished>) -> Finished {
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("session should end")
        .unwrap()
}

#[tokio::test]
async fn test_status_round_trip_then_quit() {
    init_tracing();
    let server = MockServer::start(standard_responder()).await;
    let controller = SessionController::new(test_config(server.port()), utf8());
    let mut inbound = controller.subscribe();
    let (tx, handle) = spawn_session(controller);

    let ack = expect_inbound(&mut inbound, |i| matches!(i, Inbound::HandshakeAck(_))).await;
    assert_eq!(ack.text(), "Server encoding set to: utf-8");

    tx.send("status".to_string()).await.unwrap();
    let reply = expect_inbound(&mut inbound, |_| true).await;
    assert_eq!(reply, Inbound::Message("Status: idle".to_string()));

    tx.send("quit".to_string()).await.unwrap();
    let (controller, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::Quit);
    assert_eq!(controller.phase(), SessionPhase::Closed);
    assert_eq!(controller.sessions_opened(), 1);

    let conn = controller.last_connection().unwrap();
    assert!(conn.is_closed());
    assert!(!conn.close());
    // Holding the Arc does not keep the socket open.
    assert!(conn.is_released().await);
    let state = controller.last_session_state().unwrap();
    assert!(state.is_handshake_done());
    assert!(!state.is_connected());
    assert_eq!(state.shutdown_reason(), Some(ShutdownReason::Quit));

    assert_eq!(
        server.received_lines(),
        vec!["ENCODING:utf-8".to_string(), "status".to_string()]
    );
    assert!(server.wait_until(|s| s.connections_closed() == 1).await);
}

#[tokio::test]
async fn test_close_app_is_sent_and_ends_session() {
    init_tracing();
    let server = MockServer::start(standard_responder()).await;
    let controller = SessionController::new(test_config(server.port()), utf8());
    let (tx, handle) = spawn_session(controller);

    tx.send("Close-App".to_string()).await.unwrap();
    let (controller, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::CloseApp);
    assert_eq!(controller.phase(), SessionPhase::Closed);
    assert_eq!(server.received_raw().last().map(String::as_str), Some("Close-App\n"));
}

#[tokio::test]
async fn test_invalid_and_blank_input_keep_session_running() {
    init_tracing();
    let server = MockServer::start(standard_responder()).await;
    let controller = SessionController::new(test_config(server.port()), utf8());
    let mut inbound = controller.subscribe();
    let (tx, handle) = spawn_session(controller);

    expect_inbound(&mut inbound, |i| matches!(i, Inbound::HandshakeAck(_))).await;
    for line in ["foo", "", "   ", "start stream"] {
        tx.send(line.to_string()).await.unwrap();
    }
    tx.send("  start-stream  ".to_string()).await.unwrap();
    let reply = expect_inbound(&mut inbound, |_| true).await;
    assert_eq!(reply.text(), "Starting stream...");

    tx.send("QUIT".to_string()).await.unwrap();
    let (_, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::Quit);
    // Rejected input never reaches the wire; accepted input is sent trimmed.
    assert_eq!(
        server.received_lines(),
        vec!["ENCODING:utf-8".to_string(), "start-stream".to_string()]
    );
}

#[tokio::test]
async fn test_connect_failure_is_returned() {
    init_tracing();
    let port = unused_port().await;
    let mut controller = SessionController::new(test_config(port), utf8());
    let (_tx, mut rx) = mpsc::channel::<String>(1);

    let result = controller.run(&mut rx).await;

    assert!(matches!(result, Err(ClientError::Connect { .. })));
    assert_eq!(controller.phase(), SessionPhase::Closed);
    assert_eq!(controller.sessions_opened(), 0);
    assert!(controller.last_connection().is_none());
}

#[tokio::test]
async fn test_server_disconnect_ends_session() {
    init_tracing();
    let server = MockServer::start(Arc::new(|line: &str| {
        if line.starts_with("ENCODING:") {
            Action::Reply(vec!["Server encoding set to: utf-8".to_string()])
        } else {
            Action::Close
        }
    }))
    .await;
    let controller = SessionController::new(test_config(server.port()), utf8());
    let mut inbound = controller.subscribe();
    let (tx, handle) = spawn_session(controller);

    expect_inbound(&mut inbound, |i| matches!(i, Inbound::HandshakeAck(_))).await;
    tx.send("status".to_string()).await.unwrap();
    let (controller, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::ReceiveFailed);
    assert_eq!(controller.phase(), SessionPhase::Closed);
    assert!(controller.last_connection().unwrap().is_closed());
    drop(tx);
}

#[tokio::test]
async fn test_end_of_input_quits() {
    init_tracing();
    let server = MockServer::start(standard_responder()).await;
    let controller = SessionController::new(test_config(server.port()), utf8());
    let (tx, handle) = spawn_session(controller);

    drop(tx);
    let (controller, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::Quit);
    assert_eq!(controller.phase(), SessionPhase::Closed);
    assert!(server.wait_until(|s| s.connections_closed() == 1).await);
}

#[tokio::test]
async fn test_reconnect_replaces_connection_and_state() {
    init_tracing();
    let server = MockServer::start(standard_responder()).await;
    let controller = SessionController::new(test_config(server.port()), utf8());
    let mut inbound = controller.subscribe();
    let (tx, handle) = spawn_session(controller);

    expect_inbound(&mut inbound, |i| matches!(i, Inbound::HandshakeAck(_))).await;
    tx.send("reconnect".to_string()).await.unwrap();
    // The second session announces its encoding again.
    expect_inbound(&mut inbound, |i| matches!(i, Inbound::HandshakeAck(_))).await;

    tx.send("status".to_string()).await.unwrap();
    let reply = expect_inbound(&mut inbound, |_| true).await;
    assert_eq!(reply.text(), "Status: idle");

    tx.send("quit".to_string()).await.unwrap();
    let (controller, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::Quit);
    assert_eq!(controller.sessions_opened(), 2);
    assert_eq!(server.connections_accepted(), 2);
    assert_eq!(server.count_of("ENCODING:utf-8"), 2);
    assert!(server.wait_until(|s| s.connections_closed() == 2).await);

    assert!(controller.last_connection().unwrap().is_released().await);

    let state = controller.last_session_state().unwrap();
    assert!(state.is_handshake_done());
    assert_eq!(state.shutdown_reason(), Some(ShutdownReason::Quit));
}

#[tokio::test]
async fn test_failed_ping_ends_session() {
    init_tracing();
    let server = MockServer::start(Arc::new(|line: &str| {
        if line.starts_with("ENCODING:") {
            Action::Reply(vec!["Server encoding set to: utf-8".to_string()])
        } else {
            Action::Silent
        }
    }))
    .await;
    let mut config = test_config(server.port());
    config.ping_interval = Duration::from_millis(20);
    config.pong_timeout = Some(Duration::from_millis(50));
    let controller = SessionController::new(config, utf8());
    let (_tx, handle) = spawn_session(controller);

    let (controller, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::PingFailed);
    assert_eq!(controller.phase(), SessionPhase::Closed);
    assert!(server.count_of("PING") >= 1);
}

#[tokio::test]
async fn test_pings_flow_during_session() {
    init_tracing();
    let server = MockServer::start(ping_only_responder()).await;
    let mut config = test_config(server.port());
    config.ping_interval = Duration::from_millis(20);
    let controller = SessionController::new(config, utf8());
    let (tx, handle) = spawn_session(controller);

    assert!(server.wait_until(|s| s.count_of("PING") >= 3).await);
    tx.send("quit".to_string()).await.unwrap();
    let (controller, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::Quit);
    assert_eq!(controller.phase(), SessionPhase::Closed);
}

#[tokio::test]
async fn test_interrupt_ends_session() {
    init_tracing();
    let server = MockServer::start(standard_responder()).await;
    let controller = SessionController::new(test_config(server.port()), utf8())
        .with_interrupt(|| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        });
    let (_tx, handle) = spawn_session(controller);

    let (controller, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::Interrupted);
    assert_eq!(controller.phase(), SessionPhase::Closed);
    assert!(controller.last_connection().unwrap().is_released().await);
    assert!(server.wait_until(|s| s.connections_closed() == 1).await);
}

#[tokio::test]
async fn test_unavailable_interrupt_keeps_session_running() {
    init_tracing();
    let server = MockServer::start(standard_responder()).await;
    let controller = SessionController::new(test_config(server.port()), utf8())
        .with_interrupt(|| async { Err::<(), _>(io::Error::other("no signal handler")) });
    let mut inbound = controller.subscribe();
    let (tx, handle) = spawn_session(controller);

    expect_inbound(&mut inbound, |i| matches!(i, Inbound::HandshakeAck(_))).await;
    tx.send("status".to_string()).await.unwrap();
    let reply = expect_inbound(&mut inbound, |_| true).await;
    assert_eq!(reply.text(), "Status: idle");

    tx.send("quit".to_string()).await.unwrap();
    let (controller, result) = finish(handle).await;

    assert_eq!(result.unwrap(), ShutdownReason::Quit);
    assert_eq!(controller.phase(), SessionPhase::Closed);
}
