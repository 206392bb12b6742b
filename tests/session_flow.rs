//! Integration tests for the realtime session channel.
//!
//! Covers opening sessions, live forwarding, handshake rejection, session
//! replacement, and idle timeouts against a spawned server.

mod common;

use cipher_proto::CloseReason;
use common::client::Received;
use common::{TestClient, TestServer};
use std::time::Duration;

async fn open(server: &TestServer, user_id: &str) -> TestClient {
    let mut client = server
        .connect(user_id)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect {user_id}: {e}"));
    client
        .expect_frame("presence")
        .await
        .expect("Open should start with a presence snapshot");
    client
}

#[tokio::test]
async fn test_two_users_exchange_messages() {
    let server = TestServer::spawn(18101)
        .await
        .expect("Failed to spawn test server");

    let mut mohammad = open(&server, "mohammad").await;
    let mut khader = open(&server, "khader").await;

    mohammad
        .send_chat("khader", "Hey! Just finished the new UI")
        .await
        .unwrap();

    let received = khader.expect_frame("message").await.unwrap();
    assert_eq!(received["senderId"], "mohammad");
    assert_eq!(received["receiverId"], "khader");
    assert_eq!(received["content"], "Hey! Just finished the new UI");
    assert!(received["timestamp"].is_string());

    khader
        .send_chat("mohammad", "That's awesome! Can't wait to see it.")
        .await
        .unwrap();
    let reply = mohammad.expect_frame("message").await.unwrap();
    assert_eq!(reply["senderId"], "khader");

    // Both messages are in each user's history.
    for user in ["mohammad", "khader"] {
        let body: serde_json::Value = reqwest::get(server.http_url(&format!("/api/message?userId={user}")))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let history = body["chat_history"].as_array().unwrap();
        assert_eq!(history.len(), 2, "history of {user}");
        assert_eq!(history[0]["sender"]["userId"], "mohammad");
        assert_eq!(history[1]["sender"]["displayName"], "Khader A. Murtaja");
    }
}

#[tokio::test]
async fn test_presence_lists_online_users() {
    let server = TestServer::spawn(18103)
        .await
        .expect("Failed to spawn test server");

    let _alice = open(&server, "alice").await;
    let mut mohammad = server.connect("mohammad").await.unwrap();

    let presence = mohammad.expect_frame("presence").await.unwrap();
    assert_eq!(presence["count"], 2);
    let users = presence["users"].as_array().unwrap();
    assert_eq!(users[0]["userId"], "alice");
    assert_eq!(users[0]["displayName"], "Alice Johnson");
    assert_eq!(users[1]["userId"], "mohammad");
}

#[tokio::test]
async fn test_unknown_user_is_closed_with_4001() {
    let server = TestServer::spawn(18105)
        .await
        .expect("Failed to spawn test server");

    let mut ghost = server.connect("ghost").await.unwrap();
    ghost.expect_close(CloseReason::Unauthorized).await.unwrap();

    let mut mohammad = open(&server, "mohammad").await;
    mohammad.request_presence().await.unwrap();
    let presence = mohammad.expect_frame("presence").await.unwrap();
    assert_eq!(presence["count"], 1);
    assert_eq!(presence["users"][0]["userId"], "mohammad");
}

#[tokio::test]
async fn test_missing_user_id_is_refused() {
    let server = TestServer::spawn(18107)
        .await
        .expect("Failed to spawn test server");

    let url = server.ws_url("").trim_end_matches('/').to_string();
    assert!(TestClient::connect(&url).await.is_err());
}

#[tokio::test]
async fn test_errors_do_not_close_session() {
    let server = TestServer::spawn(18109)
        .await
        .expect("Failed to spawn test server");

    let mut mohammad = open(&server, "mohammad").await;

    mohammad.send_raw("not json").await.unwrap();
    let error = mohammad.expect_frame("error").await.unwrap();
    assert_eq!(error["error"], "malformed_frame");

    mohammad.send_chat("ghost", "hello?").await.unwrap();
    let error = mohammad.expect_frame("error").await.unwrap();
    assert_eq!(error["error"], "unknown_recipient");

    // Still open.
    mohammad.request_presence().await.unwrap();
    mohammad.expect_frame("presence").await.unwrap();
}

#[tokio::test]
async fn test_offline_recipient_gets_history_only() {
    let server = TestServer::spawn(18111)
        .await
        .expect("Failed to spawn test server");

    let mut mohammad = open(&server, "mohammad").await;
    mohammad.send_chat("alice", "You there?").await.unwrap();
    mohammad
        .expect_silence(Duration::from_millis(300))
        .await
        .unwrap();

    let mut alice = open(&server, "alice").await;
    alice
        .expect_silence(Duration::from_millis(300))
        .await
        .unwrap();

    let body: serde_json::Value = reqwest::get(server.http_url("/api/message?userId=alice"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["chat_history"][0]["content"], "You there?");
}

#[tokio::test]
async fn test_stale_close_keeps_newer_session() {
    let server = TestServer::spawn(18113)
        .await
        .expect("Failed to spawn test server");

    let first = open(&server, "khader").await;
    let mut second = open(&server, "khader").await;
    first.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut mohammad = open(&server, "mohammad").await;
    mohammad.send_chat("khader", "which one?").await.unwrap();

    let received = second.expect_frame("message").await.unwrap();
    assert_eq!(received["content"], "which one?");
}

#[tokio::test]
async fn test_replace_policy_close_sends_4002() {
    let server = TestServer::spawn_with(
        18115,
        r#"
[session]
on_replace = "close"
"#,
    )
    .await
    .expect("Failed to spawn test server");

    let mut first = open(&server, "khader").await;
    let _second = open(&server, "khader").await;

    first.expect_close(CloseReason::Replaced).await.unwrap();
}

#[tokio::test]
async fn test_idle_session_is_closed_with_4008() {
    let server = TestServer::spawn_with(
        18117,
        r#"
[session]
idle_timeout_secs = 1
"#,
    )
    .await
    .expect("Failed to spawn test server");

    let mut alice = open(&server, "alice").await;
    match alice.recv_timeout(Duration::from_secs(5)).await.unwrap() {
        Received::Closed(Some(code)) => {
            assert_eq!(CloseReason::from_code(code), Some(CloseReason::IdleTimeout))
        }
        other => panic!("expected idle close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_presence_broadcast() {
    let server = TestServer::spawn_with(
        18119,
        r#"
[session]
broadcast_presence = true
"#,
    )
    .await
    .expect("Failed to spawn test server");

    let mut mohammad = open(&server, "mohammad").await;
    let khader = open(&server, "khader").await;

    let joined = mohammad.expect_frame("presence").await.unwrap();
    assert_eq!(joined["count"], 2);

    khader.close().await.unwrap();
    let left = mohammad.expect_frame("presence").await.unwrap();
    assert_eq!(left["count"], 1);
}
