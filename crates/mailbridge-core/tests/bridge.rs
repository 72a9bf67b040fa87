//! Request/response tests for the bridge.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::redundant_clone,
    clippy::needless_collect,
    clippy::similar_names
)]

use mailbridge_core::{Bridge, BridgeConfig, Response};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn bridge() -> Bridge {
    Bridge::new(BridgeConfig::default()).unwrap()
}

fn error_kind(response: &Response) -> &str {
    assert!(!response.ok, "expected failure, got {response:?}");
    &response.error.as_ref().unwrap().kind
}

fn result(response: Response) -> Value {
    assert!(response.ok, "expected success, got {response:?}");
    response.result.unwrap()
}

#[tokio::test]
async fn encode_decode_paragraphs() {
    let bridge = bridge();
    let text = "First line.\r\nSecond line.\r\nThird line.";

    let encoded = result(
        bridge
            .handle(json!({
                "op": "encode",
                "encoding": "7bit",
                "firstLineMaxLength": 78,
                "continuationLineMaxLength": 78,
                "text": text
            }))
            .await,
    );
    assert_eq!(
        encoded["lines"],
        json!(["First line.", "Second line.", "Third line."])
    );

    let decoded = result(
        bridge
            .handle(json!({"op": "decode", "encoding": "7bit", "lines": encoded["lines"]}))
            .await,
    );
    assert_eq!(decoded["text"], json!(text));
}

#[tokio::test]
async fn non_ascii_needs_8bit() {
    let bridge = bridge();

    let response = bridge
        .handle(json!({"op": "encode", "encoding": "7bit", "text": "Price: €10"}))
        .await;
    assert_eq!(error_kind(&response), "EncodingError");
    assert!(response.result.is_none());

    let encoded = result(
        bridge
            .handle(json!({"op": "encode", "encoding": "8bit", "text": "Price: €10"}))
            .await,
    );
    assert_eq!(encoded["lines"], json!(["Price: €10"]));
}

#[tokio::test]
async fn configured_policy_applies_when_request_omits_lengths() {
    let config = BridgeConfig::from_json(
        r#"{"linePolicy": {"firstLineMaxLength": 10, "continuationLineMaxLength": 10}}"#,
    )
    .unwrap();
    let bridge = Bridge::new(config).unwrap();

    let encoded = result(
        bridge
            .handle(json!({"op": "encode", "encoding": "7bit", "text": "aaaa bbbb cccc"}))
            .await,
    );
    let lines = encoded["lines"].as_array().unwrap();
    assert!(lines.len() > 1);
    assert!(lines.iter().all(|l| l.as_str().unwrap().len() <= 10));
}

#[tokio::test]
async fn argument_types_are_checked() {
    let bridge = bridge();

    let response = bridge
        .handle(json!({"op": "encode", "encoding": "7bit", "text": ["a"]}))
        .await;
    assert_eq!(error_kind(&response), "InvalidArgumentType");

    let response = bridge
        .handle(json!({"op": "decode", "encoding": "7bit", "lines": {"0": "a"}}))
        .await;
    assert_eq!(error_kind(&response), "InvalidArgumentType");

    let response = bridge
        .handle(json!({"op": "decode", "encoding": "8bit", "lines": ["a", 2]}))
        .await;
    assert_eq!(error_kind(&response), "InvalidArgumentType");
    assert!(response.error.unwrap().message.contains("lines[1]"));

    let response = bridge
        .handle(json!({"op": "encode", "encoding": "7bit", "firstLineMaxLength": 0, "text": "a"}))
        .await;
    assert_eq!(error_kind(&response), "InvalidConfiguration");
}

#[tokio::test]
async fn malformed_line_and_echoed_id() {
    let bridge = bridge();

    let response = bridge.handle_line("{not json").await;
    assert_eq!(error_kind(&response), "InvalidArgumentType");
    assert!(response.id.is_none());

    let response = bridge
        .handle_line(r#"{"id": "req-1", "op": "frobnicate"}"#)
        .await;
    assert_eq!(response.id, Some(json!("req-1")));
    assert_eq!(error_kind(&response), "InvalidArgumentType");

    let line = bridge
        .handle_line(r#"{"id": 5, "op": "encode", "encoding": "8bit", "text": ""}"#)
        .await
        .to_line();
    let value: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value, json!({"id": 5, "ok": true, "result": {"lines": []}}));
}

#[tokio::test]
async fn unknown_session() {
    let bridge = bridge();
    for op in ["smtp.state", "smtp.reset", "smtp.close", "smtp.abort"] {
        let response = bridge.handle(json!({"op": op, "session": 404})).await;
        assert_eq!(error_kind(&response), "UnknownSession", "{op}");
    }
}

#[tokio::test]
async fn session_lifecycle_without_network() {
    let bridge = bridge();
    let opened = result(
        bridge
            .handle(json!({"op": "smtp.open", "host": "127.0.0.1", "port": 9}))
            .await,
    );
    let id = opened["session"].clone();

    let state = result(bridge.handle(json!({"op": "smtp.state", "session": id})).await);
    assert_eq!(state["state"], json!("Disconnected"));

    let response = bridge
        .handle(json!({
            "op": "smtp.submit",
            "session": id,
            "rawMessage": "From: a@example.com\r\nTo: b@example.com\r\n\r\nhi"
        }))
        .await;
    assert_eq!(error_kind(&response), "InvalidState");
    assert!(response.error.unwrap().message.contains("Authentication required"));

    let set = result(
        bridge
            .handle(json!({"op": "smtp.setSourceHostname", "session": id, "hostname": "client.test"}))
            .await,
    );
    assert_eq!(set["hostname"], json!("client.test"));
    let got = result(
        bridge
            .handle(json!({"op": "smtp.getSourceHostname", "session": id}))
            .await,
    );
    assert_eq!(got["hostname"], json!("client.test"));

    let response = bridge
        .handle(json!({"op": "smtp.setSourceHostname", "session": id, "hostname": "two words"}))
        .await;
    assert_eq!(error_kind(&response), "InvalidConfiguration");

    let ssl = result(
        bridge
            .handle(json!({"op": "smtp.setSslOptions", "session": id, "verifyPeer": false}))
            .await,
    );
    assert_eq!(ssl["verifyPeer"], json!(false));
    let response = bridge
        .handle(json!({"op": "smtp.setSslOptions", "session": id, "verifyPeer": 0}))
        .await;
    assert_eq!(error_kind(&response), "InvalidArgumentType");

    assert!(bridge.handle(json!({"op": "smtp.close", "session": id})).await.ok);
    assert_eq!(bridge.session_count(), 0);
}

#[tokio::test]
async fn open_validates_arguments() {
    let bridge = bridge();

    let response = bridge
        .handle(json!({"op": "smtp.open", "host": "h", "port": 0}))
        .await;
    assert_eq!(error_kind(&response), "InvalidConfiguration");

    let response = bridge
        .handle(json!({"op": "smtp.open", "host": "h", "port": 25, "security": "SSLv2"}))
        .await;
    assert_eq!(error_kind(&response), "InvalidConfiguration");

    let response = bridge
        .handle(json!({"op": "smtp.open", "host": 1, "port": 25}))
        .await;
    assert_eq!(error_kind(&response), "InvalidArgumentType");
    assert_eq!(bridge.session_count(), 0);
}

/// Greets, accepts EHLO and rejects any AUTH with 535.
async fn rejecting_server() -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);

        write.write_all(b"220 mx.test ESMTP\r\n").await.unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.starts_with("EHLO "));
        write
            .write_all(b"250-mx.test\r\n250 AUTH PLAIN LOGIN\r\n")
            .await
            .unwrap();

        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.starts_with("AUTH PLAIN "));
        write
            .write_all(b"535 5.7.8 Authentication credentials invalid\r\n")
            .await
            .unwrap();
    });

    (port, handle)
}

#[tokio::test]
async fn authentication_failure_carries_server_code() {
    let (port, server) = rejecting_server().await;
    let bridge = bridge();

    let opened = result(
        bridge
            .handle(json!({"op": "smtp.open", "host": "127.0.0.1", "port": port, "security": "NONE", "timeoutMs": 5000}))
            .await,
    );
    let id = opened["session"].clone();

    let response = bridge
        .handle(json!({
            "id": 3,
            "op": "smtp.authenticate",
            "session": id,
            "username": "user",
            "password": "wrong",
            "authMethod": "PLAIN"
        }))
        .await;
    assert_eq!(response.id, Some(json!(3)));
    let error = response.error.unwrap();
    assert_eq!(error.kind, "AuthenticationError");
    assert_eq!(error.code, Some(535));
    assert!(error.message.contains("Authentication credentials invalid"));
    server.await.unwrap();

    let state = result(bridge.handle(json!({"op": "smtp.state", "session": id})).await);
    assert_eq!(state["state"], json!("Failed"));

    let reset = result(bridge.handle(json!({"op": "smtp.reset", "session": id})).await);
    assert_eq!(reset["state"], json!("Disconnected"));
}

#[tokio::test]
async fn shutdown_aborts_request_stuck_on_silent_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let bridge = Arc::new(bridge());
    let opened = result(
        bridge
            .handle(json!({"op": "smtp.open", "host": "127.0.0.1", "port": port, "security": "NONE", "timeoutMs": 60000}))
            .await,
    );
    let id = opened["session"].clone();

    let pending = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move {
            bridge
                .handle(json!({
                    "op": "smtp.authenticate",
                    "session": id,
                    "username": "user",
                    "password": "secret",
                    "authMethod": "PLAIN"
                }))
                .await
        }
    });

    // Let the request take the session lock and wait for the greeting
    tokio::time::sleep(Duration::from_millis(200)).await;
    bridge.shutdown().await;

    let response = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .expect("aborted request should finish promptly")
        .unwrap();
    assert_eq!(error_kind(&response), "TransportError");
    assert_eq!(bridge.session_count(), 0);
    server.abort();
}
