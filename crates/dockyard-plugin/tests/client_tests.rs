// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport client behavior against an HTTP mock backend.

use dockyard_core::{DockyardError, PLUGIN_ACCEPT, PluginAddress};
use dockyard_plugin::{CallOptions, Client};
use dockyard_security::ClientTimeouts;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_bytes, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Client {
    let address = PluginAddress::parse(&server.uri()).unwrap();
    Client::new(&address, None, &ClientTimeouts::default()).unwrap()
}

/// An address on 127.0.0.1 with nothing listening.
async fn closed_tcp_address() -> PluginAddress {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    PluginAddress::parse(&format!("tcp://127.0.0.1:{port}")).unwrap()
}

#[derive(Debug, Deserialize)]
struct MountReply {
    #[serde(rename = "Mountpoint")]
    mountpoint: String,
}

#[tokio::test]
async fn handshake_decodes_capabilities() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Plugin.Activate"))
        .and(header("Accept", PLUGIN_ACCEPT))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "Implements": ["VolumeDriver"] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manifest = client_for(&server)
        .activate(&CallOptions::retrying())
        .await
        .unwrap();
    assert_eq!(manifest.implements, vec!["VolumeDriver"]);
}

#[tokio::test]
async fn call_sends_json_body_and_decodes_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/VolumeDriver.Mount"))
        .and(body_json(json!({ "Name": "vol1", "ID": "abc" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Mountpoint": "/mnt/vol1" })))
        .mount(&server)
        .await;

    let reply: MountReply = client_for(&server)
        .call(
            "VolumeDriver.Mount",
            Some(&json!({ "Name": "vol1", "ID": "abc" })),
        )
        .await
        .unwrap();
    assert_eq!(reply.mountpoint, "/mnt/vol1");
}

#[tokio::test]
async fn error_status_carries_body_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/VolumeDriver.Remove"))
        .respond_with(ResponseTemplate::new(404).set_body_string("  no such volume\n"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .call_unit("VolumeDriver.Remove", Some(&json!({ "Name": "ghost" })))
        .await
        .unwrap_err();
    match err {
        DockyardError::Status {
            code,
            service,
            message,
        } => {
            assert_eq!(code, 404);
            assert_eq!(service, "VolumeDriver.Remove");
            assert_eq!(message, "no such volume");
        }
        other => panic!("expected Status, got {other:?}"),
    }
}

#[tokio::test]
async fn error_status_with_empty_body_uses_status_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .call_unit::<()>("NetworkDriver.CreateNetwork", None)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, DockyardError::Status { code: 500, message, .. } if message == "500 Internal Server Error"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn malformed_reply_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .call::<(), MountReply>("VolumeDriver.Path", None)
        .await
        .unwrap_err();
    assert!(matches!(err, DockyardError::Decode { service, .. } if service == "VolumeDriver.Path"));
}

#[tokio::test]
async fn call_unit_ignores_reply_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Authz.Ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("whatever"))
        .mount(&server)
        .await;

    client_for(&server)
        .call_unit::<()>("Authz.Ping", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn stream_yields_reply_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/LogDriver.ReadLogs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("line one\nline two\n"))
        .mount(&server)
        .await;

    let stream = client_for(&server)
        .stream::<()>("LogDriver.ReadLogs", None)
        .await
        .unwrap();
    let chunks: Vec<Vec<u8>> = stream.try_collect().await.unwrap();
    assert_eq!(chunks.concat(), b"line one\nline two\n");
}

#[tokio::test]
async fn send_raw_posts_payload_verbatim() {
    let server = MockServer::start().await;
    let payload = b"\x1f\x8b tar bytes".to_vec();
    Mock::given(method("POST"))
        .and(path("/GraphDriver.ApplyDiff"))
        .and(body_bytes(payload.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Size": 12 })))
        .expect(1)
        .mount(&server)
        .await;

    let reply: serde_json::Value = client_for(&server)
        .send_raw("GraphDriver.ApplyDiff", payload)
        .await
        .unwrap();
    assert_eq!(reply["Size"], 12);
}

#[tokio::test]
async fn status_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .activate(&CallOptions::retrying())
        .await
        .unwrap_err();
    assert!(matches!(err, DockyardError::Status { code: 503, .. }));
}

#[tokio::test]
async fn single_attempt_surfaces_dial_error_immediately() {
    let address = closed_tcp_address().await;
    let client = Client::new(&address, None, &ClientTimeouts::default()).unwrap();

    let started = std::time::Instant::now();
    let err = client
        .call_once::<(), serde_json::Value>("Plugin.Activate", None)
        .await
        .unwrap_err();
    assert!(err.is_transient(), "expected transport error, got {err:?}");
    assert!(started.elapsed() < std::time::Duration::from_secs(1));
}

#[tokio::test]
async fn cancelled_call_returns_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Implements": [] }))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let client = client_for(&server);
    let call = {
        let token = token.clone();
        tokio::spawn(async move {
            client
                .activate(&CallOptions::retrying().with_cancel(token))
                .await
        })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    token.cancel();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, DockyardError::Cancelled));
}
