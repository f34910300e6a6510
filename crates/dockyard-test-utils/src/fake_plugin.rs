// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process plugin backend for integration tests.
//!
//! `FakePlugin` answers the `Plugin.Activate` handshake with a configured
//! capability list and replies to other services from a route table. Every
//! request is recorded so tests can assert on headers and bodies.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use dockyard_core::HANDSHAKE_SERVICE;
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A request received by a [`FakePlugin`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Service path without the leading slash, e.g. `VolumeDriver.Mount`.
    pub service: String,
    pub accept: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// The body parsed as JSON, or `Null` when empty or not JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone)]
struct Reply {
    status: StatusCode,
    body: String,
}

struct Shared {
    implements: Vec<String>,
    handshake_delay: Duration,
    routes: HashMap<String, Reply>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Builder for a fake plugin backend.
#[derive(Debug, Clone, Default)]
pub struct FakePlugin {
    implements: Vec<String>,
    handshake_delay: Duration,
    routes: HashMap<String, Reply>,
}

impl FakePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities advertised in the handshake.
    pub fn implements<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implements = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Delays the handshake reply, to keep a probe in flight.
    pub fn handshake_delay(mut self, delay: Duration) -> Self {
        self.handshake_delay = delay;
        self
    }

    /// Replies `200 OK` with `body` to `service`.
    pub fn route(self, service: &str, body: serde_json::Value) -> Self {
        self.route_raw(service, StatusCode::OK, body.to_string())
    }

    /// Replies with an arbitrary status and raw body to `service`.
    pub fn route_raw(mut self, service: &str, status: StatusCode, body: impl Into<String>) -> Self {
        self.routes.insert(
            service.to_string(),
            Reply {
                status,
                body: body.into(),
            },
        );
        self
    }

    fn into_shared(self) -> Arc<Shared> {
        Arc::new(Shared {
            implements: self.implements,
            handshake_delay: self.handshake_delay,
            routes: self.routes,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Serves on a unix socket at `path`, which must not exist yet.
    pub async fn serve_unix(self, path: &Path) -> std::io::Result<FakePluginHandle> {
        let listener = UnixListener::bind(path)?;
        let shared = self.into_shared();
        let shutdown = CancellationToken::new();
        let task = spawn_server(listener, Arc::clone(&shared), shutdown.clone());
        tracing::debug!(path = %path.display(), "fake plugin listening on unix socket");
        Ok(FakePluginHandle {
            address: format!("unix://{}", path.display()),
            socket: Some(path.to_path_buf()),
            shared,
            shutdown,
            task,
        })
    }

    /// Serves on an ephemeral TCP port on 127.0.0.1.
    pub async fn serve_tcp(self) -> std::io::Result<FakePluginHandle> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let local = listener.local_addr()?;
        let shared = self.into_shared();
        let shutdown = CancellationToken::new();
        let task = spawn_server(listener, Arc::clone(&shared), shutdown.clone());
        tracing::debug!(%local, "fake plugin listening on tcp");
        Ok(FakePluginHandle {
            address: format!("tcp://{local}"),
            socket: None,
            shared,
            shutdown,
            task,
        })
    }
}

fn spawn_server<L>(listener: L, shared: Arc<Shared>, shutdown: CancellationToken) -> JoinHandle<()>
where
    L: axum::serve::Listener,
    L::Addr: std::fmt::Debug,
{
    let app = Router::new().fallback(dispatch).with_state(shared);
    tokio::spawn(async move {
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await });
        if let Err(e) = server.await {
            tracing::warn!("fake plugin server stopped: {e}");
        }
    })
}

async fn dispatch(
    State(shared): State<Arc<Shared>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let service = uri.path().trim_start_matches('/').to_string();
    let accept = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Ok(mut requests) = shared.requests.lock() {
        requests.push(RecordedRequest {
            service: service.clone(),
            accept,
            body: body.to_vec(),
        });
    }

    if service == HANDSHAKE_SERVICE && !shared.routes.contains_key(HANDSHAKE_SERVICE) {
        if !shared.handshake_delay.is_zero() {
            tokio::time::sleep(shared.handshake_delay).await;
        }
        let manifest = serde_json::json!({ "Implements": shared.implements });
        return json_response(StatusCode::OK, manifest.to_string());
    }

    match shared.routes.get(&service) {
        Some(reply) => json_response(reply.status, reply.body.clone()),
        None => (StatusCode::NOT_FOUND, format!("unknown service {service}")).into_response(),
    }
}

fn json_response(status: StatusCode, body: String) -> Response {
    (status, [(CONTENT_TYPE, "application/json")], body).into_response()
}

/// A running fake plugin. The server stops when the handle is dropped.
pub struct FakePluginHandle {
    address: String,
    socket: Option<PathBuf>,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl FakePluginHandle {
    /// Literal address of the backend, e.g. `tcp://127.0.0.1:40123`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Socket path for unix-served plugins.
    pub fn socket_path(&self) -> Option<&Path> {
        self.socket.as_deref()
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared
            .requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of requests received for `service`.
    pub fn calls(&self, service: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.service == service)
            .count()
    }

    /// Stops the server and waits for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for FakePluginHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.task.abort();
    }
}
