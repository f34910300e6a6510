// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport to a single plugin backend.
//!
//! Every call is a `POST <base>/<service>` carrying the plugin `Accept`
//! header and an optional JSON body. Transport failures are retried within
//! the shared backoff budget when the caller allows it; HTTP error statuses
//! are never retried.

use std::pin::Pin;

use dockyard_core::{
    DockyardError, HANDSHAKE_SERVICE, Manifest, PLUGIN_ACCEPT, PluginAddress, TlsOptions,
};
use dockyard_security::{build_plugin_client, ClientTimeouts};
use futures::{Stream, TryStreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backoff::{cancellable, Retry};

/// Byte stream returned by [`Client::stream`].
pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<Vec<u8>, DockyardError>> + Send + 'static>>;

/// Per-call behavior: whether transport failures are retried, and an
/// optional token that aborts the call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub retry: bool,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    /// Retry transport failures within the backoff budget.
    pub fn retrying() -> Self {
        Self {
            retry: true,
            cancel: None,
        }
    }

    /// A single attempt; transport failures are returned immediately.
    pub fn once() -> Self {
        Self {
            retry: false,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// HTTP client bound to one plugin address.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a client for `address`, loading TLS material for `https://`.
    pub fn new(
        address: &PluginAddress,
        tls: Option<&TlsOptions>,
        timeouts: &ClientTimeouts,
    ) -> Result<Self, DockyardError> {
        let http = build_plugin_client(address, tls, timeouts)?;
        Ok(Self {
            http,
            base_url: address.base_url(),
        })
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Calls `service` with retry and decodes the JSON reply into `T`.
    pub async fn call<B, T>(&self, service: &str, body: Option<&B>) -> Result<T, DockyardError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_with(service, body, &CallOptions::retrying()).await
    }

    /// Calls `service` with retry and discards the reply body.
    pub async fn call_unit<B>(&self, service: &str, body: Option<&B>) -> Result<(), DockyardError>
    where
        B: Serialize + ?Sized,
    {
        let payload = encode(service, body)?;
        self.send(service, payload, &CallOptions::retrying())
            .await
            .map(drop)
    }

    /// Calls `service` once, without retrying transport failures.
    pub async fn call_once<B, T>(&self, service: &str, body: Option<&B>) -> Result<T, DockyardError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_with(service, body, &CallOptions::once()).await
    }

    /// Calls `service` with explicit options and decodes the JSON reply into `T`.
    pub async fn call_with<B, T>(
        &self,
        service: &str,
        body: Option<&B>,
        opts: &CallOptions,
    ) -> Result<T, DockyardError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = encode(service, body)?;
        let response = self.send(service, payload, opts).await?;
        decode(service, response, opts).await
    }

    /// Performs the capability handshake.
    pub async fn activate(&self, opts: &CallOptions) -> Result<Manifest, DockyardError> {
        self.call_with::<(), Manifest>(HANDSHAKE_SERVICE, None, opts)
            .await
    }

    /// Calls `service` and returns the reply body as a byte stream.
    pub async fn stream<B>(&self, service: &str, body: Option<&B>) -> Result<ByteStream, DockyardError>
    where
        B: Serialize + ?Sized,
    {
        let payload = encode(service, body)?;
        let response = self
            .send(service, payload, &CallOptions::retrying())
            .await?;
        let stream = response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(DockyardError::transport);
        Ok(Box::pin(stream))
    }

    /// Posts an already-encoded payload (for example a tar archive) and
    /// decodes the JSON reply into `T`.
    pub async fn send_raw<T>(&self, service: &str, payload: Vec<u8>) -> Result<T, DockyardError>
    where
        T: DeserializeOwned,
    {
        let opts = CallOptions::retrying();
        let response = self.send(service, Some(payload), &opts).await?;
        decode(service, response, &opts).await
    }

    /// Issues the request, retrying transport failures when allowed, and
    /// maps HTTP error statuses to [`DockyardError::Status`].
    async fn send(
        &self,
        service: &str,
        payload: Option<Vec<u8>>,
        opts: &CallOptions,
    ) -> Result<reqwest::Response, DockyardError> {
        let url = format!("{}/{}", self.base_url, service);
        let mut retry = Retry::new();

        let response = loop {
            let mut request = self
                .http
                .post(&url)
                .header(ACCEPT, HeaderValue::from_static(PLUGIN_ACCEPT));
            if let Some(bytes) = &payload {
                request = request
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                    .body(bytes.clone());
            }

            match cancellable(opts.cancel.as_ref(), request.send()).await? {
                Ok(response) => break response,
                Err(e) => {
                    if !opts.retry {
                        return Err(DockyardError::transport(e));
                    }
                    warn!(url = %url, "plugin request failed: {e}");
                    if !retry.wait(service, opts.cancel.as_ref()).await? {
                        return Err(DockyardError::transport(e));
                    }
                }
            }
        };

        let status = response.status();
        debug!(url = %url, status = %status, "plugin response received");

        if status.as_u16() >= 400 {
            let fallback = status.to_string();
            let message = match cancellable(opts.cancel.as_ref(), response.text()).await? {
                Ok(body) if !body.trim().is_empty() => body.trim().to_string(),
                _ => fallback,
            };
            return Err(DockyardError::Status {
                code: status.as_u16(),
                service: service.to_string(),
                message,
            });
        }

        Ok(response)
    }
}

fn encode<B>(service: &str, body: Option<&B>) -> Result<Option<Vec<u8>>, DockyardError>
where
    B: Serialize + ?Sized,
{
    body.map(|b| {
        serde_json::to_vec(b).map_err(|source| DockyardError::Encode {
            service: service.to_string(),
            source,
        })
    })
    .transpose()
}

async fn decode<T>(
    service: &str,
    response: reqwest::Response,
    opts: &CallOptions,
) -> Result<T, DockyardError>
where
    T: DeserializeOwned,
{
    let bytes = cancellable(opts.cancel.as_ref(), response.bytes())
        .await?
        .map_err(DockyardError::transport)?;
    serde_json::from_slice(&bytes).map_err(|source| DockyardError::Decode {
        service: service.to_string(),
        source,
    })
}
