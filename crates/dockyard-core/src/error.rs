// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Dockyard plugin subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type returned by plugin discovery, activation and calls.
#[derive(Debug, Error)]
pub enum DockyardError {
    /// No socket, spec or JSON file in the search paths resolves to the name.
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    /// The plugin was found and activated but does not advertise the capability.
    #[error("plugin {name} does not implement {capability}")]
    NotImplemented { name: String, capability: String },

    /// The backend answered with an HTTP status of 400 or above.
    ///
    /// `message` is the trimmed response body. When the body is empty or
    /// cannot be read it holds the status line instead, e.g.
    /// `"500 Internal Server Error"`.
    #[error("plugin {service} returned status {code}: {message}")]
    Status {
        code: u16,
        service: String,
        message: String,
    },

    /// Network-level failure (connection refused, DNS, TLS handshake, timeout).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Response body was not valid JSON for the expected type.
    #[error("failed to decode response from {service}: {source}")]
    Decode {
        service: String,
        source: serde_json::Error,
    },

    /// Request body could not be serialized.
    #[error("failed to encode request for {service}: {source}")]
    Encode {
        service: String,
        source: serde_json::Error,
    },

    /// Plugin names must be a single path component.
    #[error("invalid plugin name `{0}`")]
    InvalidName(String),

    /// A spec or JSON file carried an address we cannot dial.
    #[error("invalid plugin address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// TLS material could not be loaded.
    #[error("tls error: {0}")]
    Tls(String),

    /// Filesystem errors during discovery.
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DockyardError {
    /// Wraps a network-level failure, keeping the original error as the source.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DockyardError::Transport {
            message: err.to_string(),
            source: Box::new(err),
        }
    }

    /// True for errors worth retrying inside the backoff budget.
    pub fn is_transient(&self) -> bool {
        matches!(self, DockyardError::Transport { .. })
    }
}
