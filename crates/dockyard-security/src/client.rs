// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client construction bound to a plugin address scheme.
//!
//! `unix://` addresses get a client that routes every connection through the
//! socket; `http://` (and `tcp://`) use plain TCP; `https://` goes through
//! [`configure_tls`].

use std::time::Duration;

use dockyard_core::{DockyardError, PluginAddress, TlsOptions};
use tracing::{debug, error};

use crate::tls::configure_tls;

/// Dial and overall timeouts for plugin HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// Upper bound for a whole request, body included.
    pub request: Duration,
    /// Upper bound for establishing the connection.
    pub connect: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            connect: Duration::from_secs(10),
        }
    }
}

/// Build a reqwest client able to reach `address`.
///
/// TLS material is only consulted for `https://` addresses.
pub fn build_plugin_client(
    address: &PluginAddress,
    tls: Option<&TlsOptions>,
    timeouts: &ClientTimeouts,
) -> Result<reqwest::Client, DockyardError> {
    let builder = reqwest::Client::builder()
        .timeout(timeouts.request)
        .connect_timeout(timeouts.connect);

    let builder = match address {
        PluginAddress::Unix(path) => unix_socket(builder, path)?,
        PluginAddress::Http(_) => builder,
        PluginAddress::Https(_) => configure_tls(builder, tls)?,
    };

    debug!(address = %address, "building plugin HTTP client");
    builder.build().map_err(|e| {
        error!(address = %address, "failed to build plugin HTTP client: {e}");
        DockyardError::transport(e)
    })
}

#[cfg(unix)]
fn unix_socket(
    builder: reqwest::ClientBuilder,
    path: &std::path::Path,
) -> Result<reqwest::ClientBuilder, DockyardError> {
    Ok(builder.no_proxy().unix_socket(path.to_path_buf()))
}

#[cfg(not(unix))]
fn unix_socket(
    _builder: reqwest::ClientBuilder,
    path: &std::path::Path,
) -> Result<reqwest::ClientBuilder, DockyardError> {
    Err(DockyardError::InvalidAddress {
        address: format!("unix://{}", path.display()),
        reason: "unix sockets are not supported on this platform".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts() {
        let timeouts = ClientTimeouts::default();
        assert_eq!(timeouts.request, Duration::from_secs(30));
        assert_eq!(timeouts.connect, Duration::from_secs(10));
    }

    #[test]
    fn builds_http_client() {
        let address = PluginAddress::parse("tcp://127.0.0.1:9000").unwrap();
        assert!(build_plugin_client(&address, None, &ClientTimeouts::default()).is_ok());
    }

    #[test]
    fn builds_https_client_without_material() {
        let address = PluginAddress::parse("https://plugins.local:8443").unwrap();
        assert!(build_plugin_client(&address, None, &ClientTimeouts::default()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn builds_unix_client() {
        let address = PluginAddress::parse("unix:///run/docker/plugins/ceph.sock").unwrap();
        assert!(build_plugin_client(&address, None, &ClientTimeouts::default()).is_ok());
    }

    #[test]
    fn https_tls_errors_propagate() {
        let address = PluginAddress::parse("https://plugins.local:8443").unwrap();
        let tls = TlsOptions {
            ca_file: Some("/nonexistent/ca.pem".into()),
            ..TlsOptions::default()
        };
        let err = build_plugin_client(&address, Some(&tls), &ClientTimeouts::default())
            .unwrap_err();
        assert!(matches!(err, DockyardError::Io { .. }));
    }

    #[test]
    fn tls_material_ignored_for_plain_http() {
        let address = PluginAddress::parse("http://127.0.0.1:9000").unwrap();
        let tls = TlsOptions {
            ca_file: Some("/nonexistent/ca.pem".into()),
            ..TlsOptions::default()
        };
        assert!(build_plugin_client(&address, Some(&tls), &ClientTimeouts::default()).is_ok());
    }
}
