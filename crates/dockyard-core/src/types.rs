// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire and data types shared by the plugin subsystem and its callers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

use crate::error::DockyardError;

/// Service path of the capability handshake every backend must answer.
pub const HANDSHAKE_SERVICE: &str = "Plugin.Activate";

/// `Accept` header sent with every plugin request.
pub const PLUGIN_ACCEPT: &str = "application/vnd.docker.plugins.v1.1+json";

/// Host used in request URLs when the connection goes over a unix socket.
pub const UNIX_SOCKET_HOST: &str = "plugin.sock";

/// Body of a successful handshake: the capabilities a plugin implements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "Implements", default)]
    pub implements: Vec<String>,
}

impl Manifest {
    /// Returns true if `capability` is among the advertised capabilities.
    pub fn implements(&self, capability: &str) -> bool {
        self.implements.iter().any(|c| c == capability)
    }
}

/// TLS material for `https://` plugins, as found in `.json` spec files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOptions {
    #[serde(rename = "CAFile", default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    #[serde(rename = "CertFile", default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,
    #[serde(rename = "KeyFile", default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    #[serde(rename = "InsecureSkipVerify", default)]
    pub insecure_skip_verify: bool,
}

/// Content of a `<name>.json` plugin spec file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSpec {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Addr")]
    pub addr: String,
    #[serde(rename = "TLSConfig", default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsOptions>,
}

/// URL schemes accepted in plugin addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    Unix,
    Tcp,
    Http,
    Https,
}

/// A parsed, dialable plugin address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginAddress {
    /// `unix:///path/to/plugin.sock`
    Unix(PathBuf),
    /// `http://host:port` or `tcp://host:port`, carried as plain HTTP.
    Http(Url),
    /// `https://host:port`
    Https(Url),
}

impl PluginAddress {
    /// Parses a literal address such as `unix:///run/docker/plugins/x.sock`
    /// or `tcp://127.0.0.1:8080`.
    pub fn parse(address: &str) -> Result<Self, DockyardError> {
        let address = address.trim();
        let invalid = |reason: &str| DockyardError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = address
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        let scheme = Scheme::from_str(&scheme.to_ascii_lowercase())
            .map_err(|_| invalid("unknown protocol"))?;

        match scheme {
            Scheme::Unix => {
                if rest.is_empty() {
                    return Err(invalid("empty socket path"));
                }
                Ok(PluginAddress::Unix(PathBuf::from(rest)))
            }
            Scheme::Tcp | Scheme::Http | Scheme::Https => {
                let target = if scheme == Scheme::Https { "https" } else { "http" };
                let url = Url::parse(&format!("{target}://{rest}"))
                    .map_err(|e| invalid(&e.to_string()))?;
                if url.host_str().is_none_or(str::is_empty) {
                    return Err(invalid("missing host"));
                }
                if scheme == Scheme::Https {
                    Ok(PluginAddress::Https(url))
                } else {
                    Ok(PluginAddress::Http(url))
                }
            }
        }
    }

    /// Base URL requests are issued against, without a trailing slash.
    ///
    /// Unix sockets get a placeholder host; the connection itself is routed
    /// to the socket by the HTTP client.
    pub fn base_url(&self) -> String {
        match self {
            PluginAddress::Unix(_) => format!("http://{UNIX_SOCKET_HOST}"),
            PluginAddress::Http(url) | PluginAddress::Https(url) => {
                url.as_str().trim_end_matches('/').to_string()
            }
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, PluginAddress::Https(_))
    }
}

impl fmt::Display for PluginAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginAddress::Unix(path) => write!(f, "unix://{}", path.display()),
            PluginAddress::Http(url) | PluginAddress::Https(url) => {
                write!(f, "{}", url.as_str().trim_end_matches('/'))
            }
        }
    }
}

impl FromStr for PluginAddress {
    type Err = DockyardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginAddress::parse(s)
    }
}
