// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Dockyard.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Dockyard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DockyardConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Plugin discovery and transport settings.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Plugin discovery and transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Directories scanned recursively for `<name>.sock` unix sockets.
    #[serde(default = "default_socket_paths")]
    pub socket_paths: Vec<PathBuf>,

    /// Directories scanned recursively for `<name>.spec` and `<name>.json` files.
    #[serde(default = "default_spec_paths")]
    pub spec_paths: Vec<PathBuf>,

    /// Upper bound for a single plugin request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Upper bound for establishing a connection, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            socket_paths: default_socket_paths(),
            spec_paths: default_spec_paths(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Default socket directories, matching the legacy plugin layout.
pub fn default_socket_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/run/docker/plugins"),
        PathBuf::from("/var/run/docker/plugins"),
    ]
}

/// Default spec directories: system, vendor, local and per-user.
pub fn default_spec_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/etc/docker/plugins"),
        PathBuf::from("/usr/lib/docker/plugins"),
        PathBuf::from("/usr/local/lib/docker/plugins"),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("docker").join("plugins"));
    }
    paths
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}
