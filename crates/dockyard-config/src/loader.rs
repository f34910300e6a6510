// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./dockyard.toml` > `~/.config/dockyard/dockyard.toml` > `/etc/dockyard/dockyard.toml`
//! with environment variable overrides via `DOCKYARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::DockyardConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/dockyard/dockyard.toml";

/// Configuration file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "dockyard.toml";

/// Per-user configuration file under the XDG config directory.
pub fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dockyard/dockyard.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/dockyard/dockyard.toml` (system-wide)
/// 3. `~/.config/dockyard/dockyard.toml` (user XDG config)
/// 4. `./dockyard.toml` (local directory)
/// 5. `DOCKYARD_*` environment variables
pub fn load_config() -> Result<DockyardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<DockyardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DockyardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DockyardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DockyardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DockyardConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `DOCKYARD_PLUGINS_SOCKET_PATHS` must map to
/// `plugins.socket_paths`, not `plugins.socket.paths`.
fn env_provider() -> Env {
    // DOCKYARD_PLUGINS_REQUEST_TIMEOUT_SECS arrives here as "plugins_request_timeout_secs".
    Env::prefixed("DOCKYARD_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a prefix-stripped, lowercased env key onto its dotted config path.
pub fn map_env_key(key: &str) -> String {
    for section in ["log", "plugins"] {
        if let Some(field) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}
