// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the constraints serde cannot express: known log levels, absolute
//! search directories and non-zero timeouts.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::diagnostic::ConfigError;
use crate::model::DockyardConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &DockyardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.log.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of: {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    check_search_paths("plugins.socket_paths", &config.plugins.socket_paths, &mut errors);
    check_search_paths("plugins.spec_paths", &config.plugins.spec_paths, &mut errors);

    if config.plugins.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "plugins.request_timeout_secs must be greater than zero".to_string(),
        });
    }

    if config.plugins.connect_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "plugins.connect_timeout_secs must be greater than zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_search_paths(key: &str, paths: &[PathBuf], errors: &mut Vec<ConfigError>) {
    let mut seen = HashSet::new();
    for (i, path) in paths.iter().enumerate() {
        if path.as_os_str().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{key}[{i}] must not be empty"),
            });
            continue;
        }
        if !path.is_absolute() {
            errors.push(ConfigError::Validation {
                message: format!("{key}[{i}] `{}` must be an absolute path", path.display()),
            });
        }
        if !seen.insert(path) {
            errors.push(ConfigError::Validation {
                message: format!("{key} lists `{}` more than once", path.display()),
            });
        }
    }
}
