// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dockyard - discovery and inspection of out-of-process engine plugins.
//!
//! This is the binary entry point for the `dockyard` CLI.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod plugin;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dockyard_config::DockyardConfig;
use dockyard_plugin::Registry;
use tokio_util::sync::CancellationToken;

/// Dockyard - discovery and inspection of out-of-process engine plugins.
#[derive(Parser, Debug)]
#[command(name = "dockyard", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover, activate and call plugins.
    Plugin {
        #[command(subcommand)]
        action: PluginCommands,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommands {
    /// List discovered plugins.
    Ls {
        /// Only list plugins implementing this capability (activates them).
        #[arg(long)]
        capability: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Print every plugin name found in the search paths.
    Scan,
    /// Activate one plugin and show its capabilities.
    Inspect {
        name: String,
        /// Fail unless the plugin implements this capability.
        #[arg(long)]
        capability: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Call a service on a plugin and print the JSON reply.
    Call {
        name: String,
        service: String,
        /// JSON request body.
        #[arg(long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => dockyard_config::load_and_validate_path(path),
        None => dockyard_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            dockyard_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    let Some(Commands::Plugin { action }) = cli.command else {
        println!("dockyard: use --help for available commands");
        return;
    };

    if let Err(e) = run_plugin_command(&config, action).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run_plugin_command(
    config: &DockyardConfig,
    action: PluginCommands,
) -> Result<(), dockyard_core::DockyardError> {
    let registry = Registry::from_config(&config.plugins);
    let cancel = cancel_on_ctrl_c();

    match action {
        PluginCommands::Ls {
            capability,
            json,
            plain,
        } => plugin::run_ls(&registry, capability.as_deref(), json, plain).await,
        PluginCommands::Scan => plugin::run_scan(&registry).await,
        PluginCommands::Inspect {
            name,
            capability,
            json,
        } => plugin::run_inspect(&registry, &name, capability.as_deref(), json, &cancel).await,
        PluginCommands::Call {
            name,
            service,
            data,
        } => plugin::run_call(&registry, &name, &service, data.as_deref(), &cancel).await,
    }
}

/// A token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            child.cancel();
        }
    });
    token
}

/// Initialize the tracing subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dockyard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_plugin_call() {
        let cli = Cli::try_parse_from([
            "dockyard",
            "--config",
            "/tmp/dockyard.toml",
            "plugin",
            "call",
            "ultron",
            "VolumeDriver.List",
            "--data",
            "{}",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/dockyard.toml")));
        match cli.command {
            Some(Commands::Plugin {
                action:
                    PluginCommands::Call {
                        name,
                        service,
                        data,
                    },
            }) => {
                assert_eq!(name, "ultron");
                assert_eq!(service, "VolumeDriver.List");
                assert_eq!(data.as_deref(), Some("{}"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = dockyard_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.log.level, "info");
        assert_eq!(config.plugins.request_timeout_secs, 30);
    }
}
