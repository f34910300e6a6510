// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dockyard plugin` subcommands.
//!
//! Discovery-only commands (`scan`, `ls` without a capability) never contact
//! a backend. `ls --capability`, `inspect` and `call` activate plugins
//! through the registry.

use std::io::IsTerminal;

use dockyard_core::DockyardError;
use dockyard_plugin::{CallOptions, CandidateKind, Plugin, PluginSource, Registry};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// One row of `dockyard plugin ls` output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PluginRow {
    pub name: String,
    pub source: String,
    pub address: String,
    /// `None` when the plugin was not activated.
    pub implements: Option<Vec<String>>,
}

impl PluginRow {
    fn from_source(source: &PluginSource) -> Self {
        Self {
            name: source.name.clone(),
            source: kind_label(source.candidate.kind()).to_string(),
            address: source.address.to_string(),
            implements: None,
        }
    }

    fn from_plugin(plugin: &Plugin, source: &str) -> Self {
        Self {
            name: plugin.name().to_string(),
            source: source.to_string(),
            address: plugin.address().to_string(),
            implements: Some(plugin.capabilities().to_vec()),
        }
    }
}

/// Detailed view of one activated plugin, for `dockyard plugin inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct PluginDetail {
    pub name: String,
    pub address: String,
    pub tls: bool,
    pub insecure_skip_verify: bool,
    pub implements: Vec<String>,
}

impl From<&Plugin> for PluginDetail {
    fn from(plugin: &Plugin) -> Self {
        Self {
            name: plugin.name().to_string(),
            address: plugin.address().to_string(),
            tls: plugin.address().is_tls(),
            insecure_skip_verify: plugin.tls().is_some_and(|t| t.insecure_skip_verify),
            implements: plugin.capabilities().to_vec(),
        }
    }
}

fn kind_label(kind: CandidateKind) -> &'static str {
    match kind {
        CandidateKind::UnixSocket => "socket",
        CandidateKind::SpecFile => "spec",
        CandidateKind::JsonFile => "json",
    }
}

/// Collects `ls` rows. With a capability, plugins are activated and
/// filtered; without one, candidates are only resolved.
pub async fn list_rows(
    registry: &Registry,
    capability: Option<&str>,
) -> Result<Vec<PluginRow>, DockyardError> {
    if let Some(capability) = capability {
        let mut rows: Vec<PluginRow> = registry
            .get_all(capability)
            .await?
            .iter()
            .map(|plugin| PluginRow::from_plugin(plugin, "active"))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        return Ok(rows);
    }

    let mut rows = Vec::new();
    for name in registry.scan_directories().await? {
        match registry.resolve(&name).await {
            Ok(source) => rows.push(PluginRow::from_source(&source)),
            Err(e) => tracing::warn!(plugin = %name, "cannot resolve plugin: {e}"),
        }
    }
    Ok(rows)
}

/// Run `dockyard plugin ls`.
pub async fn run_ls(
    registry: &Registry,
    capability: Option<&str>,
    json: bool,
    plain: bool,
) -> Result<(), DockyardError> {
    let rows = list_rows(registry, capability).await?;
    if json {
        print_json(&rows);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No plugins found.");
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for row in &rows {
        let implements = row
            .implements
            .as_ref()
            .map(|caps| caps.join(","))
            .unwrap_or_else(|| "-".to_string());
        if use_color {
            use colored::Colorize;
            println!(
                "  {:<width$}  {:<6}  {}  {}",
                row.name.bold(),
                row.source.dimmed(),
                row.address,
                implements.green(),
            );
        } else {
            println!(
                "  {:<width$}  {:<6}  {}  {}",
                row.name, row.source, row.address, implements
            );
        }
    }
    Ok(())
}

/// Run `dockyard plugin scan`: one discovered name per line.
pub async fn run_scan(registry: &Registry) -> Result<(), DockyardError> {
    for name in registry.scan_directories().await? {
        println!("{name}");
    }
    Ok(())
}

/// Activates `name`, requiring `capability` when one is given.
pub async fn activate(
    registry: &Registry,
    name: &str,
    capability: Option<&str>,
    cancel: &CancellationToken,
) -> Result<std::sync::Arc<Plugin>, DockyardError> {
    match capability {
        Some(capability) => registry.get_with_cancel(capability, name, cancel).await,
        None => {
            let source = registry.resolve(name).await?;
            registry
                .probe_and_cache(source, &CallOptions::retrying().with_cancel(cancel.clone()))
                .await
        }
    }
}

/// Run `dockyard plugin inspect`.
pub async fn run_inspect(
    registry: &Registry,
    name: &str,
    capability: Option<&str>,
    json: bool,
    cancel: &CancellationToken,
) -> Result<(), DockyardError> {
    let plugin = activate(registry, name, capability, cancel).await?;
    let detail = PluginDetail::from(plugin.as_ref());

    if json {
        print_json(&detail);
        return Ok(());
    }

    println!();
    println!("  plugin {}", detail.name);
    println!("  {}", "-".repeat(35));
    println!("    Address:    {}", detail.address);
    if detail.tls {
        let mode = if detail.insecure_skip_verify {
            "insecure"
        } else {
            "verified"
        };
        println!("    TLS:        {mode}");
    }
    println!("    Implements: {}", detail.implements.join(", "));
    println!();
    Ok(())
}

/// Run `dockyard plugin call`: posts `data` to `service` and prints the
/// JSON reply.
pub async fn run_call(
    registry: &Registry,
    name: &str,
    service: &str,
    data: Option<&str>,
    cancel: &CancellationToken,
) -> Result<(), DockyardError> {
    let body = parse_body(data)?;
    let plugin = activate(registry, name, None, cancel).await?;
    let opts = CallOptions::retrying().with_cancel(cancel.clone());
    let reply: serde_json::Value = plugin.client().call_with(service, body.as_ref(), &opts).await?;
    print_json(&reply);
    Ok(())
}

fn parse_body(data: Option<&str>) -> Result<Option<serde_json::Value>, DockyardError> {
    data.map(|raw| {
        serde_json::from_str(raw)
            .map_err(|e| DockyardError::Config(format!("--data is not valid JSON: {e}")))
    })
    .transpose()
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}
