// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin registry: name lookup, activation and caching.
//!
//! The `Registry` owns every activated [`Plugin`]. A name is resolved and
//! probed at most once at a time: concurrent first lookups of the same name
//! wait on one shared in-flight cell. A failed probe removes its cell, so the
//! next lookup starts over.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use dockyard_config::PluginsConfig;
use dockyard_core::DockyardError;
use dockyard_security::ClientTimeouts;
use futures::future::join_all;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::{cancellable, Retry};
use crate::client::CallOptions;
use crate::discovery::{self, SearchPaths};
use crate::plugin::{Plugin, PluginSource};

type PluginCell = Arc<OnceCell<Arc<Plugin>>>;

/// Callback invoked when a plugin implementing a capability is activated.
pub type ActivationHandler = Arc<dyn Fn(&Plugin) + Send + Sync>;

enum CellState {
    Ready(Arc<Plugin>),
    Probing,
    Vacant,
}

#[derive(Default)]
struct Activations {
    handlers: HashMap<String, Vec<ActivationHandler>>,
    activated: HashMap<String, Arc<Plugin>>,
}

/// Registry of out-of-process plugins, keyed by name.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct Registry {
    paths: ArcSwap<SearchPaths>,
    timeouts: ClientTimeouts,
    plugins: Mutex<HashMap<String, PluginCell>>,
    activations: Mutex<Activations>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("paths", &self.paths.load_full())
            .field("timeouts", &self.timeouts)
            .field("cached", &lock(&self.plugins).len())
            .finish()
    }
}

impl Registry {
    pub fn new(paths: SearchPaths, timeouts: ClientTimeouts) -> Self {
        Self {
            paths: ArcSwap::from_pointee(paths),
            timeouts,
            plugins: Mutex::new(HashMap::new()),
            activations: Mutex::new(Activations::default()),
        }
    }

    /// Builds a registry from the `[plugins]` configuration section.
    pub fn from_config(config: &PluginsConfig) -> Self {
        Self::new(
            SearchPaths::new(config.socket_paths.clone(), config.spec_paths.clone()),
            ClientTimeouts {
                request: Duration::from_secs(config.request_timeout_secs),
                connect: Duration::from_secs(config.connect_timeout_secs),
            },
        )
    }

    /// Snapshot of the current search paths.
    pub fn search_paths(&self) -> Arc<SearchPaths> {
        self.paths.load_full()
    }

    pub fn set_socket_paths(&self, sockets: Vec<PathBuf>) {
        self.paths.rcu(|current| SearchPaths {
            sockets: sockets.clone(),
            specs: current.specs.clone(),
        });
    }

    pub fn set_spec_paths(&self, specs: Vec<PathBuf>) {
        self.paths.rcu(|current| SearchPaths {
            sockets: current.sockets.clone(),
            specs: specs.clone(),
        });
    }

    /// Looks up `name` and checks that it implements `capability`.
    ///
    /// On a cache miss the name is resolved and probed, retrying both
    /// resolution misses and transport failures within the backoff budget.
    pub async fn get(&self, capability: &str, name: &str) -> Result<Arc<Plugin>, DockyardError> {
        self.get_inner(capability, name, CallOptions::retrying()).await
    }

    /// Like [`Registry::get`], aborting with [`DockyardError::Cancelled`]
    /// once `cancel` fires. A cancelled lookup leaves nothing cached.
    pub async fn get_with_cancel(
        &self,
        capability: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<Plugin>, DockyardError> {
        let opts = CallOptions::retrying().with_cancel(cancel.clone());
        self.get_inner(capability, name, opts).await
    }

    async fn get_inner(
        &self,
        capability: &str,
        name: &str,
        opts: CallOptions,
    ) -> Result<Arc<Plugin>, DockyardError> {
        discovery::validate_name(name)?;
        let plugin = self
            .settle(name, self.resolve_and_activate(name, &opts))
            .await?;

        if plugin.implements(capability) {
            Ok(plugin)
        } else {
            Err(DockyardError::NotImplemented {
                name: name.to_string(),
                capability: capability.to_string(),
            })
        }
    }

    /// Returns every discoverable plugin implementing `capability`.
    ///
    /// Uncached candidates are probed concurrently with a single attempt
    /// each. A candidate another caller is still probing gets its own
    /// uncached attempt instead of waiting on that probe. Candidates that
    /// fail to resolve or activate are skipped.
    pub async fn get_all(&self, capability: &str) -> Result<Vec<Arc<Plugin>>, DockyardError> {
        let names = self.scan_directories().await?;
        debug!(capability, candidates = names.len(), "probing plugin candidates");

        let probes = names.into_iter().map(|name| async move {
            let opts = CallOptions::once();
            let result = match self.peek(&name) {
                CellState::Ready(plugin) => Ok(plugin),
                CellState::Probing => self.probe_uncached(&name, &opts).await,
                CellState::Vacant => {
                    self.settle(&name, self.resolve_and_activate(&name, &opts))
                        .await
                }
            };
            match result {
                Ok(plugin) => Some(plugin),
                Err(e) => {
                    warn!(plugin = %name, capability, "skipping plugin: {e}");
                    None
                }
            }
        });

        Ok(join_all(probes)
            .await
            .into_iter()
            .flatten()
            .filter(|plugin| plugin.implements(capability))
            .collect())
    }

    /// Names of every candidate under the current search paths.
    pub async fn scan_directories(&self) -> Result<BTreeSet<String>, DockyardError> {
        let paths = self.search_paths();
        blocking(move || discovery::scan_directories(&paths)).await
    }

    /// Resolves `name` to its endpoint without activating it.
    pub async fn resolve(&self, name: &str) -> Result<PluginSource, DockyardError> {
        let paths = self.search_paths();
        let owned = name.to_string();
        let candidate = blocking(move || discovery::resolve(&paths, &owned)).await?;
        PluginSource::from_candidate(name, candidate)
    }

    /// Activates an already-resolved plugin and caches it under its name.
    ///
    /// If the name is already cached or being probed, the existing result is
    /// returned instead.
    pub async fn probe_and_cache(
        &self,
        source: PluginSource,
        opts: &CallOptions,
    ) -> Result<Arc<Plugin>, DockyardError> {
        let name = source.name.clone();
        discovery::validate_name(&name)?;
        self.settle(&name, async {
            let plugin = source.activate(&self.timeouts, opts).await?;
            Ok(self.announce(plugin))
        })
        .await
    }

    /// Registers `handler` for plugins implementing `capability`.
    ///
    /// It runs for every already-activated plugin with the capability and,
    /// from then on, once per activation. Handlers run outside the registry
    /// locks and may call back into the registry.
    pub fn on_activate<F>(&self, capability: &str, handler: F)
    where
        F: Fn(&Plugin) + Send + Sync + 'static,
    {
        let handler: ActivationHandler = Arc::new(handler);
        let seen: Vec<Arc<Plugin>> = {
            let mut activations = lock(&self.activations);
            activations
                .handlers
                .entry(capability.to_string())
                .or_default()
                .push(Arc::clone(&handler));
            activations
                .activated
                .values()
                .filter(|plugin| plugin.implements(capability))
                .cloned()
                .collect()
        };
        for plugin in &seen {
            handler(plugin);
        }
    }

    /// Activated plugins currently held in the cache.
    pub fn cached(&self) -> Vec<Arc<Plugin>> {
        lock(&self.plugins)
            .values()
            .filter_map(|cell| cell.get().cloned())
            .collect()
    }

    /// Drops `name` from the cache so the next lookup probes it again.
    pub fn evict(&self, name: &str) -> Option<Arc<Plugin>> {
        let cell = lock(&self.plugins).remove(name);
        lock(&self.activations).activated.remove(name);
        let plugin = cell.and_then(|cell| cell.get().cloned());
        if plugin.is_some() {
            info!(plugin = name, "plugin evicted");
        }
        plugin
    }

    fn peek(&self, name: &str) -> CellState {
        match lock(&self.plugins).get(name) {
            None => CellState::Vacant,
            Some(cell) => cell
                .get()
                .map_or(CellState::Probing, |plugin| CellState::Ready(Arc::clone(plugin))),
        }
    }

    /// Single activation of `name` that bypasses the cache. Handlers are not
    /// run; the in-flight probe that owns the cell announces the plugin.
    async fn probe_uncached(
        &self,
        name: &str,
        opts: &CallOptions,
    ) -> Result<Arc<Plugin>, DockyardError> {
        debug!(plugin = name, "probe in flight elsewhere, trying once uncached");
        let source = self.resolve(name).await?;
        Ok(Arc::new(source.activate(&self.timeouts, opts).await?))
    }

    /// Runs `init` through the cell for `name`, sharing an in-flight probe
    /// with concurrent callers and removing the cell if it fails.
    async fn settle<F>(&self, name: &str, init: F) -> Result<Arc<Plugin>, DockyardError>
    where
        F: Future<Output = Result<Arc<Plugin>, DockyardError>>,
    {
        let cell = lock(&self.plugins)
            .entry(name.to_string())
            .or_default()
            .clone();

        match cell.get_or_try_init(|| init).await {
            Ok(plugin) => {
                let plugin = Arc::clone(plugin);
                lock(&self.plugins)
                    .entry(name.to_string())
                    .or_insert(cell);
                Ok(plugin)
            }
            Err(e) => {
                let mut plugins = lock(&self.plugins);
                if plugins
                    .get(name)
                    .is_some_and(|current| Arc::ptr_eq(current, &cell))
                    && !cell.initialized()
                {
                    plugins.remove(name);
                }
                Err(e)
            }
        }
    }

    async fn resolve_and_activate(
        &self,
        name: &str,
        opts: &CallOptions,
    ) -> Result<Arc<Plugin>, DockyardError> {
        let source = self.resolve_with_retry(name, opts).await?;
        let plugin = source.activate(&self.timeouts, opts).await?;
        Ok(self.announce(plugin))
    }

    async fn resolve_with_retry(
        &self,
        name: &str,
        opts: &CallOptions,
    ) -> Result<PluginSource, DockyardError> {
        let mut retry = Retry::new();
        loop {
            match cancellable(opts.cancel.as_ref(), self.resolve(name)).await? {
                Ok(source) => return Ok(source),
                Err(e @ DockyardError::NotFound { .. }) if opts.retry => {
                    debug!(plugin = name, attempt = retry.attempt(), "plugin not found yet");
                    if !retry.wait("resolve", opts.cancel.as_ref()).await? {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Records a freshly activated plugin and runs matching handlers.
    ///
    /// The plugin is recorded and the handlers snapshotted under one lock, so
    /// a concurrent `on_activate` sees the plugin exactly once either way.
    fn announce(&self, plugin: Plugin) -> Arc<Plugin> {
        let plugin = Arc::new(plugin);
        let handlers: Vec<ActivationHandler> = {
            let mut activations = lock(&self.activations);
            activations
                .activated
                .insert(plugin.name().to_string(), Arc::clone(&plugin));
            plugin
                .capabilities()
                .iter()
                .filter_map(|capability| activations.handlers.get(capability))
                .flatten()
                .cloned()
                .collect()
        };
        for handler in &handlers {
            handler(&plugin);
        }
        plugin
    }
}

impl Default for Registry {
    /// A registry over the default search paths and timeouts.
    fn default() -> Self {
        Self::from_config(&PluginsConfig::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn blocking<T, F>(f: F) -> Result<T, DockyardError>
where
    F: FnOnce() -> Result<T, DockyardError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DockyardError::Internal(format!("discovery task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_registry() -> Registry {
        Registry::new(SearchPaths::default(), ClientTimeouts::default())
    }

    #[test]
    fn from_config_copies_paths_and_timeouts() {
        let config = PluginsConfig {
            socket_paths: vec![PathBuf::from("/tmp/sockets")],
            spec_paths: vec![PathBuf::from("/tmp/specs")],
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
        };
        let registry = Registry::from_config(&config);
        let paths = registry.search_paths();
        assert_eq!(paths.sockets, vec![PathBuf::from("/tmp/sockets")]);
        assert_eq!(paths.specs, vec![PathBuf::from("/tmp/specs")]);
        assert_eq!(registry.timeouts.request, Duration::from_secs(5));
        assert_eq!(registry.timeouts.connect, Duration::from_secs(2));
    }

    #[test]
    fn path_setters_replace_one_list_only() {
        let registry = empty_registry();
        registry.set_socket_paths(vec![PathBuf::from("/a")]);
        registry.set_spec_paths(vec![PathBuf::from("/b"), PathBuf::from("/c")]);
        registry.set_socket_paths(vec![PathBuf::from("/d")]);

        let paths = registry.search_paths();
        assert_eq!(paths.sockets, vec![PathBuf::from("/d")]);
        assert_eq!(paths.specs, vec![PathBuf::from("/b"), PathBuf::from("/c")]);
    }

    #[test]
    fn fresh_registry_has_nothing_cached() {
        let registry = empty_registry();
        assert!(registry.cached().is_empty());
        assert!(registry.evict("ghost").is_none());
    }

    #[tokio::test]
    async fn get_rejects_invalid_name_without_retrying() {
        let registry = empty_registry();
        let err = registry.get("VolumeDriver", "../etc").await.unwrap_err();
        assert!(matches!(err, DockyardError::InvalidName(_)));
        assert!(lock(&registry.plugins).is_empty());
    }

    #[tokio::test]
    async fn resolve_with_no_paths_is_not_found() {
        let registry = empty_registry();
        let err = registry.resolve("ghost").await.unwrap_err();
        assert!(matches!(err, DockyardError::NotFound { name } if name == "ghost"));
    }

    #[tokio::test]
    async fn scan_with_missing_directories_is_empty() {
        let registry = Registry::new(
            SearchPaths::new(
                vec![PathBuf::from("/nonexistent/dockyard/sockets")],
                vec![PathBuf::from("/nonexistent/dockyard/specs")],
            ),
            ClientTimeouts::default(),
        );
        assert!(registry.scan_directories().await.unwrap().is_empty());
    }
}
