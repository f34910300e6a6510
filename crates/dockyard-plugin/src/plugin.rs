// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved and activated plugin handles.

use std::fmt;

use dockyard_core::{DockyardError, Manifest, PluginAddress, TlsOptions};
use dockyard_security::ClientTimeouts;
use tracing::info;

use crate::client::{CallOptions, Client};
use crate::discovery::CandidateSource;

/// A plugin name resolved to an endpoint but not yet activated.
#[derive(Debug, Clone)]
pub struct PluginSource {
    pub name: String,
    pub address: PluginAddress,
    pub tls: Option<TlsOptions>,
    pub candidate: CandidateSource,
}

impl PluginSource {
    /// Derives the endpoint of `name` from its candidate file.
    pub fn from_candidate(name: &str, candidate: CandidateSource) -> Result<Self, DockyardError> {
        let (address, tls) = candidate.endpoint()?;
        Ok(Self {
            name: name.to_string(),
            address,
            tls,
            candidate,
        })
    }

    /// Builds the transport client and performs the capability handshake.
    pub async fn activate(
        self,
        timeouts: &ClientTimeouts,
        opts: &CallOptions,
    ) -> Result<Plugin, DockyardError> {
        let client = Client::new(&self.address, self.tls.as_ref(), timeouts)?;
        let manifest = client.activate(opts).await?;
        info!(
            plugin = %self.name,
            address = %self.address,
            implements = ?manifest.implements,
            "plugin activated"
        );
        Ok(Plugin {
            name: self.name,
            address: self.address,
            tls: self.tls,
            manifest,
            client,
        })
    }
}

/// An activated plugin.
///
/// Only produced by a successful handshake, so its capability list is always
/// the one the backend advertised. It never changes afterwards.
#[derive(Clone)]
pub struct Plugin {
    name: String,
    address: PluginAddress,
    tls: Option<TlsOptions>,
    manifest: Manifest,
    client: Client,
}

impl Plugin {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &PluginAddress {
        &self.address
    }

    pub fn tls(&self) -> Option<&TlsOptions> {
        self.tls.as_ref()
    }

    /// Capabilities advertised in the handshake, in the backend's order.
    pub fn capabilities(&self) -> &[String] {
        &self.manifest.implements
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn implements(&self, capability: &str) -> bool {
        self.manifest.implements(capability)
    }

    /// Transport client for capability-specific calls.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("address", &self.address.to_string())
            .field("tls", &self.tls.is_some())
            .field("implements", &self.manifest.implements)
            .finish()
    }
}
