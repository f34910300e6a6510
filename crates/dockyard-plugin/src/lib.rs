// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Out-of-process plugin subsystem for Dockyard.
//!
//! Plugins are found by name on the filesystem (unix sockets, `.spec` files
//! holding a literal address, or `.json` spec files), activated through the
//! `Plugin.Activate` handshake, and cached in a [`Registry`]. Calls to a
//! plugin go through its [`Client`].

pub mod backoff;
pub mod client;
pub mod discovery;
pub mod plugin;
pub mod registry;

pub use backoff::{backoff, deadline_exceeded, Retry, RETRY_CEILING};
pub use client::{ByteStream, CallOptions, Client};
pub use discovery::{CandidateKind, CandidateSource, SearchPaths};
pub use plugin::{Plugin, PluginSource};
pub use registry::{ActivationHandler, Registry};
