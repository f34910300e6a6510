// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Dockyard plugin subsystem.
//!
//! This crate provides the error taxonomy, the wire types exchanged with
//! plugin backends, and the protocol constants every backend agrees on.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::DockyardError;
pub use types::{
    HANDSHAKE_SERVICE, Manifest, PLUGIN_ACCEPT, PluginAddress, PluginSpec, Scheme, TlsOptions,
    UNIX_SOCKET_HOST,
};
