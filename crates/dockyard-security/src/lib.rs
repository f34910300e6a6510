// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection security for plugin transports.
//!
//! - [`tls`]: loads CA bundles and client identities for `https://` plugins
//!   and decides when verification is skipped.
//! - [`client`]: builds the reqwest client for a plugin address scheme.

pub mod client;
pub mod tls;

pub use client::{build_plugin_client, ClientTimeouts};
pub use tls::{configure_tls, verification_mode, Verification};
