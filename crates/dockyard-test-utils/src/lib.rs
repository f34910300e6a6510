// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Dockyard integration tests.
//!
//! # Components
//!
//! - [`FakePlugin`] - In-process plugin backend served over a unix socket or TCP
//! - [`PluginDirs`] - Temporary socket and spec directories with file helpers

pub mod fake_plugin;
pub mod plugin_dirs;

pub use fake_plugin::{FakePlugin, FakePluginHandle, RecordedRequest};
pub use plugin_dirs::PluginDirs;
