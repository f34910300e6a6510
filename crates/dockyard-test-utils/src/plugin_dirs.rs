// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temporary plugin search directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dockyard_core::PluginSpec;
use tempfile::TempDir;

/// A temporary `sockets/` + `specs/` directory pair, removed on drop.
pub struct PluginDirs {
    root: TempDir,
}

impl PluginDirs {
    pub fn new() -> io::Result<Self> {
        let root = TempDir::new()?;
        fs::create_dir(root.path().join("sockets"))?;
        fs::create_dir(root.path().join("specs"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn sockets(&self) -> PathBuf {
        self.root.path().join("sockets")
    }

    pub fn specs(&self) -> PathBuf {
        self.root.path().join("specs")
    }

    /// Socket search paths, for `SearchPaths`.
    pub fn socket_paths(&self) -> Vec<PathBuf> {
        vec![self.sockets()]
    }

    /// Spec search paths, for `SearchPaths`.
    pub fn spec_paths(&self) -> Vec<PathBuf> {
        vec![self.specs()]
    }

    /// Where `<name>.sock` lives in the socket directory.
    pub fn socket_path(&self, name: &str) -> PathBuf {
        self.sockets().join(format!("{name}.sock"))
    }

    /// Writes `<name>.spec` holding a literal address.
    pub fn write_spec(&self, name: &str, address: &str) -> io::Result<PathBuf> {
        self.write_file(&format!("{name}.spec"), &format!("{address}\n"))
    }

    /// Writes `<name>.json` holding a serialized [`PluginSpec`].
    pub fn write_json(&self, name: &str, spec: &PluginSpec) -> io::Result<PathBuf> {
        let content = serde_json::to_string_pretty(spec).map_err(io::Error::other)?;
        self.write_file(&format!("{name}.json"), &content)
    }

    /// Writes `content` to `relative` under the spec directory, creating
    /// parent directories as needed.
    pub fn write_file(&self, relative: &str, content: &str) -> io::Result<PathBuf> {
        let path = self.specs().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Creates a socket node for `name` with nothing listening on it.
    #[cfg(unix)]
    pub fn dead_socket(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.socket_path(name);
        drop(std::os::unix::net::UnixListener::bind(&path)?);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_both_directories() {
        let dirs = PluginDirs::new().unwrap();
        assert!(dirs.sockets().is_dir());
        assert!(dirs.specs().is_dir());
    }

    #[test]
    fn write_spec_appends_newline() {
        let dirs = PluginDirs::new().unwrap();
        let path = dirs.write_spec("ultron", "tcp://127.0.0.1:1").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "tcp://127.0.0.1:1\n");
    }

    #[cfg(unix)]
    #[test]
    fn dead_socket_leaves_a_socket_node() {
        use std::os::unix::fs::FileTypeExt;

        let dirs = PluginDirs::new().unwrap();
        let path = dirs.dead_socket("ceph").unwrap();
        assert!(fs::metadata(path).unwrap().file_type().is_socket());
    }
}
