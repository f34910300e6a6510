// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem discovery of plugin candidates.
//!
//! A plugin name resolves to an address through one of three candidate
//! kinds, tried in a fixed order:
//!
//! 1. [`CandidateKind::UnixSocket`]: a socket node `<name>.sock` under a socket path;
//! 2. [`CandidateKind::SpecFile`]: a `<name>.spec` file holding a literal address;
//! 3. [`CandidateKind::JsonFile`]: a `<name>.json` file holding a [`PluginSpec`].
//!
//! Every function here does blocking filesystem I/O.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use dockyard_core::{DockyardError, PluginAddress, PluginSpec, TlsOptions};
use tracing::{debug, trace};

/// Directories searched for plugin candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    /// Scanned for `<name>.sock` socket nodes.
    pub sockets: Vec<PathBuf>,
    /// Scanned for `<name>.spec` and `<name>.json` files.
    pub specs: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn new(sockets: Vec<PathBuf>, specs: Vec<PathBuf>) -> Self {
        Self { sockets, specs }
    }
}

/// The kinds of filesystem entries that can name a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    UnixSocket,
    SpecFile,
    JsonFile,
}

impl CandidateKind {
    /// Resolution order: the first kind that locates the name wins.
    pub const PRECEDENCE: [CandidateKind; 3] = [
        CandidateKind::UnixSocket,
        CandidateKind::SpecFile,
        CandidateKind::JsonFile,
    ];

    /// File extension identifying this kind during scans.
    pub fn extension(self) -> &'static str {
        match self {
            CandidateKind::UnixSocket => "sock",
            CandidateKind::SpecFile => "spec",
            CandidateKind::JsonFile => "json",
        }
    }

    /// Classifies a directory entry found while scanning, if it is a candidate.
    fn classify(path: &Path, file_type: fs::FileType, in_socket_dir: bool) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        let kind = if in_socket_dir {
            CandidateKind::UnixSocket
        } else if ext == CandidateKind::SpecFile.extension() {
            CandidateKind::SpecFile
        } else {
            CandidateKind::JsonFile
        };
        if ext != kind.extension() {
            return None;
        }
        let matches = match kind {
            CandidateKind::UnixSocket => is_socket(&file_type),
            CandidateKind::SpecFile | CandidateKind::JsonFile => !file_type.is_dir(),
        };
        matches.then_some(kind)
    }

    /// Paths under `dir` that could hold the candidate for `name`, in order.
    fn paths_for(self, dir: &Path, name: &str) -> Vec<PathBuf> {
        let file = format!("{name}.{}", self.extension());
        let nested = dir.join(name).join(&file);
        match self {
            CandidateKind::UnixSocket | CandidateKind::SpecFile => {
                vec![dir.join(name), dir.join(&file), nested]
            }
            CandidateKind::JsonFile => vec![dir.join(&file), nested],
        }
    }

    /// Looks for `name` under the directories this kind is searched in.
    pub fn locate(self, paths: &SearchPaths, name: &str) -> Result<Option<CandidateSource>, DockyardError> {
        match self {
            CandidateKind::UnixSocket => Ok(locate_socket(&paths.sockets, name)),
            CandidateKind::SpecFile => Ok(locate_spec(&paths.specs, name)),
            CandidateKind::JsonFile => locate_json(&paths.specs, name),
        }
    }
}

/// The filesystem entry a plugin name resolved through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    UnixSocket(PathBuf),
    SpecFile { path: PathBuf, address: String },
    JsonFile { path: PathBuf, spec: PluginSpec },
}

impl CandidateSource {
    pub fn kind(&self) -> CandidateKind {
        match self {
            CandidateSource::UnixSocket(_) => CandidateKind::UnixSocket,
            CandidateSource::SpecFile { .. } => CandidateKind::SpecFile,
            CandidateSource::JsonFile { .. } => CandidateKind::JsonFile,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            CandidateSource::UnixSocket(path)
            | CandidateSource::SpecFile { path, .. }
            | CandidateSource::JsonFile { path, .. } => path,
        }
    }

    /// The address and TLS material this candidate points at.
    pub fn endpoint(&self) -> Result<(PluginAddress, Option<TlsOptions>), DockyardError> {
        match self {
            CandidateSource::UnixSocket(path) => Ok((PluginAddress::Unix(path.clone()), None)),
            CandidateSource::SpecFile { address, .. } => Ok((PluginAddress::parse(address)?, None)),
            CandidateSource::JsonFile { spec, .. } => {
                Ok((PluginAddress::parse(&spec.addr)?, spec.tls_config.clone()))
            }
        }
    }
}

/// Rejects names that are not a single, plain path component.
pub fn validate_name(name: &str) -> Result<(), DockyardError> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if name.is_empty() || name.contains(['/', '\\', '\0']) || !single_normal {
        return Err(DockyardError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Resolves `name` to its candidate source using the fixed precedence.
pub fn resolve(paths: &SearchPaths, name: &str) -> Result<CandidateSource, DockyardError> {
    validate_name(name)?;
    for kind in CandidateKind::PRECEDENCE {
        if let Some(source) = kind.locate(paths, name)? {
            debug!(plugin = name, kind = ?kind, path = %source.path().display(), "resolved plugin");
            return Ok(source);
        }
    }
    Err(DockyardError::NotFound {
        name: name.to_string(),
    })
}

fn locate_socket(dirs: &[PathBuf], name: &str) -> Option<CandidateSource> {
    dirs.iter()
        .flat_map(|dir| CandidateKind::UnixSocket.paths_for(dir, name))
        .find(|path| {
            fs::metadata(path)
                .map(|m| is_socket(&m.file_type()))
                .unwrap_or(false)
        })
        .map(CandidateSource::UnixSocket)
}

fn locate_spec(dirs: &[PathBuf], name: &str) -> Option<CandidateSource> {
    dirs.iter()
        .flat_map(|dir| CandidateKind::SpecFile.paths_for(dir, name))
        .find_map(|path| {
            let address = read_candidate(&path)?.trim().to_string();
            Some(CandidateSource::SpecFile { path, address })
        })
}

fn locate_json(dirs: &[PathBuf], name: &str) -> Result<Option<CandidateSource>, DockyardError> {
    for path in dirs
        .iter()
        .flat_map(|dir| CandidateKind::JsonFile.paths_for(dir, name))
    {
        if let Some(content) = read_candidate(&path) {
            let spec: PluginSpec = serde_json::from_str(&content).map_err(|e| {
                DockyardError::InvalidAddress {
                    address: path.display().to_string(),
                    reason: format!("malformed plugin spec: {e}"),
                }
            })?;
            return Ok(Some(CandidateSource::JsonFile { path, spec }));
        }
    }
    Ok(None)
}

/// Reads a candidate file; `None` if it is missing, not a regular file, or
/// unreadable.
fn read_candidate(path: &Path) -> Option<String> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        _ => return None,
    }
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            debug!(path = %path.display(), "skipping unreadable plugin candidate: {e}");
            None
        }
    }
}

/// Returns every distinct candidate name found under the search paths.
///
/// Missing directories are skipped. The same name found through several
/// extensions or directories is reported once.
pub fn scan_directories(paths: &SearchPaths) -> Result<BTreeSet<String>, DockyardError> {
    let mut names = BTreeSet::new();
    for dir in &paths.sockets {
        walk(dir, true, &mut names)?;
    }
    for dir in &paths.specs {
        walk(dir, false, &mut names)?;
    }
    Ok(names)
}

fn walk(dir: &Path, socket_dir: bool, names: &mut BTreeSet<String>) -> Result<(), DockyardError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(DockyardError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    for entry in entries {
        let entry = entry.map_err(|source| DockyardError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| DockyardError::Io {
            path: path.clone(),
            source,
        })?;

        if file_type.is_dir() {
            walk(&path, socket_dir, names)?;
            continue;
        }

        if CandidateKind::classify(&path, file_type, socket_dir).is_some()
            && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
        {
            trace!(path = %path.display(), "found plugin candidate");
            names.insert(stem.to_string());
        }
    }
    Ok(())
}

#[cfg(unix)]
fn is_socket(file_type: &fs::FileType) -> bool {
    use std::os::unix::fs::FileTypeExt;
    file_type.is_socket()
}

#[cfg(not(unix))]
fn is_socket(_file_type: &fs::FileType) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_is_socket_spec_json() {
        assert_eq!(
            CandidateKind::PRECEDENCE,
            [
                CandidateKind::UnixSocket,
                CandidateKind::SpecFile,
                CandidateKind::JsonFile
            ]
        );
    }

    #[test]
    fn validate_name_accepts_plain_names() {
        assert!(validate_name("ceph").is_ok());
        assert!(validate_name("my-plugin_2.0").is_ok());
    }

    #[test]
    fn validate_name_rejects_paths() {
        for bad in ["", ".", "..", "a/b", "../etc", "/abs", "a\\b", "nul\0"] {
            assert!(
                matches!(validate_name(bad), Err(DockyardError::InvalidName(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn spec_paths_include_nested_layout() {
        let paths = CandidateKind::SpecFile.paths_for(Path::new("/etc/plugins"), "ultron");
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/etc/plugins/ultron"),
                PathBuf::from("/etc/plugins/ultron.spec"),
                PathBuf::from("/etc/plugins/ultron/ultron.spec"),
            ]
        );
    }

    #[test]
    fn json_paths_skip_bare_name() {
        let paths = CandidateKind::JsonFile.paths_for(Path::new("/etc/plugins"), "flocker");
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/etc/plugins/flocker.json"),
                PathBuf::from("/etc/plugins/flocker/flocker.json"),
            ]
        );
    }

    #[test]
    fn endpoint_of_spec_file_has_no_tls() {
        let source = CandidateSource::SpecFile {
            path: PathBuf::from("/etc/plugins/ultron.spec"),
            address: "tcp://localhost:8080".to_string(),
        };
        let (address, tls) = source.endpoint().unwrap();
        assert_eq!(address.base_url(), "http://localhost:8080");
        assert!(tls.is_none());
        assert_eq!(source.kind(), CandidateKind::SpecFile);
    }

    #[test]
    fn endpoint_rejects_bad_literal_address() {
        let source = CandidateSource::SpecFile {
            path: PathBuf::from("/etc/plugins/bad.spec"),
            address: "localhost:8080".to_string(),
        };
        assert!(matches!(
            source.endpoint(),
            Err(DockyardError::InvalidAddress { .. })
        ));
    }
}
