// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TLS configuration for `https://` plugin connections.
//!
//! Turns the file paths of a [`TlsOptions`] into reqwest TLS settings.
//! Plugins reached over `https://` without any CA material fall back to
//! skip-verify mode, logged as insecure every time such a client is built.

use std::path::Path;

use dockyard_core::{DockyardError, TlsOptions};
use reqwest::ClientBuilder;
use tracing::{debug, warn};

/// Whether certificate verification is performed for a plugin connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Server certificates are checked against the configured or platform roots.
    Verified,
    /// Any server certificate is accepted.
    Insecure,
}

/// Decide the verification mode for a plugin's TLS material.
///
/// - no TLS material at all: insecure (legacy `.spec` plugins over https);
/// - `InsecureSkipVerify = true`: insecure;
/// - material without a CA file and without a client identity: insecure;
/// - otherwise: verified.
pub fn verification_mode(tls: Option<&TlsOptions>) -> Verification {
    match tls {
        None => Verification::Insecure,
        Some(opts) if opts.insecure_skip_verify => Verification::Insecure,
        Some(opts) if opts.ca_file.is_none() && opts.cert_file.is_none() => {
            Verification::Insecure
        }
        Some(_) => Verification::Verified,
    }
}

/// Apply TLS material to a reqwest client builder.
///
/// Reads the CA bundle and the client certificate/key pair from disk.
/// A certificate without a key (or the reverse) is rejected.
pub fn configure_tls(
    builder: ClientBuilder,
    tls: Option<&TlsOptions>,
) -> Result<ClientBuilder, DockyardError> {
    let mut builder = builder.min_tls_version(reqwest::tls::Version::TLS_1_2);

    if verification_mode(tls) == Verification::Insecure {
        warn!("plugin TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    let Some(opts) = tls else {
        return Ok(builder);
    };

    if let Some(ca_file) = &opts.ca_file {
        let pem = read_pem(ca_file)?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
            DockyardError::Tls(format!("invalid CA certificate {}: {e}", ca_file.display()))
        })?;
        debug!(ca_file = %ca_file.display(), "added plugin CA certificate");
        builder = builder.add_root_certificate(cert);
    }

    match (&opts.cert_file, &opts.key_file) {
        (Some(cert_file), Some(key_file)) => {
            let mut pem = read_pem(cert_file)?;
            pem.push(b'\n');
            pem.extend(read_pem(key_file)?);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                DockyardError::Tls(format!(
                    "invalid client certificate {} / key {}: {e}",
                    cert_file.display(),
                    key_file.display()
                ))
            })?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        (Some(_), None) => {
            return Err(DockyardError::Tls(
                "CertFile is set but KeyFile is missing".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(DockyardError::Tls(
                "KeyFile is set but CertFile is missing".to_string(),
            ));
        }
    }

    Ok(builder)
}

fn read_pem(path: &Path) -> Result<Vec<u8>, DockyardError> {
    std::fs::read(path).map_err(|source| DockyardError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn opts() -> TlsOptions {
        TlsOptions::default()
    }

    #[test]
    fn missing_material_is_insecure() {
        assert_eq!(verification_mode(None), Verification::Insecure);
        assert_eq!(verification_mode(Some(&opts())), Verification::Insecure);
    }

    #[test]
    fn explicit_skip_verify_is_insecure() {
        let tls = TlsOptions {
            ca_file: Some(PathBuf::from("/etc/ca.pem")),
            insecure_skip_verify: true,
            ..opts()
        };
        assert_eq!(verification_mode(Some(&tls)), Verification::Insecure);
    }

    #[test]
    fn ca_file_enables_verification() {
        let tls = TlsOptions {
            ca_file: Some(PathBuf::from("/etc/ca.pem")),
            ..opts()
        };
        assert_eq!(verification_mode(Some(&tls)), Verification::Verified);
    }

    #[test]
    fn client_identity_enables_verification() {
        let tls = TlsOptions {
            cert_file: Some(PathBuf::from("/etc/cert.pem")),
            key_file: Some(PathBuf::from("/etc/key.pem")),
            ..opts()
        };
        assert_eq!(verification_mode(Some(&tls)), Verification::Verified);
    }

    #[test]
    fn configure_without_material_succeeds() {
        let builder = configure_tls(reqwest::Client::builder(), None).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn missing_ca_file_is_io_error() {
        let tls = TlsOptions {
            ca_file: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..opts()
        };
        let err = configure_tls(reqwest::Client::builder(), Some(&tls)).unwrap_err();
        assert!(matches!(err, DockyardError::Io { .. }), "got: {err}");
    }

    #[test]
    fn garbage_ca_file_is_tls_error() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.pem");
        std::fs::write(&ca, "not a certificate").unwrap();
        let tls = TlsOptions {
            ca_file: Some(ca),
            ..opts()
        };
        let result = configure_tls(reqwest::Client::builder(), Some(&tls));
        // Some rustls versions accept a PEM file without certificates.
        if let Err(err) = result {
            assert!(matches!(err, DockyardError::Tls(_)), "got: {err}");
        }
    }

    #[test]
    fn cert_without_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        std::fs::write(&cert, "x").unwrap();
        let tls = TlsOptions {
            cert_file: Some(cert),
            ..opts()
        };
        let err = configure_tls(reqwest::Client::builder(), Some(&tls)).unwrap_err();
        assert!(err.to_string().contains("KeyFile is missing"));
    }
}
