use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::digest::{digest, SHA256};
use std::path::{Path, PathBuf};
use tracing::info;
use wtransport::Identity;

use crate::config::ServerConfig;

/// Dev certificate, relative to the working directory (written by scripts/gen-dev-cert.rs)
pub const DEV_CERT_FILE: &str = "certs/cert.pem";
pub const DEV_KEY_FILE: &str = "certs/key.pem";

/// TLS configuration for the WebTransport server
pub struct TlsConfig {
    pub identity: Identity,
    /// Base64-encoded SHA-256 hash of the certificate (for `serverCertificateHashes`)
    cert_hash: String,
}

impl TlsConfig {
    /// Load the certificate named by the config, falling back to `certs/`
    pub async fn load(config: &ServerConfig) -> Result<Self> {
        let (cert_path, key_path) = cert_paths(config, Path::new(""));
        let configured = config.tls_cert_path.is_some() && config.tls_key_path.is_some();

        if configured || (cert_path.exists() && key_path.exists()) {
            info!("Loading TLS certificate from {}", cert_path.display());
            Self::load_from_paths(&cert_path, &key_path).await
        } else {
            Err(anyhow!(
                "TLS certificate not found.\n\n\
                For development: run `cargo run --manifest-path scripts/Cargo.toml` to generate certs/.\n\
                For production: set TLS_CERT_PATH and TLS_KEY_PATH environment variables."
            ))
        }
    }

    async fn load_from_paths(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let identity = Identity::load_pemfiles(cert_path, key_path)
            .await
            .context("Failed to load certificate from PEM files")?;

        let cert_hash = Self::compute_cert_hash(&identity);

        Ok(Self {
            identity,
            cert_hash,
        })
    }

    fn compute_cert_hash(identity: &Identity) -> String {
        identity
            .certificate_chain()
            .as_slice()
            .first()
            .map(|cert| hash_der(cert.der()))
            .unwrap_or_default()
    }

    pub fn cert_hash(&self) -> &str {
        &self.cert_hash
    }
}

/// Certificate and key file locations: the configured pair, or the dev pair.
/// Relative paths are resolved against `root`.
pub fn cert_paths(config: &ServerConfig, root: &Path) -> (PathBuf, PathBuf) {
    match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) => (root.join(cert), root.join(key)),
        _ => (root.join(DEV_CERT_FILE), root.join(DEV_KEY_FILE)),
    }
}

/// Base64 SHA-256 of a DER certificate, the value clients pin in
/// `serverCertificateHashes`. Hashing a SubjectPublicKeyInfo instead gives the
/// value for Chrome's `--ignore-certificate-errors-spki-list`.
pub fn hash_der(der: &[u8]) -> String {
    STANDARD.encode(digest(&SHA256, der).as_ref())
}
