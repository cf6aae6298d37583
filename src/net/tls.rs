//! TLS credential loading.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

use crate::config::{GatewayConfig, HttpsConfig};

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("https requires web.https.key and web.https.cert")]
    NotConfigured,
    #[error("unable to read https key file '{}'", .0.display())]
    Key(PathBuf),
    #[error("unable to read https cert file '{}'", .0.display())]
    Cert(PathBuf),
    #[error("invalid https credentials: {0}")]
    Invalid(#[source] std::io::Error),
}

/// Read the key and certificate named in `web.https`, relative to the config
/// file, and build a rustls config from them.
pub async fn load_tls_config(config: &GatewayConfig) -> Result<RustlsConfig, TlsError> {
    let HttpsConfig { key, cert } = config.web.https.as_ref().ok_or(TlsError::NotConfigured)?;

    let key_pem = read_credential(config, "web.https.key", key)
        .await
        .ok_or_else(|| TlsError::Key(key.clone()))?;
    let cert_pem = read_credential(config, "web.https.cert", cert)
        .await
        .ok_or_else(|| TlsError::Cert(cert.clone()))?;

    RustlsConfig::from_pem(cert_pem, key_pem)
        .await
        .map_err(TlsError::Invalid)
}

async fn read_credential(config: &GatewayConfig, key: &str, relative: &Path) -> Option<Vec<u8>> {
    let file_name = config.resolve_path(relative);
    tracing::debug!(config_key = key, path = %file_name.display(), "Reading https credentials");

    match tokio::fs::read(&file_name).await {
        Ok(contents) => Some(contents),
        Err(e) => {
            tracing::error!(
                config_key = key,
                path = %file_name.display(),
                error = %e,
                "error reading file"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_file_names_the_configured_path() {
        let mut config = GatewayConfig::default();
        config.web.https = Some(HttpsConfig {
            key: PathBuf::from("no-such-key.pem"),
            cert: PathBuf::from("no-such-cert.pem"),
        });

        let err = load_tls_config(&config).await.unwrap_err();
        assert_eq!(err.to_string(), "unable to read https key file 'no-such-key.pem'");
    }

    #[tokio::test]
    async fn missing_cert_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("key.pem"), "not really a key").unwrap();

        let mut config = GatewayConfig::default();
        config.file_name = Some(dir.path().join("gateway.toml"));
        config.web.https = Some(HttpsConfig {
            key: PathBuf::from("key.pem"),
            cert: PathBuf::from("cert.pem"),
        });

        let err = load_tls_config(&config).await.unwrap_err();
        assert!(matches!(err, TlsError::Cert(_)));
    }
}
