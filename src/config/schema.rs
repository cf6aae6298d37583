//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Reported by `GET /`.
    pub version: String,

    /// Listener settings.
    pub web: WebConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// JSON route schema to serve.
    pub schema_path: Option<PathBuf>,

    /// File this config was loaded from. Relative paths resolve against it.
    #[serde(skip)]
    pub file_name: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            web: WebConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
            schema_path: None,
            file_name: None,
        }
    }
}

impl GatewayConfig {
    /// Resolve `path` against the directory of the config file, or the
    /// working directory when there is none.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        let base = self
            .file_name
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new("."));
        base.join(path)
    }
}

/// Listener protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address; `port`, `host`, `host:port` or with a scheme.
    pub server: String,

    pub proto: Protocol,

    /// Required when `proto = "https"`.
    pub https: Option<HttpsConfig>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            server: "0.0.0.0:4000".to_string(),
            proto: Protocol::Http,
            https: None,
        }
    }
}

/// TLS credentials (PEM).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpsConfig {
    /// Private key path.
    pub key: PathBuf,

    /// Certificate chain path.
    pub cert: PathBuf,
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest request body collected for `requestBody` routes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 100 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// How often the in-flight request count is logged.
    pub in_flight_log_interval_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            in_flight_log_interval_secs: 30,
        }
    }
}
