//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the listen address and value ranges
//! - Check that HTTPS has its credentials configured
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - File existence is not checked here; TLS material is read at launch

use std::fmt;

use tracing_subscriber::EnvFilter;

use super::address::normalize_address;
use super::schema::{GatewayConfig, Protocol};

/// One semantic problem, tagged with the config key it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub key: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.version.trim().is_empty() {
        errors.push(ValidationError::new("version", "must not be empty"));
    }

    if let Err(e) = normalize_address(&config.web.server, config.web.proto.default_port()) {
        errors.push(ValidationError::new("web.server", e.to_string()));
    }

    if config.web.proto == Protocol::Https && config.web.https.is_none() {
        errors.push(ValidationError::new(
            "web.https",
            "key and cert are required when proto is https",
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    let observability = &config.observability;
    if EnvFilter::try_new(&observability.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("invalid log level '{}'", observability.log_level),
        ));
    }
    if observability.in_flight_log_interval_secs == 0 {
        errors.push(ValidationError::new(
            "observability.in_flight_log_interval_secs",
            "must be greater than 0",
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.web.server = "host:abc".to_string();
        config.web.proto = Protocol::Https;
        config.limits.max_body_bytes = 0;

        let errors = validate_config(&config).unwrap_err();
        let keys: Vec<_> = errors.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["web.server", "web.https", "limits.max_body_bytes"]);
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = GatewayConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].key, "observability.metrics_address");
    }
}
