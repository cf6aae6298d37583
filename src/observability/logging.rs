//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Honour `RUST_LOG`, falling back to the configured level
//! - Switch between human-readable and JSON output
//!
//! # Design Decisions
//! - `RUST_LOG` wins over config so operators can raise verbosity ad hoc
//! - The configured level applies to this crate and `tower_http` only

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directives for a bare level such as `debug`.
pub fn default_directives(level: &str) -> String {
    format!("telemetry_gateway={level},tower_http={level}")
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_cover_crate_and_tower_http() {
        assert_eq!(
            default_directives("debug"),
            "telemetry_gateway=debug,tower_http=debug"
        );
        assert!(EnvFilter::try_new(default_directives("warn")).is_ok());
    }
}
