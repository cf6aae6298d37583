//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, remember file name)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → address.rs (normalize web.server at launch)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod address;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    GatewayConfig, HttpsConfig, LimitsConfig, ObservabilityConfig, Protocol, WebConfig,
};
