//! Telemetry API gateway core.
//!
//! Serves a declarative route schema over HTTP(S): query strings are
//! validated by composable parse groups, handlers receive the validated
//! data, and streaming routes answer with Server-Sent Events or
//! newline-delimited JSON.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod query;
pub mod routing;
pub mod stream;

pub use config::GatewayConfig;
pub use http::{launch, LaunchError, Server};
pub use query::{GroupRegistry, ParseResult};
pub use routing::{ApiHandler, ApiRequest, HandlerMap, RouteSchema};
pub use stream::EventStream;
