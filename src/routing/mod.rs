//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RouteSchema (schema.rs)
//!     → params.types registered as passthrough groups
//!     → per {method, uri}: handler lookup (handler.rs), group plan compile
//!     → axum Router with per-route middleware (dispatch.rs)
//!
//! Per request:
//!     dispatch.rs → validate query → ApiHandler
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - A route without a handler is skipped, a route with a bad group token
//!   aborts startup
//! - Handlers are looked up in an explicit map, never discovered

pub mod dispatch;
pub mod handler;
pub mod schema;

pub use dispatch::{build_api_router, RouterError, API_PREFIX};
pub use handler::{ApiHandler, ApiRequest, HandlerMap};
pub use schema::{ParamsSchema, RouteSchema, RouteSpec, SchemaError};
