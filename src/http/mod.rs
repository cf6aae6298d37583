//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum-server, request ID, trace span)
//!     → middleware/ (logging, in-flight accounting, body collection)
//!     → routing::dispatch (query validation, handler)
//!     → Send to client
//! ```

pub mod echo;
pub mod middleware;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{build_app, launch, launch_with_registry, LaunchError, Server, ServerState};
