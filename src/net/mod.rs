//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! web.server + web.proto
//!     → tls.rs (HTTPS credentials, resolved against the config file)
//!     → axum-server listener (http/server.rs)
//!     → connection.rs (every request joins the in-flight set)
//!
//! Request States:
//!     Tracked → (body done | client gone | shutdown) → Removed
//! ```
//!
//! # Design Decisions
//! - Each request tracked for logging and shutdown
//! - TLS is optional and handled by axum-server's rustls acceptor

pub mod connection;
pub mod tls;

pub use connection::{ConnectionId, InFlightGuard, InFlightRequests};
