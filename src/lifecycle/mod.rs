//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Server::shutdown → trigger → background tasks stop
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls Server::shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: cancel in-flight requests, stop background tasks,
//!   close the listener
//! - Closing the listener has a grace period, then connections are dropped

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
