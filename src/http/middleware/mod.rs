//! Per-route middleware, outermost first: logging, accounting, body.

pub mod accounting;
pub mod body;
pub mod logging;

pub use accounting::{account_request, ShutdownSignal};
pub use body::{collect_body, BodyError, RequestBody};
pub use logging::log_request;
