//! Streaming responses.
//!
//! # Data Flow
//! ```text
//! Accept header
//!     → negotiate.rs (json-stream | event-stream | html→text/plain)
//!     → event_stream.rs (response head, framing, Open → Closed)
//! ```
//!
//! # Design Decisions
//! - One mutex-guarded channel per stream keeps frames in call order
//! - Closing is idempotent whether the handler, the client or the server
//!   gets there first

pub mod event_stream;
pub mod negotiate;

pub use event_stream::{EventStream, StreamMode, StreamState};
pub use negotiate::{negotiate, EVENT_STREAM, JSON_STREAM, TEXT_HTML, TEXT_PLAIN};
