//! Query-string validation engine.
//!
//! # Data Flow
//! ```text
//! raw query string
//!     → raw.rs (decode, fold repeats, keep order)
//!     → registry.rs (resolve group tokens into a GroupPlan, once per route)
//!     → groups.rs (each group consumes its keys, in declared order)
//!     → result.rs (cross-field rules, leftovers become warnings)
//!     → ParseResult { fields, errors, warnings }
//! ```
//!
//! # Design Decisions
//! - Group tokens are resolved when routes are registered; an unknown token
//!   is a schema bug and fails registration
//! - A compiled plan never fails: bad values degrade to error messages
//! - The registry is an explicit value, not process-wide state

pub mod groups;
pub mod raw;
pub mod registry;
pub mod result;
pub mod time;

pub use groups::Group;
pub use raw::{QueryValue, RawQuery};
pub use registry::{GroupPlan, GroupRegistry, QueryError};
pub use result::{FieldValue, ParseResult};
