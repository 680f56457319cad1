//! Per-request middleware.
//!
//! # Data Flow
//! ```text
//! request_id (http/request.rs) → access_log → timeout → handler
//! ```

pub mod access_log;

pub use access_log::{access_log_middleware, RequestErrors};
