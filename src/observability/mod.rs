//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Call sites:
//!     → logging.rs (Logger: leveled, formatted, key/value)
//!     → tracing.rs (tracing events from this crate, axum, tower-http)
//!
//! Logger
//!     → encoder.rs (JSON or console bytes, one record per line)
//!     → sink.rs    (per-sink level filter, serialized writes)
//!         → console (stdout / stderr)
//!         → rotation.rs (size-rotated files, backups pruned and gzipped)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID travels as a field on every access record
//! - The logger is a value owned by `main`, not a global

pub mod encoder;
pub mod field;
pub mod level;
pub mod logging;
pub mod rotation;
pub mod sink;
pub mod tracing;

pub use encoder::{Caller, Encoder};
pub use field::{Field, Value};
pub use level::Level;
pub use logging::{LogError, Logger, LoggerOptions, PanicSignal};
pub use rotation::RotatingFile;
pub use sink::{ConsoleWriter, FileWriter, MemoryWriter, Sink, Stream, WriteSyncer};
pub use self::tracing::LogLayer;
