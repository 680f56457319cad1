//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build logger → Install tracing bridge → Bind listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain requests → Sync logger → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then listeners
//! - The logger is flushed last so shutdown records are persisted

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownListener};
