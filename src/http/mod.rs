//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (resolve X-Request-ID)
//!     → middleware/access_log.rs (start timer, collect errors)
//!     → handlers.rs (GET /, GET /health)
//!     → response.rs (AppError rendering)
//!     → access record emitted, X-Request-ID echoed, sent to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::RequestErrors;
pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use response::AppError;
pub use server::HttpServer;
