//! Web service skeleton with structured request observability.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use observability::Logger;
