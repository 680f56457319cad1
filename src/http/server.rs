//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, access log, timeout)
//! - Bind server to listener
//! - Stop accepting on shutdown and drain in-flight requests

use std::net::SocketAddr;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::http::handlers;
use crate::http::middleware::access_log_middleware;
use crate::http::request::request_id_middleware;
use crate::lifecycle::ShutdownListener;
use crate::observability::Logger;

/// HTTP server for the service.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the built-in routes.
    pub fn new(config: ServerConfig, logger: Logger) -> Self {
        Self::with_routes(config, logger, Router::new())
    }

    /// Create a server serving `routes` alongside the built-in ones.
    pub fn with_routes(config: ServerConfig, logger: Logger, routes: Router) -> Self {
        let router = Self::build_router(&config, logger, routes);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run top to bottom on the way in: the request ID is resolved
    /// before the access log starts its timer.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, logger: Logger, routes: Router) -> Router {
        Router::new()
            .route("/", get(handlers::index))
            .route("/health", get(handlers::health))
            .merge(routes)
            .layer(
                ServiceBuilder::new()
                    .layer(middleware::from_fn(request_id_middleware))
                    .layer(middleware::from_fn_with_state(
                        logger.named("http"),
                        access_log_middleware,
                    ))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.request_timeout_secs,
                    ))),
            )
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
