//! Request ID assignment and propagation.
//!
//! # Responsibilities
//! - Take the inbound `X-Request-ID`, or generate a UUID v4 when absent/empty
//! - Expose it to later stages through request extensions
//! - Echo it on the response so clients can match server logs
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Never rejects a request

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Correlation header, read on the way in and always set on the way out.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The resolved correlation identifier of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// A fresh random (128-bit) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access to the request ID stored by [`request_id_middleware`].
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Resolve the request ID from the inbound header value.
fn resolve(header: Option<&HeaderValue>) -> RequestId {
    header
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| RequestId(v.to_string()))
        .unwrap_or_else(RequestId::generate)
}

/// Assign or propagate the request ID.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = resolve(request.headers().get(&X_REQUEST_ID));
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;

    // Inbound values were already valid header values; generated ones are UUIDs.
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}
