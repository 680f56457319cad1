//! Request logging middleware.
//! Emits one record per completed request, or one per error reported during it.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::Response,
};

use crate::http::request::RequestIdExt;
use crate::http::response::RecordedError;
use crate::observability::{Field, Logger};

/// Errors reported by handlers while a request is in flight.
///
/// Installed by [`access_log_middleware`]; handlers take it as an extractor
/// and [`push`](RequestErrors::push) descriptions of what went wrong.
#[derive(Debug, Clone, Default)]
pub struct RequestErrors(Arc<Mutex<Vec<String>>>);

impl RequestErrors {
    pub fn push(&self, error: impl Into<String>) {
        self.lock().push(error.into());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestErrors {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Outside the middleware there is nobody to report to; hand out a detached list.
        Ok(parts
            .extensions
            .get::<RequestErrors>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer.
/// Header values that are not IP addresses are skipped.
fn client_ip<B>(request: &Request<B>) -> String {
    let headers = request.headers();
    let header_ip = |name: &str, first_hop: bool| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| if first_hop { v.split(',').next() } else { Some(v) })
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for", true)
        .or_else(|| header_ip("x-real-ip", false))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .map(|ip| ip.to_string())
        .unwrap_or_default()
}

/// Time the rest of the chain and log its outcome.
///
/// With errors reported, each error becomes its own error-level record
/// carrying only the message. Otherwise one info-level record summarizes
/// the request.
pub async fn access_log_middleware(
    State(logger): State<Logger>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let method = request.method().to_string();
    let ip = client_ip(&request);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let request_id = request
        .request_id()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();

    let errors = RequestErrors::default();
    request.extensions_mut().insert(errors.clone());

    let response = next.run(request).await;
    let latency = start.elapsed();

    if let Some(RecordedError(message)) = response.extensions().get::<RecordedError>() {
        errors.push(message.clone());
    }

    let errors = errors.take();
    if errors.is_empty() {
        logger.info(
            &path,
            &[
                Field::int("status", i64::from(response.status().as_u16())),
                Field::str("method", method),
                Field::str("path", path.clone()),
                Field::str("query", query),
                Field::str("ip", ip),
                Field::str("user-agent", user_agent),
                Field::duration("latency", latency),
                Field::str("request-id", request_id),
            ],
        );
    } else {
        for error in &errors {
            logger.error(error, &[]);
        }
    }

    response
}
