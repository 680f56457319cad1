use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Welcome {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

pub async fn index() -> Json<Welcome> {
    Json(Welcome {
        message: "Welcome to the API",
    })
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "healthy" })
}
