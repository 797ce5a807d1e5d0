use crate::error::ServiceError;
use crate::service::LifecycleService;
use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
}

/// `GET /health`: 200 while the service is healthy, 503 with the error
/// otherwise.
pub fn health_router<S>(service: Arc<S>) -> Router
where
    S: LifecycleService + 'static,
{
    Router::new()
        .route("/health", get(health::<S>))
        .with_state(service)
}

async fn health<S>(State(service): State<Arc<S>>) -> Result<Json<HealthResponse>, ServiceError>
where
    S: LifecycleService + 'static,
{
    service.health().await.inspect_err(|e| {
        warn!(service = service.name(), error = %e, "health check failed");
    })?;
    Ok(Json(HealthResponse {
        status: "ok",
        service: service.name().to_string(),
    }))
}
