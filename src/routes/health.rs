use crate::error::AppResult;
use crate::routes::types::{HealthCheckResponse, HealthStatus};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::AppState;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

async fn probe<F, T>(check: F) -> HealthStatus
where
    F: Future<Output = AppResult<T>>,
{
    let start = Instant::now();
    match tokio::time::timeout(PROBE_TIMEOUT, check).await {
        Ok(Ok(_)) => HealthStatus::healthy(start.elapsed().as_millis() as u64),
        Ok(Err(e)) => {
            tracing::warn!("Health probe failed: {}", e);
            HealthStatus::unhealthy()
        }
        Err(_) => {
            tracing::warn!("Health probe timed out after {:?}", PROBE_TIMEOUT);
            HealthStatus::unhealthy()
        }
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/_health",
    tag = "health",
    responses((status = 200, description = "Service health", body = HealthCheckResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> AppResult<impl IntoResponse> {
    let database = probe(state.repository().ping()).await;

    let cache = match &state.cache {
        Some(cache) => Some(probe(cache.ping()).await),
        None => None,
    };

    let status = if database.is_healthy() && cache.as_ref().map_or(true, HealthStatus::is_healthy) {
        "healthy"
    } else {
        "degraded"
    };

    let response = HealthCheckResponse {
        status: status.to_string(),
        storage: state.storage_backend.as_str().to_string(),
        database,
        cache,
        timestamp: chrono::Utc::now(),
    };

    Ok(Json(response))
}
