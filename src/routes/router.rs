use crate::config::RateLimitConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::{request_context_middleware, request_id_middleware, ClientIpKeyExtractor};
use axum::middleware;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::health;
use super::openapi;
use super::url_handlers;
use super::AppState;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Create application router
pub fn create_router(
    state: Arc<AppState>,
    allowed_origins: Vec<String>,
    rate_limit_config: RateLimitConfig,
) -> AppResult<axum::Router> {
    // Strict limit for link creation
    let strict_config = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / rate_limit_config.requests_per_minute).max(1))
        .burst_size(rate_limit_config.burst_size)
        .key_extractor(ClientIpKeyExtractor)
        .finish()
        .ok_or_else(|| AppError::Configuration("Invalid strict rate limit settings".to_string()))?;

    // More lenient limits for lookups and redirects
    let lenient_config = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / (rate_limit_config.requests_per_minute * 2)).max(1))
        .burst_size(rate_limit_config.burst_size * 2)
        .key_extractor(ClientIpKeyExtractor)
        .finish()
        .ok_or_else(|| AppError::Configuration("Invalid lenient rate limit settings".to_string()))?;

    // Configure CORS with specific origins
    let cors = if allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<http::HeaderValue> = allowed_origins
            .iter()
            .filter_map(|s| s.parse::<http::HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let create_routes = axum::Router::new()
        .route("/v1/shorten", post(url_handlers::shorten))
        .layer(GovernorLayer::new(Arc::new(strict_config)));

    // Static segments win over `{code}` in matching
    let public_routes = axum::Router::new()
        .route("/v1/shorten/find", get(url_handlers::find))
        .route("/v1/shorten/last", get(url_handlers::last_access))
        .route("/v1/shorten/top-agents", get(url_handlers::top_agents))
        .route("/v1/shorten/ips", get(url_handlers::unique_ips))
        .route(
            "/v1/shorten/{code}",
            get(url_handlers::get_stats).put(url_handlers::record_visit),
        )
        .route("/{code}", get(url_handlers::redirect))
        .layer(GovernorLayer::new(Arc::new(lenient_config)));

    // Health check and docs (no rate limiting)
    let meta_routes = axum::Router::new()
        .route("/_health", get(health::health_check))
        .route("/v1/openapi.json", get(openapi::openapi_json));

    // Layers run outermost first: request ID is assigned before the context reads it
    Ok(create_routes
        .merge(public_routes)
        .merge(meta_routes)
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
