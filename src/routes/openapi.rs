use axum::Json;
use utoipa::OpenApi;

use super::{health, types, url_handlers};
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(title = "urlsh", description = "URL shortener with visit insights"),
    paths(
        url_handlers::shorten,
        url_handlers::get_stats,
        url_handlers::find,
        url_handlers::record_visit,
        url_handlers::last_access,
        url_handlers::top_agents,
        url_handlers::unique_ips,
        url_handlers::redirect,
        health::health_check,
    ),
    components(schemas(
        models::Method,
        models::UtmParams,
        models::ShortenRequest,
        models::ShortenedLink,
        models::AccessLog,
        models::ShortenerEnvelope,
        models::LastAccessResponse,
        models::TopAgentsResponse,
        models::UniqueIpsResponse,
        types::HealthCheckResponse,
        types::HealthStatus,
    ))
)]
pub struct ApiDoc;

/// Serve the OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
