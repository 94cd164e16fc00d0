use crate::error::{AppError, AppResult};
use crate::middleware::RequestContext;
use crate::models::{
    LastAccessResponse, LookupQuery, RedirectEntry, ShortenRequest, ShortenerEnvelope,
    TopAgentsResponse, UniqueIpsResponse,
};
use crate::services::link_service::redirect_target;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect};
use axum::Extension;
use std::sync::Arc;

use super::AppState;

/// Create a short URL
///
/// Responds `201 Created` for a new link and `200 OK` when an identical
/// HASH link is reused.
#[utoipa::path(
    post,
    path = "/v1/shorten",
    tag = "shorten",
    request_body = ShortenRequest,
    responses(
        (status = 201, description = "Link created", body = ShortenerEnvelope),
        (status = 200, description = "Existing HASH link reused", body = ShortenerEnvelope),
        (status = 400, description = "Invalid URL, alias or expiration"),
        (status = 409, description = "Short code already in use")
    )
)]
pub async fn shorten(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ShortenRequest>,
) -> AppResult<impl IntoResponse> {
    let shortened = state.links.shorten(payload).await?;

    let status = if shortened.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ShortenerEnvelope {
            shortener: shortened.link,
        }),
    ))
}

/// Get statistics for a short code
#[utoipa::path(
    get,
    path = "/v1/shorten/{code}",
    tag = "shorten",
    params(("code" = String, Path, description = "Short code")),
    responses(
        (status = 200, description = "Link statistics", body = ShortenerEnvelope),
        (status = 404, description = "Unknown short code")
    )
)]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> AppResult<Json<ShortenerEnvelope>> {
    let link = state.links.get(&code).await?;
    Ok(Json(ShortenerEnvelope { shortener: link }))
}

/// Look up a link by short URL or short code
#[utoipa::path(
    get,
    path = "/v1/shorten/find",
    tag = "shorten",
    params(LookupQuery),
    responses(
        (status = 200, description = "Matching link", body = ShortenerEnvelope),
        (status = 400, description = "Missing query"),
        (status = 404, description = "No matching link")
    )
)]
pub async fn find(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<ShortenerEnvelope>> {
    let link = state.links.find(query.q.as_deref()).await?;
    Ok(Json(ShortenerEnvelope { shortener: link }))
}

/// Record a visit without redirecting
#[utoipa::path(
    put,
    path = "/v1/shorten/{code}",
    tag = "shorten",
    params(("code" = String, Path, description = "Short code")),
    responses(
        (status = 204, description = "Visit recorded"),
        (status = 404, description = "Unknown or expired short code")
    )
)]
pub async fn record_visit(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Path(code): Path<String>,
) -> AppResult<StatusCode> {
    state.links.visit(&code, context.visit()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Most recent access of a link
#[utoipa::path(
    get,
    path = "/v1/shorten/last",
    tag = "insights",
    params(LookupQuery),
    responses(
        (status = 200, description = "Latest access, null if never visited", body = LastAccessResponse),
        (status = 400, description = "Missing query"),
        (status = 404, description = "No matching link")
    )
)]
pub async fn last_access(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<LastAccessResponse>> {
    let last_accessed = state.links.last_access(query.q.as_deref()).await?;
    Ok(Json(LastAccessResponse { last_accessed }))
}

/// Most frequent user agents of a link
#[utoipa::path(
    get,
    path = "/v1/shorten/top-agents",
    tag = "insights",
    params(LookupQuery),
    responses(
        (status = 200, description = "Up to five user agents", body = TopAgentsResponse),
        (status = 400, description = "Missing query"),
        (status = 404, description = "No matching link")
    )
)]
pub async fn top_agents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<TopAgentsResponse>> {
    let top_user_agents = state.links.top_user_agents(query.q.as_deref()).await?;
    Ok(Json(TopAgentsResponse { top_user_agents }))
}

/// Distinct client IPs of a link
#[utoipa::path(
    get,
    path = "/v1/shorten/ips",
    tag = "insights",
    params(LookupQuery),
    responses(
        (status = 200, description = "Unique visitor IPs", body = UniqueIpsResponse),
        (status = 400, description = "Missing query"),
        (status = 404, description = "No matching link")
    )
)]
pub async fn unique_ips(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<UniqueIpsResponse>> {
    let unique_ips = state.links.unique_ips(query.q.as_deref()).await?;
    Ok(Json(UniqueIpsResponse { unique_ips }))
}

/// Resolve a short URL and redirect
#[utoipa::path(
    get,
    path = "/{code}",
    tag = "redirect",
    params(("code" = String, Path, description = "Short code")),
    responses(
        (status = 307, description = "Redirect to the original URL"),
        (status = 404, description = "Unknown or expired short code")
    )
)]
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Path(code): Path<String>,
) -> AppResult<Redirect> {
    let entry = resolve(&state, &code).await?;

    if entry.is_expired() {
        return Err(AppError::UrlNotFound(code));
    }

    // Counted by the worker so the redirect never waits on a write
    state.job_sender.record_visit(code, context.visit());

    Ok(Redirect::temporary(&redirect_target(&entry)))
}

/// Cache first, then storage. Cache failures fall through to storage.
async fn resolve(state: &AppState, code: &str) -> AppResult<RedirectEntry> {
    let Some(cache) = &state.cache else {
        return Ok(RedirectEntry::from(&state.links.get(code).await?));
    };

    match cache.get_redirect(code).await {
        Ok(Some(entry)) => return Ok(entry),
        Ok(None) => {}
        Err(e) => tracing::warn!("Cache lookup failed for {}: {}", code, e),
    }

    let entry = RedirectEntry::from(&state.links.get(code).await?);

    if let Err(e) = cache.set_redirect(code, &entry).await {
        tracing::warn!("Failed to cache {}: {}", code, e);
    }

    Ok(entry)
}
