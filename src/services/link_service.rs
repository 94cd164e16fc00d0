//! Link creation, lookup and visit tracking.

use crate::config::ShortenerConfig;
use crate::db::{LinkRepository, TOP_USER_AGENTS_LIMIT};
use crate::error::{AppError, AppResult};
use crate::models::{AccessLog, Method, NewLink, RedirectEntry, ShortenRequest, ShortenedLink, Visit};
use crate::services::short_code::{format_short_url, ShortCodeService};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use url::Url;
use validator::Validate;

/// Aliases that would be shadowed by fixed routes.
pub const RESERVED_ALIASES: [&str; 5] = ["find", "last", "top-agents", "ips", "_health"];

/// Result of a shorten call.
#[derive(Debug, Clone)]
pub struct Shortened {
    pub link: ShortenedLink,
    /// `false` when a live HASH link for the same URL already existed. That
    /// link is returned as stored; the request's expiration and UTM values
    /// are not applied to it.
    pub created: bool,
}

/// Service for creating and looking up shortened links.
#[derive(Clone)]
pub struct LinkService {
    repository: Arc<dyn LinkRepository>,
    config: ShortenerConfig,
}

impl LinkService {
    pub fn new(repository: Arc<dyn LinkRepository>, config: ShortenerConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &Arc<dyn LinkRepository> {
        &self.repository
    }

    pub fn config(&self) -> &ShortenerConfig {
        &self.config
    }

    /// Validate a shorten request and persist the new link.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidUrl` for empty, oversized or malformed URLs
    /// - `AppError::BadRequest` for a missing or malformed alias, or an expiration in the past
    /// - `AppError::ShortCodeExists` if the alias or hash code is taken by another URL
    pub async fn shorten(&self, mut request: ShortenRequest) -> AppResult<Shortened> {
        request.url = request.url.trim().to_string();
        self.validate_request(&request)?;

        let expiration = match request.expiration {
            Some(at) => at,
            None => default_expiration(Utc::now(), self.config.default_expiry_hours)?,
        };

        let short_code = match request.method {
            Method::Custom => {
                let alias = request
                    .alias
                    .clone()
                    .ok_or_else(|| AppError::BadRequest("custom alias cannot be empty".to_string()))?;
                if RESERVED_ALIASES.contains(&alias.as_str()) {
                    return Err(AppError::BadRequest(format!(
                        "custom alias '{}' is reserved",
                        alias
                    )));
                }
                if self.repository.short_code_exists(&alias).await? {
                    return Err(AppError::ShortCodeExists(alias));
                }
                alias
            }
            Method::Random => {
                let length = self.config.short_code_length;
                ShortCodeService::generate_unique(
                    self.config.short_code_max_attempts,
                    self.repository.as_ref(),
                    || Ok(ShortCodeService::random(length)),
                )
                .await?
            }
            Method::Hash => {
                let code = ShortCodeService::hash(&request.url);
                if let Some(existing) = self.repository.find_by_short_code(&code).await? {
                    if existing.original_url == request.url && !existing.is_expired() {
                        return Ok(Shortened {
                            link: existing,
                            created: false,
                        });
                    }
                    return Err(AppError::ShortCodeExists(code));
                }
                code
            }
            Method::Secure => {
                let url = request.url.clone();
                let secret = self.config.secret_key.as_bytes();
                ShortCodeService::generate_unique(
                    self.config.short_code_max_attempts,
                    self.repository.as_ref(),
                    || ShortCodeService::secure(&url, secret),
                )
                .await?
            }
        };

        let new_link = NewLink {
            short_url: format_short_url(&self.config.base_url, &short_code),
            original_url: request.url,
            short_code,
            method: request.method,
            expiration: Some(expiration),
            utm: request.utm,
        };

        let link = self.repository.create(new_link).await?;
        tracing::info!(
            short_code = %link.short_code,
            method = %link.method,
            "Created short link"
        );

        Ok(Shortened {
            link,
            created: true,
        })
    }

    fn validate_request(&self, request: &ShortenRequest) -> AppResult<()> {
        if request.url.is_empty() {
            return Err(AppError::InvalidUrl("URL cannot be empty".to_string()));
        }

        if request.url.chars().count() > self.config.max_url_length {
            return Err(AppError::InvalidUrl(format!(
                "URL exceeds the maximum length of {} characters",
                self.config.max_url_length
            )));
        }

        request
            .validate()
            .map_err(|e| AppError::BadRequest(format!("Validation failed: {}", e)))?;

        if self.config.strict_url_validation {
            let parsed = Url::parse(&request.url)
                .map_err(|_| AppError::InvalidUrl("Invalid URL format".to_string()))?;

            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(AppError::InvalidUrl(
                    "URL must start with http:// or https://".to_string(),
                ));
            }
        }

        if let Some(expiration) = request.expiration {
            if expiration <= Utc::now() {
                return Err(AppError::BadRequest(
                    "Expiration must be in the future".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Link for a short code, regardless of expiry.
    pub async fn get(&self, short_code: &str) -> AppResult<ShortenedLink> {
        self.repository
            .find_by_short_code(short_code)
            .await?
            .ok_or_else(|| AppError::UrlNotFound(short_code.to_string()))
    }

    /// Link whose short URL or short code matches `query`.
    pub async fn find(&self, query: Option<&str>) -> AppResult<ShortenedLink> {
        let query = required_query(query)?;

        self.repository
            .find_by_query(query)
            .await?
            .ok_or_else(|| AppError::UrlNotFound(query.to_string()))
    }

    /// Record a visit synchronously.
    ///
    /// Unknown and expired links are reported as not found.
    pub async fn visit(&self, short_code: &str, visit: Visit) -> AppResult<()> {
        let link = self.get(short_code).await?;
        if link.is_expired() {
            return Err(AppError::UrlNotFound(short_code.to_string()));
        }

        if !self.repository.record_visit(short_code, visit).await? {
            return Err(AppError::UrlNotFound(short_code.to_string()));
        }

        Ok(())
    }

    pub async fn last_access(&self, query: Option<&str>) -> AppResult<Option<AccessLog>> {
        let link = self.find(query).await?;
        self.repository.last_access(&link.short_code).await
    }

    pub async fn top_user_agents(&self, query: Option<&str>) -> AppResult<Vec<String>> {
        let link = self.find(query).await?;
        self.repository
            .top_user_agents(&link.short_code, TOP_USER_AGENTS_LIMIT)
            .await
    }

    pub async fn unique_ips(&self, query: Option<&str>) -> AppResult<Vec<String>> {
        let link = self.find(query).await?;
        self.repository.unique_ips(&link.short_code).await
    }
}

/// `now` plus the default lifetime. Out-of-range lifetimes are a configuration error.
fn default_expiration(now: DateTime<Utc>, hours: i64) -> AppResult<DateTime<Utc>> {
    TimeDelta::try_hours(hours)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AppError::Configuration(format!("DEFAULT_EXPIRY_HOURS ({}) is out of range", hours))
        })
}

fn required_query(query: Option<&str>) -> AppResult<&str> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("query parameter 'q' is required".to_string()))
}

/// Target of a redirect: the original URL with the link's UTM parameters
/// appended to its query string.
pub fn redirect_target(entry: &RedirectEntry) -> String {
    let pairs = entry.utm.pairs();
    if pairs.is_empty() {
        return entry.original_url.clone();
    }

    match Url::parse(&entry.original_url) {
        Ok(mut url) => {
            url.query_pairs_mut().extend_pairs(pairs);
            url.to_string()
        }
        Err(_) => entry.original_url.clone(),
    }
}
