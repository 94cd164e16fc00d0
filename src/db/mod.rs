//! Link storage.
//!
//! [`LinkRepository`] is the seam between the HTTP layer and persistence.
//! Two backends implement it:
//!
//! - [`PgRepository`] - PostgreSQL via sqlx, with embedded migrations
//! - [`MemoryRepository`] - process-local maps, for development and tests

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

use crate::error::AppResult;
use crate::models::{AccessLog, NewLink, ShortenedLink, Stats, Visit};
use async_trait::async_trait;

/// Number of user agents reported by the top-agents lookup.
pub const TOP_USER_AGENTS_LIMIT: i64 = 5;

/// Repository interface for short links and their access logs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Persist a new link.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ShortCodeExists` if the short code is taken.
    async fn create(&self, new_link: NewLink) -> AppResult<ShortenedLink>;

    /// Find a link by its short code.
    async fn find_by_short_code(&self, short_code: &str) -> AppResult<Option<ShortenedLink>>;

    /// Find a link whose short URL or short code equals `query`.
    async fn find_by_query(&self, query: &str) -> AppResult<Option<ShortenedLink>>;

    /// Check if a short code exists
    async fn short_code_exists(&self, short_code: &str) -> AppResult<bool>;

    /// Increment the redirect count, touch `last_accessed` and append an
    /// access log entry.
    ///
    /// Returns `false` if no link has this short code.
    async fn record_visit(&self, short_code: &str, visit: Visit) -> AppResult<bool>;

    /// Most recent access log entry for a link.
    async fn last_access(&self, short_code: &str) -> AppResult<Option<AccessLog>>;

    /// Distinct client IPs that visited a link.
    async fn unique_ips(&self, short_code: &str) -> AppResult<Vec<String>>;

    /// User agents ordered by visit count, most frequent first.
    async fn top_user_agents(&self, short_code: &str, limit: i64) -> AppResult<Vec<String>>;

    /// Delete all expired links, returning how many were removed.
    async fn delete_expired(&self) -> AppResult<u64>;

    /// Get statistics
    async fn stats(&self) -> AppResult<Stats>;

    /// Check the backend is reachable.
    async fn ping(&self) -> AppResult<()>;
}
