use crate::error::{AppError, AppResult};
use crate::models::RedirectEntry;
use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Manager, Pool, Runtime};
use std::time::Duration;

/// Lookup cache in front of storage for the redirect path.
///
/// Entries hold only fields that never change after a link is created, so
/// they are not invalidated on visits; they age out after the TTL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RedirectCache: Send + Sync {
    /// Check the cache server is reachable
    async fn ping(&self) -> AppResult<String>;

    async fn get_redirect(&self, short_code: &str) -> AppResult<Option<RedirectEntry>>;

    async fn set_redirect(&self, short_code: &str, entry: &RedirectEntry) -> AppResult<()>;
}

/// Redis-backed [`RedirectCache`]
#[derive(Clone)]
pub struct Cache {
    pool: Pool,
    default_ttl: Duration,
}

impl Cache {
    /// Create a new cache connection pool
    pub async fn new(redis_url: &str, max_connections: u32, default_ttl_seconds: u64) -> AppResult<Self> {
        let manager = Manager::new(redis_url)
            .map_err(|e| AppError::Configuration(format!("Invalid Redis URL: {}", e)))?;

        let pool = Pool::builder(manager)
            .max_size(max_connections as usize)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create Redis pool: {}", e)))?;

        Ok(Self {
            pool,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        })
    }

    /// Generate cache key for a short code
    fn redirect_key(short_code: &str) -> String {
        format!("{}:{}", Self::KEY_PREFIX, short_code)
    }

    const KEY_PREFIX: &'static str = "redirect";
}

#[async_trait]
impl RedirectCache for Cache {
    async fn ping(&self) -> AppResult<String> {
        let mut conn = self.pool.get().await?;
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(response)
    }

    async fn get_redirect(&self, short_code: &str) -> AppResult<Option<RedirectEntry>> {
        let key = Self::redirect_key(short_code);
        let mut conn = self.pool.get().await?;

        let value: Option<String> = conn.get(&key).await?;

        match value {
            Some(v) => {
                let entry: RedirectEntry = serde_json::from_str(&v)
                    .map_err(|e| AppError::Internal(format!("Cache deserialization error: {}", e)))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn set_redirect(&self, short_code: &str, entry: &RedirectEntry) -> AppResult<()> {
        let key = Self::redirect_key(short_code);
        let value = serde_json::to_string(entry)?;
        let mut conn = self.pool.get().await?;

        let _: () = conn.set_ex(&key, value, self.default_ttl.as_secs()).await?;

        Ok(())
    }
}
