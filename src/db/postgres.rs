use super::LinkRepository;
use crate::error::{AppError, AppResult};
use crate::models::{AccessLog, Method, NewLink, ShortenedLink, Stats, UtmParams, Visit};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    ConnectOptions, FromRow, PgPool,
};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const LINK_COLUMNS: &str = r#"
    id, iid, original_url, short_code, short_url, method, expiration,
    redirect_count, last_accessed, last_modified,
    utm_source, utm_medium, utm_campaign, utm_term, utm_content
"#;

/// Row of the `short_urls` table
#[derive(Debug, FromRow)]
struct LinkRow {
    #[allow(dead_code)]
    id: i64,
    iid: Uuid,
    original_url: String,
    short_code: String,
    short_url: String,
    method: String,
    expiration: Option<DateTime<Utc>>,
    redirect_count: i64,
    last_accessed: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    utm_source: Option<String>,
    utm_medium: Option<String>,
    utm_campaign: Option<String>,
    utm_term: Option<String>,
    utm_content: Option<String>,
}

impl TryFrom<LinkRow> for ShortenedLink {
    type Error = AppError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        let method = Method::from_str(&row.method).map_err(AppError::Internal)?;

        Ok(ShortenedLink {
            id: row.iid,
            original_url: row.original_url,
            short_code: row.short_code,
            short_url: row.short_url,
            method,
            expiration: row.expiration,
            redirect_count: row.redirect_count,
            last_accessed: row.last_accessed,
            last_modified: row.last_modified,
            utm: UtmParams {
                utm_source: row.utm_source,
                utm_medium: row.utm_medium,
                utm_campaign: row.utm_campaign,
                utm_term: row.utm_term,
                utm_content: row.utm_content,
            },
        })
    }
}

/// Row of the `access_logs` table
#[derive(Debug, FromRow)]
struct AccessLogRow {
    iid: Uuid,
    short_url_id: i64,
    accessed_at: DateTime<Utc>,
    user_agent: String,
    ip_address: String,
}

impl From<AccessLogRow> for AccessLog {
    fn from(row: AccessLogRow) -> Self {
        AccessLog {
            id: row.iid,
            short_url_id: row.short_url_id,
            accessed_at: row.accessed_at,
            user_agent: row.user_agent,
            ip_address: row.ip_address,
        }
    }
}

/// PostgreSQL-backed link repository
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Create a new repository with a connection pool
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout_seconds: u64,
    ) -> AppResult<Self> {
        let options = PgConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Configuration(format!("Invalid database URL: {}", e)))?
            .disable_statement_logging();

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_seconds))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LinkRepository for PgRepository {
    async fn create(&self, new_link: NewLink) -> AppResult<ShortenedLink> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO short_urls (
                original_url, short_code, short_url, method, expiration,
                redirect_count, last_accessed, last_modified,
                utm_source, utm_medium, utm_campaign, utm_term, utm_content
            )
            VALUES ($1, $2, $3, $4, $5, 0, $6, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            LINK_COLUMNS
        );

        let result = sqlx::query_as::<_, LinkRow>(&query)
            .bind(&new_link.original_url)
            .bind(&new_link.short_code)
            .bind(&new_link.short_url)
            .bind(new_link.method.as_str())
            .bind(new_link.expiration)
            .bind(now)
            .bind(&new_link.utm.utm_source)
            .bind(&new_link.utm.utm_medium)
            .bind(&new_link.utm.utm_campaign)
            .bind(&new_link.utm.utm_term)
            .bind(&new_link.utm.utm_content)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => row.try_into(),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::ShortCodeExists(new_link.short_code))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_short_code(&self, short_code: &str) -> AppResult<Option<ShortenedLink>> {
        let query = format!("SELECT {} FROM short_urls WHERE short_code = $1", LINK_COLUMNS);

        sqlx::query_as::<_, LinkRow>(&query)
            .bind(short_code)
            .fetch_optional(&self.pool)
            .await?
            .map(ShortenedLink::try_from)
            .transpose()
    }

    async fn find_by_query(&self, query: &str) -> AppResult<Option<ShortenedLink>> {
        let sql = format!(
            "SELECT {} FROM short_urls WHERE short_url = $1 OR short_code = $1 LIMIT 1",
            LINK_COLUMNS
        );

        sqlx::query_as::<_, LinkRow>(&sql)
            .bind(query)
            .fetch_optional(&self.pool)
            .await?
            .map(ShortenedLink::try_from)
            .transpose()
    }

    async fn short_code_exists(&self, short_code: &str) -> AppResult<bool> {
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM short_urls WHERE short_code = $1
            "#,
        )
        .bind(short_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(result > 0)
    }

    async fn record_visit(&self, short_code: &str, visit: Visit) -> AppResult<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let link_id = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE short_urls
            SET redirect_count = redirect_count + 1,
                last_accessed = $1
            WHERE short_code = $2
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(short_code)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(link_id) = link_id else {
            tx.rollback().await?;
            return Ok(false);
        };

        sqlx::query(
            r#"
            INSERT INTO access_logs (short_url_id, accessed_at, user_agent, ip_address)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(link_id)
        .bind(now)
        .bind(&visit.user_agent)
        .bind(&visit.ip_address)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn last_access(&self, short_code: &str) -> AppResult<Option<AccessLog>> {
        let result = sqlx::query_as::<_, AccessLogRow>(
            r#"
            SELECT access_logs.iid, access_logs.short_url_id, access_logs.accessed_at,
                   access_logs.user_agent, access_logs.ip_address
            FROM access_logs
            JOIN short_urls ON short_urls.id = access_logs.short_url_id
            WHERE short_urls.short_code = $1
            ORDER BY access_logs.accessed_at DESC, access_logs.id DESC
            LIMIT 1
            "#,
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result.map(AccessLog::from))
    }

    async fn unique_ips(&self, short_code: &str) -> AppResult<Vec<String>> {
        let results = sqlx::query_scalar::<_, String>(
            r#"
            SELECT access_logs.ip_address
            FROM access_logs
            JOIN short_urls ON short_urls.id = access_logs.short_url_id
            WHERE short_urls.short_code = $1
            GROUP BY access_logs.ip_address
            ORDER BY MIN(access_logs.accessed_at)
            "#,
        )
        .bind(short_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn top_user_agents(&self, short_code: &str, limit: i64) -> AppResult<Vec<String>> {
        let results = sqlx::query_scalar::<_, String>(
            r#"
            SELECT access_logs.user_agent
            FROM access_logs
            JOIN short_urls ON short_urls.id = access_logs.short_url_id
            WHERE short_urls.short_code = $1
            GROUP BY access_logs.user_agent
            ORDER BY COUNT(*) DESC, access_logs.user_agent ASC
            LIMIT $2
            "#,
        )
        .bind(short_code)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            DELETE FROM short_urls WHERE expiration IS NOT NULL AND expiration <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn stats(&self) -> AppResult<Stats> {
        let row = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*) as total_links,
                COALESCE(CAST(SUM(redirect_count) AS BIGINT), 0) as total_visits,
                COUNT(*) FILTER (WHERE expiration IS NULL OR expiration > NOW()) as active_links,
                COUNT(*) FILTER (WHERE expiration IS NOT NULL AND expiration <= NOW()) as expired_links
            FROM short_urls
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(Stats {
            total_links: row.0,
            total_visits: row.1,
            active_links: row.2,
            expired_links: row.3,
        })
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
