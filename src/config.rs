use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Longest URL length accepted without a warning.
pub const RECOMMENDED_MAX_URL_LENGTH: usize = 2048;

/// Secrets shorter than this are accepted with a warning.
pub const RECOMMENDED_SECRET_LENGTH: usize = 32;

/// Longest default link lifetime: one hundred years.
pub const MAX_DEFAULT_EXPIRY_HOURS: i64 = 100 * 365 * 24;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub shortener: ShortenerConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Postgres => "postgres",
            StorageBackend::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub url: String,
    pub max_connections: u32,
    pub default_ttl_seconds: u64,
}

/// Settings that shape how links are created.
#[derive(Debug, Clone, Deserialize)]
pub struct ShortenerConfig {
    /// Base URL for constructing short URLs (e.g., "http://localhost:8090")
    pub base_url: String,

    /// Length of randomly generated short codes
    pub short_code_length: usize,

    /// Maximum number of attempts to generate a unique short code
    pub short_code_max_attempts: u32,

    /// Default lifetime of a new link, in hours
    pub default_expiry_hours: i64,

    /// Longest original URL accepted
    pub max_url_length: usize,

    /// Whether strict URL validation is enabled (requires http:// or https://)
    pub strict_url_validation: bool,

    /// Key for SECURE short codes
    pub secret_key: String,
}

impl ShortenerConfig {
    /// Validate shortener configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("BASE_URL is required".to_string());
        }

        if self.short_code_length < 4 || self.short_code_length > 16 {
            return Err("SHORT_CODE_LENGTH must be between 4 and 16".to_string());
        }

        if self.default_expiry_hours < 1 || self.default_expiry_hours > MAX_DEFAULT_EXPIRY_HOURS {
            return Err(format!(
                "DEFAULT_EXPIRY_HOURS must be between 1 and {}",
                MAX_DEFAULT_EXPIRY_HOURS
            ));
        }

        if self.short_code_max_attempts < 1 || self.short_code_max_attempts > 100 {
            return Err("SHORT_CODE_MAX_ATTEMPTS must be between 1 and 100".to_string());
        }

        if self.max_url_length == 0 {
            return Err("MAX_URL_LENGTH must be greater than 0".to_string());
        }

        if self.secret_key.is_empty() {
            return Err("SECRET_KEY must not be empty".to_string());
        }

        Ok(())
    }

    /// Non-fatal problems worth reporting at startup.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.secret_key.len() < RECOMMENDED_SECRET_LENGTH {
            warnings.push(format!(
                "SECRET_KEY should be at least {} characters long",
                RECOMMENDED_SECRET_LENGTH
            ));
        }

        if !self.base_url.starts_with("https://") {
            warnings.push("using a non-HTTPS BASE_URL is not recommended in production".to_string());
        }

        if self.max_url_length > RECOMMENDED_MAX_URL_LENGTH {
            warnings.push(format!(
                "MAX_URL_LENGTH ({}) exceeds the recommended limit of {} characters",
                self.max_url_length, RECOMMENDED_MAX_URL_LENGTH
            ));
        }

        warnings
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u64,
    pub burst_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Settings for the API client used by the `client` subcommands.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout_seconds: u64,
}

impl ClientConfig {
    pub const DEFAULT_API_URL: &'static str = "http://localhost:8090";

    /// Load client configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let api_url = env::var("API_URL").unwrap_or_else(|_| Self::DEFAULT_API_URL.to_string());
        let timeout_seconds = env_or("API_TIMEOUT_SECONDS", "10")?;

        if timeout_seconds == 0 {
            return Err(AppError::Configuration(
                "API_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            api_url,
            timeout_seconds,
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Self::DEFAULT_API_URL.to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Read `key` from the environment, falling back to `default`, and parse it.
fn env_or<T: FromStr>(key: &str, default: &str) -> AppResult<T> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", key)))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port: u16 = env_or("SERVER_PORT", "8090")?;

        let backend: StorageBackend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()
            .map_err(AppError::Configuration)?;

        let database_url = match backend {
            StorageBackend::Postgres => env::var("DATABASE_URL")
                .map_err(|_| AppError::MissingEnvVar("DATABASE_URL".to_string()))?,
            StorageBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        let config = Config {
            server: ServerConfig {
                host: server_host.clone(),
                port: server_port,
            },
            storage: StorageConfig { backend },
            database: DatabaseConfig {
                url: database_url,
                max_connections: env_or("DB_MAX_CONNECTIONS", "10")?,
                min_connections: env_or("DB_MIN_CONNECTIONS", "1")?,
                acquire_timeout_seconds: env_or("DB_ACQUIRE_TIMEOUT_SECONDS", "30")?,
            },
            cache: CacheConfig {
                enabled: env_or("CACHE_ENABLED", "false")?,
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
                max_connections: env_or("CACHE_MAX_CONNECTIONS", "10")?,
                default_ttl_seconds: env_or("CACHE_DEFAULT_TTL_SECONDS", "3600")?,
            },
            shortener: ShortenerConfig {
                base_url: env::var("BASE_URL")
                    .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port)),
                short_code_length: env_or("SHORT_CODE_LENGTH", "8")?,
                short_code_max_attempts: env_or("SHORT_CODE_MAX_ATTEMPTS", "10")?,
                default_expiry_hours: env_or("DEFAULT_EXPIRY_HOURS", "24")?,
                max_url_length: env_or("MAX_URL_LENGTH", "2048")?,
                strict_url_validation: env_or("STRICT_URL_VALIDATION", "true")?,
                secret_key: env::var("SECRET_KEY")
                    .map_err(|_| AppError::MissingEnvVar("SECRET_KEY".to_string()))?,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: env_or("RATE_LIMIT_PER_MINUTE", "10")?,
                burst_size: env_or("RATE_LIMIT_BURST", "5")?,
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(
                    &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
                ),
            },
        };

        // Validate configuration
        config.validate()?;

        for warning in config.warnings() {
            tracing::warn!("{}", warning);
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> AppResult<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration(
                "SERVER_PORT must be between 1 and 65535".to_string(),
            ));
        }

        // Validate database settings
        if self.storage.backend == StorageBackend::Postgres {
            if self.database.url.is_empty() {
                return Err(AppError::MissingEnvVar("DATABASE_URL".to_string()));
            }

            if self.database.min_connections > self.database.max_connections {
                return Err(AppError::Configuration(
                    "DB_MIN_CONNECTIONS cannot be greater than DB_MAX_CONNECTIONS".to_string(),
                ));
            }

            if self.database.acquire_timeout_seconds == 0 {
                return Err(AppError::Configuration(
                    "DB_ACQUIRE_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }
        }

        self.shortener.validate().map_err(AppError::Configuration)?;

        // Validate rate limiting settings
        if self.rate_limit.requests_per_minute == 0 || self.rate_limit.requests_per_minute > 60_000 {
            return Err(AppError::Configuration(
                "RATE_LIMIT_PER_MINUTE must be between 1 and 60000".to_string(),
            ));
        }

        if self.rate_limit.burst_size == 0 {
            return Err(AppError::Configuration(
                "RATE_LIMIT_BURST must be greater than 0".to_string(),
            ));
        }

        // Validate cache settings
        if self.cache.enabled && self.cache.default_ttl_seconds == 0 {
            return Err(AppError::Configuration(
                "CACHE_DEFAULT_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Non-fatal configuration problems.
    pub fn warnings(&self) -> Vec<String> {
        self.shortener.warnings()
    }
}

/// Split a comma-separated origin list; `*` allows any origin.
pub fn parse_origins(raw: &str) -> Vec<String> {
    if raw.trim() == "*" {
        return vec!["*".to_string()];
    }

    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
