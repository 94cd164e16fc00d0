#![allow(dead_code)]

use axum::Router;
use chrono::{Duration, Utc};
use std::sync::Arc;
use urlsh::config::{RateLimitConfig, ShortenerConfig, StorageBackend};
use urlsh::db::{LinkRepository, MemoryRepository};
use urlsh::jobs::{create_job_channel, Worker, WorkerConfig};
use urlsh::models::{Method, NewLink, ShortenedLink, UtmParams};
use urlsh::routes::{create_router, AppState};
use urlsh::services::link_service::LinkService;

pub const BASE_URL: &str = "http://sh.test";

pub fn shortener_config() -> ShortenerConfig {
    ShortenerConfig {
        base_url: BASE_URL.to_string(),
        short_code_length: 8,
        short_code_max_attempts: 10,
        default_expiry_hours: 24,
        max_url_length: 2048,
        strict_url_validation: true,
        secret_key: "integration-test-secret-key-0123456789".to_string(),
    }
}

/// Generous limits so tests never trip the governor.
pub fn rate_limit() -> RateLimitConfig {
    RateLimitConfig {
        requests_per_minute: 6000,
        burst_size: 1000,
    }
}

pub struct TestApp {
    pub router: Router,
    pub repository: Arc<MemoryRepository>,
}

/// Router over a fresh in-memory repository, with the visit worker running.
///
/// Must be called inside a Tokio runtime.
pub fn create_app() -> TestApp {
    let repository = Arc::new(MemoryRepository::new());
    let dyn_repository: Arc<dyn LinkRepository> = repository.clone();

    let (job_sender, job_receiver) = create_job_channel();
    let worker = Worker::new(dyn_repository.clone(), job_receiver).with_config(WorkerConfig {
        max_retries: 1,
        retry_delay_ms: 10,
    });
    tokio::spawn(worker.run());

    let state = Arc::new(AppState {
        links: LinkService::new(dyn_repository, shortener_config()),
        cache: None,
        job_sender,
        storage_backend: StorageBackend::Memory,
    });

    let router = create_router(state, vec!["*".to_string()], rate_limit())
        .expect("router should build");

    TestApp { router, repository }
}

/// Insert a link that expired an hour ago.
pub async fn create_expired_link(repository: &MemoryRepository, code: &str) -> ShortenedLink {
    repository
        .create(NewLink {
            original_url: "https://example.com/old".to_string(),
            short_code: code.to_string(),
            short_url: format!("{}/{}", BASE_URL, code),
            method: Method::Custom,
            expiration: Some(Utc::now() - Duration::hours(1)),
            utm: UtmParams::default(),
        })
        .await
        .expect("insert expired link")
}

/// Poll until the link's redirect count reaches `expected`.
pub async fn wait_for_redirect_count(repository: &MemoryRepository, code: &str, expected: i64) -> bool {
    for _ in 0..100 {
        let count = repository
            .find_by_short_code(code)
            .await
            .ok()
            .flatten()
            .map(|link| link.redirect_count);
        if count == Some(expected) {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}
