use crate::cache::RedirectCache;
use crate::config::StorageBackend;
use crate::db::LinkRepository;
use crate::jobs::JobSender;
use crate::services::link_service::LinkService;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// This struct is wrapped in `Arc` and shared across all request handlers
/// via Axum's State extraction.
#[derive(Clone)]
pub struct AppState {
    /// Link creation and lookup
    pub links: LinkService,

    /// Optional cache for redirect lookups
    pub cache: Option<Arc<dyn RedirectCache>>,

    /// Background job sender for redirect visit tracking
    pub job_sender: JobSender,

    /// Which storage backend serves this instance, reported by the health check
    pub storage_backend: StorageBackend,
}

impl AppState {
    pub fn repository(&self) -> &Arc<dyn LinkRepository> {
        self.links.repository()
    }
}
