//! UI-independent view-models for the shorten form and the stats page.
//!
//! Both hold their own loading and error state and talk to the service only
//! through [`ShortenerApi`]. Failures surface to the user as fixed messages;
//! the underlying error goes to the log.

use crate::client::ShortenerApi;
use crate::models::{AccessLog, Method, ShortenRequest, ShortenedLink, UtmParams};
use chrono::{DateTime, Utc};

pub const EMPTY_URL_MESSAGE: &str = "Please enter a URL to shorten";
pub const SHORTEN_FAILED_MESSAGE: &str = "Failed to shorten URL. Please try again.";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load URL statistics";
pub const FIND_FAILED_MESSAGE: &str = "Failed to find URL";
pub const INSIGHTS_FAILED_MESSAGE: &str = "Failed to load URL insights";

/// Input and result state of the shorten form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortenForm {
    pub url: String,
    pub method: Method,
    /// Empty means no alias
    pub alias: String,
    pub expiration: Option<DateTime<Utc>>,
    pub utm: UtmParams,

    pub is_loading: bool,
    pub error: Option<String>,
    pub shortened_url: Option<String>,
    pub link: Option<ShortenedLink>,
}

impl ShortenForm {
    pub fn new() -> Self {
        Self::default()
    }

    fn request(&self) -> ShortenRequest {
        let alias = self.alias.trim();
        ShortenRequest {
            url: self.url.trim().to_string(),
            method: self.method,
            alias: (!alias.is_empty()).then(|| alias.to_string()),
            expiration: self.expiration,
            utm: self.utm.clone(),
        }
    }

    /// Submit the form. Ignored while a submission is in flight.
    pub async fn submit(&mut self, api: &dyn ShortenerApi) {
        if self.is_loading {
            return;
        }

        self.error = None;
        self.is_loading = true;

        if self.url.trim().is_empty() {
            self.error = Some(EMPTY_URL_MESSAGE.to_string());
            self.is_loading = false;
            return;
        }

        match api.shorten(self.request()).await {
            Ok(link) => {
                self.shortened_url = Some(link.short_url.clone());
                self.link = Some(link);
            }
            Err(e) => {
                tracing::error!("Failed to shorten {}: {}", self.url, e);
                self.error = Some(SHORTEN_FAILED_MESSAGE.to_string());
            }
        }

        self.is_loading = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Snapshot of one link plus its visit insights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsView {
    pub link: Option<ShortenedLink>,
    pub last_access: Option<AccessLog>,
    pub top_agents: Vec<String>,
    pub unique_ips: Vec<String>,

    pub is_loading: bool,
    pub error: Option<String>,
}

impl StatsView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn short_code(&self) -> Option<&str> {
        self.link.as_ref().map(|link| link.short_code.as_str())
    }

    fn begin(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    fn clear_snapshot(&mut self) {
        self.link = None;
        self.last_access = None;
        self.top_agents.clear();
        self.unique_ips.clear();
    }

    /// Replace the snapshot with the current state of `code`.
    pub async fn load(&mut self, api: &dyn ShortenerApi, code: &str) {
        self.begin();

        match api.get_stats(code).await {
            Ok(link) => self.link = Some(link),
            Err(e) => {
                tracing::error!("Error fetching URL statistics for {}: {}", code, e);
                self.error = Some(LOAD_FAILED_MESSAGE.to_string());
                self.clear_snapshot();
            }
        }

        self.is_loading = false;
    }

    /// Look up a link by short URL or short code. Blank queries are ignored.
    pub async fn find(&mut self, api: &dyn ShortenerApi, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }

        self.begin();

        match api.find(query).await {
            Ok(link) => self.link = Some(link),
            Err(e) => {
                tracing::error!("Error finding URL {}: {}", query, e);
                self.error = Some(FIND_FAILED_MESSAGE.to_string());
                self.clear_snapshot();
            }
        }

        self.is_loading = false;
    }

    /// Count a visit, then reload. A failed visit is only logged.
    pub async fn visit(&mut self, api: &dyn ShortenerApi, code: &str) {
        if let Err(e) = api.record_visit(code).await {
            tracing::error!("Error tracking visit for {}: {}", code, e);
        }

        self.load(api, code).await;
    }

    /// Reload the current link, if any.
    pub async fn refresh(&mut self, api: &dyn ShortenerApi) {
        if let Some(code) = self.short_code().map(str::to_string) {
            self.load(api, &code).await;
        }
    }

    /// Fetch last access, top user agents and unique IPs for the current link.
    pub async fn load_insights(&mut self, api: &dyn ShortenerApi) {
        let Some(code) = self.short_code().map(str::to_string) else {
            return;
        };

        self.begin();

        let result = async {
            let last_access = api.last_access(&code).await?;
            let top_agents = api.top_agents(&code).await?;
            let unique_ips = api.unique_ips(&code).await?;
            Ok::<_, crate::client::ClientError>((last_access, top_agents, unique_ips))
        }
        .await;

        match result {
            Ok((last_access, top_agents, unique_ips)) => {
                self.last_access = last_access;
                self.top_agents = top_agents;
                self.unique_ips = unique_ips;
            }
            Err(e) => {
                tracing::error!("Error fetching insights for {}: {}", code, e);
                self.error = Some(INSIGHTS_FAILED_MESSAGE.to_string());
            }
        }

        self.is_loading = false;
    }
}

/// Timestamp for display, e.g. `Apr 22, 2025, 19:06:31 UTC`.
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => date.format("%b %-d, %Y, %H:%M:%S UTC").to_string(),
        None => "Never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, MockShortenerApi};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn link(code: &str, redirect_count: i64) -> ShortenedLink {
        let now = Utc::now();
        ShortenedLink {
            id: Uuid::new_v4(),
            original_url: "https://example.com/long/path".to_string(),
            short_code: code.to_string(),
            short_url: format!("http://localhost:8090/{}", code),
            method: Method::Random,
            expiration: None,
            redirect_count,
            last_accessed: now,
            last_modified: now,
            utm: UtmParams::default(),
        }
    }

    fn server_error() -> ClientError {
        ClientError::Status {
            status: 500,
            message: "DATABASE_ERROR".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_url_makes_no_call() {
        let mut api = MockShortenerApi::new();
        api.expect_shorten().never();

        let mut form = ShortenForm::new();
        form.url = "   ".to_string();
        form.submit(&api).await;

        assert_eq!(form.error.as_deref(), Some(EMPTY_URL_MESSAGE));
        assert!(!form.is_loading);
        assert!(form.shortened_url.is_none());
    }

    #[tokio::test]
    async fn test_successful_submit_fills_result() {
        let mut api = MockShortenerApi::new();
        api.expect_shorten()
            .withf(|req| {
                req.url == "https://example.com/long/path"
                    && req.method == Method::Custom
                    && req.alias.as_deref() == Some("my-link")
            })
            .times(1)
            .returning(|_| Ok(link("my-link", 0)));

        let mut form = ShortenForm::new();
        form.url = " https://example.com/long/path ".to_string();
        form.method = Method::Custom;
        form.alias = "my-link".to_string();
        form.submit(&api).await;

        assert!(form.error.is_none());
        assert!(!form.is_loading);
        assert_eq!(
            form.shortened_url.as_deref(),
            Some("http://localhost:8090/my-link")
        );
        let shown = form.link.as_ref().unwrap();
        assert_eq!(shown.short_code, "my-link");
        assert_eq!(shown.redirect_count, 0);
    }

    #[tokio::test]
    async fn test_blank_alias_is_sent_as_none() {
        let mut api = MockShortenerApi::new();
        api.expect_shorten()
            .withf(|req| req.alias.is_none() && req.method == Method::Random)
            .times(1)
            .returning(|_| Ok(link("abcd1234", 0)));

        let mut form = ShortenForm::new();
        form.url = "https://example.com".to_string();
        form.alias = "  ".to_string();
        form.submit(&api).await;

        assert!(form.error.is_none());
    }

    #[tokio::test]
    async fn test_failed_submit_shows_generic_error() {
        let mut api = MockShortenerApi::new();
        api.expect_shorten().times(1).returning(|_| {
            Err(ClientError::Status {
                status: 409,
                message: "Short code already exists: my-link".to_string(),
            })
        });

        let mut form = ShortenForm::new();
        form.url = "https://example.com".to_string();
        form.submit(&api).await;

        assert_eq!(form.error.as_deref(), Some(SHORTEN_FAILED_MESSAGE));
        assert!(!form.is_loading);
        assert!(form.link.is_none());
    }

    #[tokio::test]
    async fn test_submit_ignored_while_loading() {
        let mut api = MockShortenerApi::new();
        api.expect_shorten().never();

        let mut form = ShortenForm::new();
        form.url = "https://example.com".to_string();
        form.is_loading = true;
        form.submit(&api).await;

        assert!(form.is_loading);
        assert!(form.error.is_none());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut form = ShortenForm::new();
        form.url = "https://example.com".to_string();
        form.method = Method::Secure;
        form.alias = "alias".to_string();
        form.error = Some("x".to_string());
        form.shortened_url = Some("http://localhost:8090/x".to_string());

        form.reset();

        assert_eq!(form, ShortenForm::default());
        assert_eq!(form.method, Method::Random);
    }

    #[tokio::test]
    async fn test_load_failure_clears_snapshot() {
        let mut api = MockShortenerApi::new();
        api.expect_get_stats().returning(|_| Err(server_error()));

        let mut view = StatsView::new();
        view.link = Some(link("abcd", 3));
        view.load(&api, "abcd").await;

        assert_eq!(view.error.as_deref(), Some(LOAD_FAILED_MESSAGE));
        assert!(view.link.is_none());
        assert!(!view.is_loading);
    }

    #[tokio::test]
    async fn test_find_blank_query_is_ignored() {
        let mut api = MockShortenerApi::new();
        api.expect_find().never();

        let mut view = StatsView::new();
        view.find(&api, "  ").await;

        assert_eq!(view, StatsView::default());
    }

    #[tokio::test]
    async fn test_find_failure_sets_error() {
        let mut api = MockShortenerApi::new();
        api.expect_find()
            .withf(|q| q == "http://localhost:8090/nope")
            .returning(|_| {
                Err(ClientError::Status {
                    status: 404,
                    message: "not found".to_string(),
                })
            });

        let mut view = StatsView::new();
        view.link = Some(link("abcd", 1));
        view.find(&api, " http://localhost:8090/nope ").await;

        assert_eq!(view.error.as_deref(), Some(FIND_FAILED_MESSAGE));
        assert!(view.link.is_none());
        assert!(!view.is_loading);
    }

    #[tokio::test]
    async fn test_visit_then_reload_even_when_visit_fails() {
        let mut api = MockShortenerApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_record_visit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(server_error()));
        api.expect_get_stats()
            .withf(|code| code == "abcd")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(link("abcd", 7)));

        let mut view = StatsView::new();
        view.visit(&api, "abcd").await;

        assert!(view.error.is_none());
        assert_eq!(view.link.as_ref().unwrap().redirect_count, 7);
    }

    #[tokio::test]
    async fn test_refresh_without_snapshot_does_nothing() {
        let mut api = MockShortenerApi::new();
        api.expect_get_stats().never();

        let mut view = StatsView::new();
        view.refresh(&api).await;
        assert!(view.link.is_none());
    }

    #[tokio::test]
    async fn test_load_insights() {
        let mut api = MockShortenerApi::new();
        api.expect_last_access().returning(|_| Ok(None));
        api.expect_top_agents()
            .returning(|_| Ok(vec!["curl/8.0".to_string(), "Mozilla/5.0".to_string()]));
        api.expect_unique_ips()
            .returning(|_| Ok(vec!["10.0.0.1".to_string()]));

        let mut view = StatsView::new();
        view.link = Some(link("abcd", 2));
        view.load_insights(&api).await;

        assert!(view.error.is_none());
        assert!(view.last_access.is_none());
        assert_eq!(view.top_agents, vec!["curl/8.0", "Mozilla/5.0"]);
        assert_eq!(view.unique_ips, vec!["10.0.0.1"]);
        assert!(!view.is_loading);
    }

    #[tokio::test]
    async fn test_load_insights_failure_keeps_link() {
        let mut api = MockShortenerApi::new();
        api.expect_last_access().returning(|_| Err(server_error()));
        api.expect_top_agents().never();

        let mut view = StatsView::new();
        view.link = Some(link("abcd", 2));
        view.load_insights(&api).await;

        assert_eq!(view.error.as_deref(), Some(INSIGHTS_FAILED_MESSAGE));
        assert!(view.link.is_some());
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(None), "Never");

        let date = Utc.with_ymd_and_hms(2025, 4, 22, 19, 6, 31).unwrap();
        assert_eq!(format_date(Some(date)), "Apr 22, 2025, 19:06:31 UTC");

        let date = Utc.with_ymd_and_hms(2025, 1, 5, 8, 0, 0).unwrap();
        assert_eq!(format_date(Some(date)), "Jan 5, 2025, 08:00:00 UTC");
    }
}
