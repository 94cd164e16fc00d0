use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Allowed shape of a custom alias.
pub static ALIAS_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[a-zA-Z0-9_-]{4,16}$").expect("alias pattern is a valid regex")
});

/// Strategy used to derive the short code of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Caller-supplied alias
    Custom,
    /// Random base62 string
    #[default]
    Random,
    /// Truncated SHA-256 of the original URL
    Hash,
    /// Truncated keyed digest over the URL and a random nonce
    Secure,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::Custom, Method::Random, Method::Hash, Method::Secure];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Custom => "CUSTOM",
            Method::Random => "RANDOM",
            Method::Hash => "HASH",
            Method::Secure => "SECURE",
        }
    }

    /// Human-readable description shown next to the method picker.
    pub fn description(&self) -> &'static str {
        match self {
            Method::Custom => "Create a custom, memorable short URL with your own alias",
            Method::Random => "Generate a random short URL with alphanumeric characters",
            Method::Hash => "Create a hash-based short URL",
            Method::Secure => "Generate a secure, encrypted short URL with additional security",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CUSTOM" => Ok(Method::Custom),
            "RANDOM" => Ok(Method::Random),
            "HASH" => Ok(Method::Hash),
            "SECURE" => Ok(Method::Secure),
            other => Err(format!("invalid shortening method: {}", other)),
        }
    }
}

/// Marketing attribution parameters carried with a link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UtmParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
}

impl UtmParams {
    /// Non-empty parameters as `(name, value)` pairs, in canonical order.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("utm_source", &self.utm_source),
            ("utm_medium", &self.utm_medium),
            ("utm_campaign", &self.utm_campaign),
            ("utm_term", &self.utm_term),
            ("utm_content", &self.utm_content),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (name, v))
        })
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs().is_empty()
    }
}

/// A shortened link as exposed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShortenedLink {
    #[serde(rename = "iid", alias = "id")]
    pub id: Uuid,
    pub original_url: String,
    pub short_code: String,
    pub short_url: String,
    pub method: Method,
    pub expiration: Option<DateTime<Utc>>,
    pub redirect_count: i64,
    pub last_accessed: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub utm: UtmParams,
}

impl ShortenedLink {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// What a redirect needs from a link. None of it changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectEntry {
    pub original_url: String,
    pub expiration: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub utm: UtmParams,
}

impl RedirectEntry {
    pub fn is_expired(&self) -> bool {
        self.expiration.is_some_and(|exp| exp <= Utc::now())
    }
}

impl From<&ShortenedLink> for RedirectEntry {
    fn from(link: &ShortenedLink) -> Self {
        Self {
            original_url: link.original_url.clone(),
            expiration: link.expiration,
            utm: link.utm.clone(),
        }
    }
}

/// A single recorded visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AccessLog {
    pub id: Uuid,
    pub short_url_id: i64,
    pub accessed_at: DateTime<Utc>,
    pub user_agent: String,
    pub ip_address: String,
}

/// Request to create a short URL
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShortenRequest {
    #[validate(length(min = 1, message = "URL cannot be empty"))]
    pub url: String,

    #[serde(default)]
    pub method: Method,

    #[serde(
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    #[validate(regex(
        path = *ALIAS_PATTERN,
        message = "Custom alias must be 4-16 alphanumeric characters, underscores, or hyphens"
    ))]
    pub alias: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub utm: UtmParams,
}

impl ShortenRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Envelope used by every endpoint that returns a link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShortenerEnvelope {
    pub shortener: ShortenedLink,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LastAccessResponse {
    pub last_accessed: Option<AccessLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopAgentsResponse {
    pub top_user_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UniqueIpsResponse {
    pub unique_ips: Vec<String>,
}

/// `?q=` lookup parameter shared by the search endpoints.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LookupQuery {
    /// Short code or full short URL
    pub q: Option<String>,
}

/// Data needed to persist a new link.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub original_url: String,
    pub short_code: String,
    pub short_url: String,
    pub method: Method,
    pub expiration: Option<DateTime<Utc>>,
    pub utm: UtmParams,
}

/// A visit to be recorded against a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub user_agent: String,
    pub ip_address: String,
}

/// Aggregate statistics over all links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_links: i64,
    pub total_visits: i64,
    pub active_links: i64,
    pub expired_links: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn sample_link() -> ShortenedLink {
        let now = Utc::now();
        ShortenedLink {
            id: Uuid::new_v4(),
            original_url: "https://example.com".to_string(),
            short_code: "abc12345".to_string(),
            short_url: "http://localhost:8090/abc12345".to_string(),
            method: Method::Random,
            expiration: Some(now + Duration::hours(24)),
            redirect_count: 3,
            last_accessed: now,
            last_modified: now,
            utm: UtmParams::default(),
        }
    }

    #[test]
    fn test_method_wire_names() {
        assert_eq!(serde_json::to_value(Method::Secure).unwrap(), json!("SECURE"));
        let parsed: Method = serde_json::from_value(json!("HASH")).unwrap();
        assert_eq!(parsed, Method::Hash);
        assert_eq!("custom".parse::<Method>().unwrap(), Method::Custom);
        assert!("SHORT".parse::<Method>().is_err());
    }

    #[test]
    fn test_method_defaults_to_random() {
        assert_eq!(Method::default(), Method::Random);
    }

    #[test]
    fn test_link_serializes_id_as_iid_and_omits_empty_utm() {
        let value = serde_json::to_value(sample_link()).unwrap();
        assert!(value.get("iid").is_some());
        assert!(value.get("id").is_none());
        assert!(value.get("utm_source").is_none());
        assert_eq!(value["method"], "RANDOM");
        assert_eq!(value["redirect_count"], 3);
    }

    #[test]
    fn test_link_round_trips_utm_fields() {
        let mut link = sample_link();
        link.utm.utm_campaign = Some("spring".to_string());

        let value = serde_json::to_value(&link).unwrap();
        assert_eq!(value["utm_campaign"], "spring");

        let back: ShortenedLink = serde_json::from_value(value).unwrap();
        assert_eq!(back.utm.utm_campaign.as_deref(), Some("spring"));
    }

    #[test]
    fn test_redirect_entry_keeps_target_fields() {
        let mut link = sample_link();
        link.utm.utm_source = Some("newsletter".to_string());

        let entry = RedirectEntry::from(&link);
        assert_eq!(entry.original_url, link.original_url);
        assert_eq!(entry.utm, link.utm);
        assert!(!entry.is_expired());

        link.expiration = Some(Utc::now() - Duration::minutes(1));
        assert!(RedirectEntry::from(&link).is_expired());
    }

    #[test]
    fn test_request_treats_empty_alias_as_absent() {
        let request: ShortenRequest = serde_json::from_value(json!({
            "url": "https://example.com",
            "method": "RANDOM",
            "alias": ""
        }))
        .unwrap();

        assert!(request.alias.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_rejects_malformed_alias() {
        let mut request = ShortenRequest::new("https://example.com");
        request.method = Method::Custom;
        request.alias = Some("a b".to_string());
        assert!(request.validate().is_err());

        request.alias = Some("my-link".to_string());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_rejects_empty_url() {
        assert!(ShortenRequest::new("").validate().is_err());
    }

    #[test]
    fn test_expiry() {
        let mut link = sample_link();
        assert!(!link.is_expired());

        link.expiration = Some(Utc::now() - Duration::minutes(1));
        assert!(link.is_expired());

        link.expiration = None;
        assert!(!link.is_expired());
    }

    #[test]
    fn test_utm_pairs_skip_blank_values() {
        let utm = UtmParams {
            utm_source: Some("newsletter".to_string()),
            utm_medium: Some(String::new()),
            utm_term: Some("rust".to_string()),
            ..Default::default()
        };

        assert_eq!(
            utm.pairs(),
            vec![("utm_source", "newsletter"), ("utm_term", "rust")]
        );
        assert!(UtmParams::default().is_empty());
    }
}
