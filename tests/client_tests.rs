//! The reqwest client and view-models against a live server.

mod common;

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use urlsh::client::{ClientError, ShortenerApi, UrlShortenerClient, USER_AGENT};
use urlsh::form::{ShortenForm, StatsView, FIND_FAILED_MESSAGE, LOAD_FAILED_MESSAGE};
use urlsh::models::{Method, ShortenRequest};

async fn spawn_server() -> (UrlShortenerClient, common::TestApp) {
    let app = common::create_app();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = UrlShortenerClient::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
    (client, app)
}

#[tokio::test]
async fn test_shorten_and_read_back() {
    let (client, _app) = spawn_server().await;

    let mut request = ShortenRequest::new("https://example.com/article");
    request.method = Method::Custom;
    request.alias = Some("article".to_string());
    request.utm.utm_source = Some("cli".to_string());

    let link = client.shorten(request).await.unwrap();
    assert_eq!(link.short_code, "article");
    assert_eq!(link.short_url, format!("{}/article", common::BASE_URL));
    assert_eq!(link.utm.utm_source.as_deref(), Some("cli"));

    let fetched = client.get_stats("article").await.unwrap();
    assert_eq!(fetched.id, link.id);

    let found = client.find(&link.short_url).await.unwrap();
    assert_eq!(found.id, link.id);
}

#[tokio::test]
async fn test_visit_and_insights_use_peer_address() {
    let (client, _app) = spawn_server().await;

    let mut request = ShortenRequest::new("https://example.com");
    request.method = Method::Custom;
    request.alias = Some("peer-ip".to_string());
    client.shorten(request).await.unwrap();

    assert!(client.last_access("peer-ip").await.unwrap().is_none());

    client.record_visit("peer-ip").await.unwrap();
    client.record_visit("peer-ip").await.unwrap();

    assert_eq!(client.get_stats("peer-ip").await.unwrap().redirect_count, 2);

    let last = client.last_access("peer-ip").await.unwrap().unwrap();
    assert_eq!(last.ip_address, "127.0.0.1");
    assert_eq!(last.user_agent, USER_AGENT);

    assert_eq!(client.unique_ips("peer-ip").await.unwrap(), vec!["127.0.0.1"]);
    assert_eq!(client.top_agents("peer-ip").await.unwrap(), vec![USER_AGENT]);
}

#[tokio::test]
async fn test_error_status_carries_server_message() {
    let (client, _app) = spawn_server().await;

    match client.get_stats("missing").await {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, 404);
            assert!(message.contains("missing"));
        }
        other => panic!("expected status error, got {:?}", other),
    }

    match client.record_visit("missing").await {
        Err(ClientError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = UrlShortenerClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let result = client.get_stats("abcd").await;
    assert!(matches!(result, Err(ClientError::Http(_))));
}

#[tokio::test]
async fn test_form_and_stats_view_end_to_end() {
    let (client, _app) = spawn_server().await;

    let mut form = ShortenForm::new();
    form.url = "https://example.com/page".to_string();
    form.method = Method::Hash;
    form.submit(&client).await;

    assert!(form.error.is_none());
    assert!(!form.is_loading);
    let short_url = form.shortened_url.clone().unwrap();
    let code = form.link.as_ref().unwrap().short_code.clone();

    let mut view = StatsView::new();
    view.find(&client, &short_url).await;
    assert_eq!(view.short_code(), Some(code.as_str()));

    view.visit(&client, &code).await;
    assert_eq!(view.link.as_ref().unwrap().redirect_count, 1);

    view.load_insights(&client).await;
    assert!(view.error.is_none());
    assert!(view.last_access.is_some());
    assert_eq!(view.unique_ips, vec!["127.0.0.1"]);

    view.load(&client, "does-not-exist").await;
    assert_eq!(view.error.as_deref(), Some(LOAD_FAILED_MESSAGE));
    assert!(view.link.is_none());

    view.find(&client, "http://sh.test/nope").await;
    assert_eq!(view.error.as_deref(), Some(FIND_FAILED_MESSAGE));
}
