// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router tests driven through `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use essay_site::{
    clock::SystemClock,
    config::{Config, RateLimitConfig},
    handlers::{router, AppState},
    limiter::{RateLimitEntry, RateLimitStore, StoreError},
    ContentRepository, RateLimiter, RuntimeMode, SubmissionGateway,
};
use serde_json::Value;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Store whose backend reports an error carrying internal detail.
#[derive(Debug)]
struct DownStore;

#[async_trait]
impl RateLimitStore for DownStore {
    async fn hit(
        &self,
        _key: &str,
        _now: DateTime<Utc>,
        _window: chrono::Duration,
    ) -> Result<RateLimitEntry, StoreError> {
        Err(StoreError::Unavailable(
            "redis://10.1.2.3:6379 refused connection".to_string(),
        ))
    }
}

/// Store that panics mid-request.
#[derive(Debug)]
struct PanickingStore;

#[async_trait]
impl RateLimitStore for PanickingStore {
    async fn hit(
        &self,
        _key: &str,
        _now: DateTime<Utc>,
        _window: chrono::Duration,
    ) -> Result<RateLimitEntry, StoreError> {
        panic!("store invariant broken: token=s3cr3t");
    }
}

fn content_tree() -> TempDir {
    let content = TempDir::new().unwrap();
    let essays = content.path().join("essays");
    let essays_es = content.path().join("essays-es");
    fs::create_dir_all(&essays).unwrap();
    fs::create_dir_all(&essays_es).unwrap();
    fs::write(
        essays.join("on-slowness.mdx"),
        "---\ntitle: On Slowness\ndate: 2024-02-01\ntags: [craft]\nfeatured: true\n---\nTake your time.\n",
    )
    .unwrap();
    fs::write(
        essays.join("draft.mdx"),
        "---\ntitle: Draft\npublished: false\n---\nLater.\n",
    )
    .unwrap();
    fs::write(
        essays_es.join("sobre-la-lentitud.mdx"),
        "---\ntitle: Sobre la lentitud\ndate: 2024-02-02\n---\nCon calma.\n",
    )
    .unwrap();
    content
}

fn test_config(mode: RuntimeMode, content: &TempDir, max_requests: u32) -> Config {
    let mut config = Config {
        mode,
        content_dir: content.path().to_path_buf(),
        ..Config::default()
    };
    config.site.name = "Field Notes".to_string();
    config.site.url = "https://notes.example.com".to_string();
    config.newsletter.rate_limit = RateLimitConfig {
        window_secs: 900,
        max_requests,
    };
    config
}

fn build_app(config: Config, limiter: RateLimiter) -> Router {
    let repository = ContentRepository::new(config.content_dir.clone(), config.mode, "Site Author");
    let gateway = SubmissionGateway::new(config.mode, limiter, vec![], Duration::from_secs(1));

    router(Arc::new(AppState {
        repository: Arc::new(repository),
        gateway,
        config,
    }))
}

/// Router over a fresh content tree; the tree lives as long as the `TempDir`.
fn test_app(mode: RuntimeMode, max_requests: u32) -> (Router, TempDir) {
    let content = content_tree();
    let config = test_config(mode, &content, max_requests);
    let limiter = RateLimiter::in_memory(config.newsletter.rate_limit.clone());
    (build_app(config, limiter), content)
}

/// Sign-up request arriving from socket peer `peer`.
fn subscribe_request(body: &str, peer: &str) -> Request<Body> {
    let addr: SocketAddr = format!("{peer}:40000").parse().unwrap();
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/api/newsletter")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

fn forwarded_for(mut request: Request<Body>, value: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-forwarded-for", value.parse().unwrap());
    request
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _content) = test_app(RuntimeMode::Production, 5);

    for path in ["/health", "/healthz"] {
        let response = app.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "essay-site");
    }
}

#[tokio::test]
async fn test_subscribe_in_development() {
    let (app, _content) = test_app(RuntimeMode::Development, 5);

    let response = app
        .oneshot(subscribe_request(r#"{"email":"reader@example.com"}"#, "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(
        json["message"],
        "Successfully subscribed to the newsletter! (Development mode)"
    );
}

#[tokio::test]
async fn test_subscribe_rejects_bad_input() {
    let (app, _content) = test_app(RuntimeMode::Development, 5);

    for body in [r#"{"email":"not-an-email"}"#, "{not json", r#"{"other":1}"#] {
        let response = app
            .clone()
            .oneshot(subscribe_request(body, "203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let json = body_json(response).await;
        assert_eq!(json["error"], true);
        assert_eq!(json["message"], "Please provide a valid email address.");
    }
}

#[tokio::test]
async fn test_subscribe_rate_limited() {
    let (app, _content) = test_app(RuntimeMode::Development, 2);
    let body = r#"{"email":"reader@example.com"}"#;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(subscribe_request(body, "198.51.100.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(subscribe_request(body, "198.51.100.4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let headers = response.headers();
    assert_eq!(headers[header::RETRY_AFTER], "900");
    assert_eq!(headers["x-ratelimit-limit"], "2");
    assert_eq!(headers["x-ratelimit-remaining"], "0");
    assert!(headers["x-ratelimit-reset"]
        .to_str()
        .unwrap()
        .parse::<i64>()
        .is_ok());

    let json = body_json(response).await;
    assert_eq!(json["retryAfter"], 900);
    assert_eq!(json["message"], "Too many requests. Please try again later.");

    // A different client still gets through.
    let response = app
        .oneshot(subscribe_request(body, "198.51.100.5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rotating_forwarded_for_is_still_limited() {
    let (app, _content) = test_app(RuntimeMode::Development, 2);
    let body = r#"{"email":"reader@example.com"}"#;

    let mut statuses = Vec::new();
    for i in 0..10 {
        let request = forwarded_for(
            subscribe_request(body, "192.0.2.50"),
            &format!("10.9.9.{i}"),
        );
        statuses.push(app.clone().oneshot(request).await.unwrap().status());
    }

    assert_eq!(&statuses[..2], &[StatusCode::OK, StatusCode::OK]);
    assert!(
        statuses[2..]
            .iter()
            .all(|status| *status == StatusCode::TOO_MANY_REQUESTS),
        "Statuses: {statuses:?}"
    );
}

#[tokio::test]
async fn test_trusted_proxy_keys_on_forwarded_for() {
    let content = content_tree();
    let mut config = test_config(RuntimeMode::Development, &content, 1);
    config.trust_proxy_headers = true;
    let limiter = RateLimiter::in_memory(config.newsletter.rate_limit.clone());
    let app = build_app(config, limiter);
    let body = r#"{"email":"reader@example.com"}"#;

    // Every request arrives from the proxy's address.
    let send = |client: &str| {
        let request = forwarded_for(subscribe_request(body, "10.0.0.2"), client);
        app.clone().oneshot(request)
    };

    assert_eq!(send("203.0.113.1").await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        send("203.0.113.1, 10.0.0.1").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(send("203.0.113.2").await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn test_store_failure_is_generic_500() {
    let content = content_tree();
    let config = test_config(RuntimeMode::Development, &content, 5);
    let limiter = RateLimiter::new(
        config.newsletter.rate_limit.clone(),
        Arc::new(DownStore),
        Arc::new(SystemClock),
    );
    let app = build_app(config, limiter);

    let response = app
        .oneshot(subscribe_request(r#"{"email":"reader@example.com"}"#, "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let text = body_text(response).await;
    let json: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["error"], true);
    assert_eq!(json["message"], "Something went wrong. Please try again.");
    assert!(!text.contains("redis"));
    assert!(!text.contains("10.1.2.3"));
}

#[tokio::test]
async fn test_handler_panic_is_generic_500() {
    let content = content_tree();
    let config = test_config(RuntimeMode::Development, &content, 5);
    let limiter = RateLimiter::new(
        config.newsletter.rate_limit.clone(),
        Arc::new(PanickingStore),
        Arc::new(SystemClock),
    );
    let app = build_app(config, limiter);

    let response = app
        .oneshot(subscribe_request(r#"{"email":"reader@example.com"}"#, "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let text = body_text(response).await;
    let json: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["message"], "Something went wrong. Please try again.");
    assert!(!text.contains("s3cr3t"));
}

#[tokio::test]
async fn test_subscribe_unavailable_in_production() {
    let (app, _content) = test_app(RuntimeMode::Production, 5);

    let response = app
        .oneshot(subscribe_request(r#"{"email":"reader@example.com"}"#, "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Newsletter service not configured. Please try again later."
    );
}

#[tokio::test]
async fn test_essay_endpoints() {
    let (app, _content) = test_app(RuntimeMode::Production, 5);

    let json = body_json(app.clone().oneshot(get("/api/essays")).await.unwrap()).await;
    let essays = json.as_array().unwrap();
    assert_eq!(essays.len(), 1);
    assert_eq!(essays[0]["slug"], "on-slowness");
    assert_eq!(essays[0]["metadata"]["displayDate"], "February 1, 2024");
    assert!(essays[0].get("body").is_none());

    let response = app.clone().oneshot(get("/api/essays/on-slowness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["metadata"]["title"], "On Slowness");
    assert_eq!(json["body"].as_str().unwrap().trim(), "Take your time.");

    let response = app.clone().oneshot(get("/api/essays/draft")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], true);

    let json = body_json(app.clone().oneshot(get("/api/essays?tag=CRAFT")).await.unwrap()).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let json = body_json(app.clone().oneshot(get("/api/slugs")).await.unwrap()).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let json = body_json(app.clone().oneshot(get("/api/tags")).await.unwrap()).await;
    assert_eq!(json, serde_json::json!(["craft"]));

    let json = body_json(app.clone().oneshot(get("/api/featured")).await.unwrap()).await;
    assert_eq!(json[0]["slug"], "on-slowness");

    let json = body_json(app.oneshot(get("/api/essays?locale=es-MX")).await.unwrap()).await;
    assert_eq!(json[0]["slug"], "sobre-la-lentitud");
}

#[tokio::test]
async fn test_og_image() {
    let (app, _content) = test_app(RuntimeMode::Production, 5);

    let response = app
        .clone()
        .oneshot(get("/api/og?title=Tea%20%26%20%3Cb%3Etoast%3C%2Fb%3E&description=Short"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
    let svg = body_text(response).await;
    assert!(svg.contains(r#"width="1200" height="630""#));
    assert!(svg.contains("Tea &amp; &lt;b&gt;toast&lt;/b&gt;"));
    assert!(svg.contains("Short"));

    let svg = body_text(app.oneshot(get("/api/og")).await.unwrap()).await;
    assert!(svg.contains(">Field Notes</text>"));
}

#[tokio::test]
async fn test_sitemap() {
    let (app, _content) = test_app(RuntimeMode::Production, 5);

    let response = app.oneshot(get("/sitemap.xml")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");

    let xml = body_text(response).await;
    assert!(xml.contains("<loc>https://notes.example.com</loc>"));
    assert!(xml.contains("<loc>https://notes.example.com/about</loc>"));
    assert!(xml.contains("<loc>https://notes.example.com/essays/on-slowness</loc>"));
    assert!(xml.contains("<loc>https://notes.example.com/essays/draft</loc>"));
    assert!(xml.contains("<loc>https://notes.example.com/es/essays/sobre-la-lentitud</loc>"));
}
