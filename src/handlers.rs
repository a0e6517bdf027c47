// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the essay site.
//!
//! The newsletter endpoint is the only write path. Everything else is a
//! read over the content repository, the preview card renderer or the
//! sitemap.

use crate::config::Config;
use crate::document::{Document, DocumentSummary};
use crate::error::SubmissionError;
use crate::gateway::SubmissionGateway;
use crate::locale::Locale;
use crate::og;
use crate::repository::ContentRepository;
use crate::sitemap;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

const MSG_SUBSCRIBED: &str = "Successfully subscribed to the newsletter!";
const MSG_SUBSCRIBED_DEV: &str = "Successfully subscribed to the newsletter! (Development mode)";
const MSG_INVALID_EMAIL: &str = "Please provide a valid email address.";
const MSG_RATE_LIMITED: &str = "Too many requests. Please try again later.";
const MSG_UNAVAILABLE: &str = "Newsletter service not configured. Please try again later.";
const MSG_INTERNAL: &str = "Something went wrong. Please try again.";
const MSG_NOT_FOUND: &str = "Essay not found.";

/// Shared application state.
pub struct AppState {
    pub repository: Arc<ContentRepository>,
    pub gateway: SubmissionGateway,
    pub config: Config,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            retry_after: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Newsletter sign-up body.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub email: String,
}

/// Query parameters of the content read API.
#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

impl ContentQuery {
    fn locale(&self) -> Locale {
        self.locale.as_deref().map(Locale::from_tag).unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OgQuery {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        match self {
            SubmissionError::Validation(err) => {
                debug!(error = %err, "Rejected newsletter submission");
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(MSG_INVALID_EMAIL))).into_response()
            }
            SubmissionError::RateLimited {
                retry_after_secs,
                limit,
                remaining,
                reset_at,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    (header::RETRY_AFTER.as_str(), retry_after_secs.to_string()),
                    ("X-RateLimit-Limit", limit.to_string()),
                    ("X-RateLimit-Remaining", remaining.to_string()),
                    ("X-RateLimit-Reset", reset_at.timestamp().to_string()),
                ],
                Json(ErrorResponse {
                    retry_after: Some(retry_after_secs),
                    ..ErrorResponse::new(MSG_RATE_LIMITED)
                }),
            )
                .into_response(),
            SubmissionError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(MSG_UNAVAILABLE)),
            )
                .into_response(),
            SubmissionError::Internal(detail) => {
                error!(%detail, "Newsletter submission failed");
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(MSG_INTERNAL)),
    )
        .into_response()
}

/// Identify the client for rate limiting.
///
/// Without `trust_proxy_headers` the key is the socket peer address, since
/// any client can set forwarding headers. Behind a trusted proxy the order
/// is the first `X-Forwarded-For` entry, then `X-Real-IP`, then the peer.
/// `"unknown"` when nothing identifies the client.
pub fn client_key(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    let peer_key = || {
        peer.map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    };
    if !trust_proxy_headers {
        return peer_key();
    }

    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header_value("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real_ip) = header_value("x-real-ip") {
        return real_ip.to_string();
    }
    peer_key()
}

/// Run a repository query off the async executor.
async fn with_repository<T, F>(state: &AppState, query: F) -> Result<T, Response>
where
    F: FnOnce(&ContentRepository) -> T + Send + 'static,
    T: Send + 'static,
{
    let repository = state.repository.clone();
    tokio::task::spawn_blocking(move || query(&repository))
        .await
        .map_err(|err| {
            error!(error = %err, "Content query task failed");
            internal_error()
        })
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Newsletter sign-up.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            debug!(error = %rejection, "Malformed newsletter request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(MSG_INVALID_EMAIL)),
            )
                .into_response();
        }
    };

    let key = client_key(
        &headers,
        connect_info.map(|ConnectInfo(addr)| addr),
        state.config.trust_proxy_headers,
    );
    match state.gateway.submit(&request.email, &key).await {
        Ok(accepted) => {
            let message = if accepted.dev_fallback {
                MSG_SUBSCRIBED_DEV
            } else {
                MSG_SUBSCRIBED
            };
            Json(SuccessResponse {
                success: true,
                message: message.to_string(),
            })
            .into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Visible essays, newest first, optionally filtered by `?tag=`.
pub async fn list_essays(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Vec<DocumentSummary>>, Response> {
    let locale = query.locale();
    let tag = query.tag.filter(|t| !t.trim().is_empty());
    let essays = with_repository(&state, move |repo| match tag {
        Some(tag) => repo.list_by_tag(&tag, locale),
        None => repo.list_all(locale),
    })
    .await?;
    Ok(Json(essays))
}

/// A single essay with its body.
pub async fn get_essay(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Document>, Response> {
    let locale = query.locale();
    let lookup = slug.clone();
    match with_repository(&state, move |repo| repo.get_by_slug(&lookup, locale)).await? {
        Some(document) => Ok(Json(document)),
        None => {
            debug!(%slug, %locale, "Essay not found");
            Err((StatusCode::NOT_FOUND, Json(ErrorResponse::new(MSG_NOT_FOUND))).into_response())
        }
    }
}

pub async fn list_featured(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Vec<DocumentSummary>>, Response> {
    let locale = query.locale();
    Ok(Json(
        with_repository(&state, move |repo| repo.list_featured(locale)).await?,
    ))
}

pub async fn list_slugs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Vec<String>>, Response> {
    let locale = query.locale();
    Ok(Json(
        with_repository(&state, move |repo| repo.list_slugs(locale)).await?,
    ))
}

pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Vec<String>>, Response> {
    let locale = query.locale();
    Ok(Json(
        with_repository(&state, move |repo| repo.list_all_tags(locale)).await?,
    ))
}

/// Social preview card.
pub async fn og_image(State(state): State<Arc<AppState>>, Query(query): Query<OgQuery>) -> Response {
    let site_name = state.config.site.name.as_str();
    let title = query
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(site_name);

    match og::render_card(site_name, title, query.description.as_deref()) {
        Ok(svg) => (
            [
                (header::CONTENT_TYPE, "image/svg+xml"),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            svg,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "Failed to render preview card");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate image").into_response()
        }
    }
}

pub async fn sitemap_xml(State(state): State<Arc<AppState>>) -> Result<Response, Response> {
    let slugs = with_repository(&state, |repo| {
        Locale::ALL
            .iter()
            .map(|&locale| (locale, repo.list_slugs(locale)))
            .collect::<Vec<_>>()
    })
    .await?;

    let today = chrono::Utc::now().date_naive();
    let xml = sitemap::render_sitemap(&state.config.site.url, &slugs, today);
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml).into_response())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(%detail, "Request handler panicked");
    internal_error()
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/api/newsletter", post(subscribe))
        .route("/api/og", get(og_image))
        .route("/api/essays", get(list_essays))
        .route("/api/essays/:slug", get(get_essay))
        .route("/api/featured", get(list_featured))
        .route("/api/slugs", get(list_slugs))
        .route("/api/tags", get(list_tags))
        .route("/sitemap.xml", get(sitemap_xml))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
