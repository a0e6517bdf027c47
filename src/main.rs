// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Essay Site Service
//!
//! Serves the content read API, newsletter sign-ups, preview cards and the
//! sitemap for a personal essay site.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (a `.env` file in the
//! working directory is honoured):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:3000)
//! - `RUNTIME_MODE`: `development` or `production` (default: production)
//! - `CONTENT_DIR`: Content root holding `essays/` and `essays-es/` (default: content)
//! - `SITE_NAME`, `AUTHOR_NAME`, `SITE_DESCRIPTION`, `SITE_URL`: Site identity
//! - `MAILCHIMP_API_KEY`, `MAILCHIMP_AUDIENCE_ID`: Mailchimp audience
//! - `CONVERTKIT_API_KEY`, `CONVERTKIT_FORM_ID`: ConvertKit form
//! - `PROVIDER_TIMEOUT_SECS`: Per-provider timeout (default: 10)
//! - `NEWSLETTER_WINDOW_SECS`: Rate-limit window (default: 900)
//! - `NEWSLETTER_MAX_REQUESTS`: Sign-ups per client per window (default: 5)
//! - `TRUST_PROXY_HEADERS`: Key sign-up limits on `X-Forwarded-For` /
//!   `X-Real-IP` instead of the socket peer (default: false). Enable only
//!   behind a proxy that overwrites these headers.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use essay_site::{
    config::Config,
    gateway::SubmissionGateway,
    handlers::{router, AppState},
    limiter::RateLimiter,
    providers::{default_providers, http_client},
    repository::ContentRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        mode = %config.mode,
        content_dir = %config.content_dir.display(),
        window_secs = config.newsletter.rate_limit.window_secs,
        max_requests = config.newsletter.rate_limit.max_requests,
        trust_proxy_headers = config.trust_proxy_headers,
        "Starting essay site"
    );

    let repository = ContentRepository::new(
        config.content_dir.clone(),
        config.mode,
        config.site.author.clone(),
    );

    let timeout = config.newsletter.provider_timeout();
    let client = http_client(timeout)?;
    let providers = default_providers(&config.newsletter, &client);
    for provider in &providers {
        info!(
            provider = provider.name(),
            configured = provider.is_configured(),
            "Newsletter provider"
        );
    }

    let limiter = RateLimiter::in_memory(config.newsletter.rate_limit.clone());
    let gateway = SubmissionGateway::new(config.mode, limiter, providers, timeout);

    let state = Arc::new(AppState {
        repository: Arc::new(repository),
        gateway,
        config: config.clone(),
    });

    let app = router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
