// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Mailing-list provider adapters.
//!
//! Every adapter exposes the same capability: subscribe one normalized
//! email and report success or a diagnostic. Diagnostics are for server
//! logs only.

use crate::config::{ConvertKitConfig, MailchimpConfig, NewsletterConfig};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Longest provider response body kept in a diagnostic.
const MAX_DIAGNOSTIC_LEN: usize = 512;

/// Result of one subscription attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Subscribed,
    Failed { diagnostic: String },
}

impl ProviderOutcome {
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self::Failed {
            diagnostic: diagnostic.into(),
        }
    }
}

#[async_trait]
pub trait SubscriptionProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Whether credentials are present. Unconfigured providers are skipped.
    fn is_configured(&self) -> bool;

    async fn subscribe(&self, email: &str) -> ProviderOutcome;
}

/// Build the HTTP client shared by all providers.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Providers in priority order: Mailchimp, then ConvertKit.
pub fn default_providers(
    config: &NewsletterConfig,
    client: &reqwest::Client,
) -> Vec<Arc<dyn SubscriptionProvider>> {
    vec![
        Arc::new(MailchimpProvider::new(&config.mailchimp, client.clone())),
        Arc::new(ConvertKitProvider::new(&config.convertkit, client.clone())),
    ]
}

/// Mailchimp audience members API.
#[derive(Debug, Clone)]
pub struct MailchimpProvider {
    config: MailchimpConfig,
    client: reqwest::Client,
}

impl MailchimpProvider {
    pub fn new(config: &MailchimpConfig, client: reqwest::Client) -> Self {
        Self {
            config: config.clone(),
            client,
        }
    }

    /// Members endpoint; the datacenter is the API key suffix (`…-us21`).
    fn members_url(api_key: &str, audience_id: &str) -> Option<String> {
        let (_, datacenter) = api_key.rsplit_once('-')?;
        if datacenter.is_empty() || !datacenter.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(format!(
            "https://{datacenter}.api.mailchimp.com/3.0/lists/{audience_id}/members"
        ))
    }
}

#[async_trait]
impl SubscriptionProvider for MailchimpProvider {
    fn name(&self) -> &str {
        "mailchimp"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn subscribe(&self, email: &str) -> ProviderOutcome {
        let (Some(api_key), Some(audience_id)) = (&self.config.api_key, &self.config.audience_id)
        else {
            return ProviderOutcome::failed("not configured");
        };
        let Some(url) = Self::members_url(api_key, audience_id) else {
            return ProviderOutcome::failed("API key has no datacenter suffix");
        };

        let request = self
            .client
            .post(url)
            .basic_auth("anystring", Some(api_key))
            .json(&json!({
                "email_address": email,
                "status": "subscribed",
            }));

        send(request).await
    }
}

/// ConvertKit form subscription API.
#[derive(Debug, Clone)]
pub struct ConvertKitProvider {
    config: ConvertKitConfig,
    client: reqwest::Client,
}

impl ConvertKitProvider {
    pub fn new(config: &ConvertKitConfig, client: reqwest::Client) -> Self {
        Self {
            config: config.clone(),
            client,
        }
    }
}

#[async_trait]
impl SubscriptionProvider for ConvertKitProvider {
    fn name(&self) -> &str {
        "convertkit"
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn subscribe(&self, email: &str) -> ProviderOutcome {
        let (Some(api_key), Some(form_id)) = (&self.config.api_key, &self.config.form_id) else {
            return ProviderOutcome::failed("not configured");
        };

        let url = format!(
            "https://api.convertkit.com/v3/forms/{}/subscribe",
            url::form_urlencoded::byte_serialize(form_id.as_bytes()).collect::<String>()
        );
        let request = self.client.post(url).json(&json!({
            "api_key": api_key,
            "email": email,
        }));

        send(request).await
    }
}

async fn send(request: reqwest::RequestBuilder) -> ProviderOutcome {
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => return ProviderOutcome::failed(format!("request failed: {err}")),
    };

    let status = response.status();
    if status.is_success() {
        return ProviderOutcome::Subscribed;
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_DIAGNOSTIC_LEN).collect();
    ProviderOutcome::failed(format!("HTTP {status}: {body}"))
}
