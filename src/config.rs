// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the essay site.
//!
//! Every value can be supplied through the environment (see
//! [`Config::from_env`]); anything missing falls back to a default so that a
//! bare checkout serves the bundled content in production mode.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest rate-limit window accepted from configuration (one year).
const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Runtime mode of the deployment.
///
/// Development mode shows unpublished documents and accepts newsletter
/// sign-ups without a configured provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Development,
    #[default]
    Production,
}

impl RuntimeMode {
    /// Parse a mode name. Anything other than `development`/`dev` is production.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            _ => Self::Production,
        }
    }

    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:3000)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Development or production behaviour
    #[serde(default)]
    pub mode: RuntimeMode,

    /// Key rate limits on `X-Forwarded-For`/`X-Real-IP` instead of the
    /// socket peer. Only safe behind a proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,

    /// Directory holding `essays/` and `essays-es/` (default: content)
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Site identity
    #[serde(default)]
    pub site: SiteConfig,

    /// Newsletter gateway settings
    #[serde(default)]
    pub newsletter: NewsletterConfig,
}

/// Site identity used for author fallback, preview cards and the sitemap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_name")]
    pub name: String,

    /// Author credited on documents that name none
    #[serde(default = "default_site_name")]
    pub author: String,

    #[serde(default = "default_description")]
    pub description: String,

    /// Public base URL
    #[serde(default = "default_site_url")]
    pub url: String,

    #[serde(default)]
    pub social: SocialLinks,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialLinks {
    pub twitter: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub email: Option<String>,
}

/// Newsletter gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterConfig {
    /// Per-client request budget
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Timeout for a single provider attempt in seconds (default: 10)
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    #[serde(default)]
    pub mailchimp: MailchimpConfig,

    #[serde(default)]
    pub convertkit: ConvertKitConfig,
}

/// Fixed-window rate limiting for the newsletter endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds (default: 900)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Requests allowed per key per window (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailchimpConfig {
    pub api_key: Option<String>,
    pub audience_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertKitConfig {
    pub api_key: Option<String>,
    pub form_id: Option<String>,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_site_name() -> String {
    "Essays".to_string()
}

fn default_description() -> String {
    "Exploring ideas through thoughtful essays and personal reflections.".to_string()
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_window_secs() -> u64 {
    15 * 60
}

fn default_max_requests() -> u32 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            mode: RuntimeMode::default(),
            trust_proxy_headers: false,
            content_dir: default_content_dir(),
            site: SiteConfig::default(),
            newsletter: NewsletterConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            author: default_site_name(),
            description: default_description(),
            url: default_site_url(),
            social: SocialLinks::default(),
        }
    }
}

impl Default for NewsletterConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            provider_timeout_secs: default_provider_timeout_secs(),
            mailchimp: MailchimpConfig::default(),
            convertkit: ConvertKitConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

impl RateLimitConfig {
    /// Get the window length as a calendar duration.
    pub fn window(&self) -> chrono::Duration {
        // Bounded above, so the cast and `seconds` cannot overflow.
        chrono::Duration::seconds(self.window_secs.min(MAX_WINDOW_SECS) as i64)
    }
}

impl NewsletterConfig {
    /// Get the per-attempt provider timeout
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl MailchimpConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.audience_id.is_some()
    }
}

impl ConvertKitConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.form_id.is_some()
    }
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset; unparseable numbers fall back to
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str| var(key).and_then(|v| v.parse::<u64>().ok());

        let defaults = Self::default();
        let site_name = var("SITE_NAME").unwrap_or(defaults.site.name);

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            mode: var("RUNTIME_MODE")
                .map(|v| RuntimeMode::parse(&v))
                .unwrap_or(defaults.mode),
            trust_proxy_headers: var("TRUST_PROXY_HEADERS")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.trust_proxy_headers),
            content_dir: var("CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.content_dir),
            site: SiteConfig {
                author: var("AUTHOR_NAME").unwrap_or_else(|| site_name.clone()),
                name: site_name,
                description: var("SITE_DESCRIPTION").unwrap_or(defaults.site.description),
                url: var("SITE_URL").unwrap_or(defaults.site.url),
                social: SocialLinks {
                    twitter: var("TWITTER_URL"),
                    linkedin: var("LINKEDIN_URL"),
                    github: var("GITHUB_URL"),
                    email: var("AUTHOR_EMAIL"),
                },
            },
            newsletter: NewsletterConfig {
                rate_limit: RateLimitConfig {
                    window_secs: number("NEWSLETTER_WINDOW_SECS")
                        .unwrap_or_else(default_window_secs),
                    max_requests: number("NEWSLETTER_MAX_REQUESTS")
                        .and_then(|v| u32::try_from(v).ok())
                        .unwrap_or_else(default_max_requests),
                },
                provider_timeout_secs: number("PROVIDER_TIMEOUT_SECS")
                    .filter(|secs| *secs > 0)
                    .unwrap_or_else(default_provider_timeout_secs),
                mailchimp: MailchimpConfig {
                    api_key: var("MAILCHIMP_API_KEY"),
                    audience_id: var("MAILCHIMP_AUDIENCE_ID"),
                },
                convertkit: ConvertKitConfig {
                    api_key: var("CONVERTKIT_API_KEY"),
                    form_id: var("CONVERTKIT_FORM_ID"),
                },
            },
        }
    }
}
