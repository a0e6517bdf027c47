// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Newsletter submission gateway.
//!
//! A submission moves through `received -> validated -> rate-checked ->
//! relayed` and ends accepted or rejected. Providers are tried in order;
//! a failing or hung provider falls through to the next one. Nothing is
//! retried or queued.

use crate::config::RuntimeMode;
use crate::error::SubmissionError;
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::providers::{ProviderOutcome, SubscriptionProvider};
use crate::validator::validate_email;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// An accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    /// Provider that took the address; `None` for the development fallback
    pub provider: Option<String>,
    /// Accepted without any provider because the site runs in development mode
    pub dev_fallback: bool,
}

pub struct SubmissionGateway {
    mode: RuntimeMode,
    limiter: RateLimiter,
    providers: Vec<Arc<dyn SubscriptionProvider>>,
    attempt_timeout: Duration,
}

impl SubmissionGateway {
    /// Create a gateway trying `providers` in the given order, each attempt
    /// bounded by `attempt_timeout`.
    pub fn new(
        mode: RuntimeMode,
        limiter: RateLimiter,
        providers: Vec<Arc<dyn SubscriptionProvider>>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            mode,
            limiter,
            providers,
            attempt_timeout,
        }
    }

    /// Handle one sign-up from the client identified by `client_key`.
    pub async fn submit(
        &self,
        raw_email: &str,
        client_key: &str,
    ) -> Result<Accepted, SubmissionError> {
        let email = validate_email(raw_email)?;

        match self.limiter.check(client_key).await {
            Ok(RateLimitResult::Allowed { remaining, .. }) => {
                debug!(client = client_key, remaining, "Submission within rate limit");
            }
            Ok(RateLimitResult::Limited {
                limit,
                reset_at,
                retry_after_secs,
            }) => {
                info!(client = client_key, retry_after_secs, "Newsletter submission rate limited");
                return Err(SubmissionError::RateLimited {
                    retry_after_secs,
                    limit,
                    remaining: 0,
                    reset_at,
                });
            }
            Err(err) => {
                return Err(SubmissionError::Internal(format!(
                    "rate limit check failed: {err}"
                )));
            }
        }

        for provider in self.providers.iter().filter(|p| p.is_configured()) {
            let name = provider.name();
            match tokio::time::timeout(self.attempt_timeout, provider.subscribe(&email)).await {
                Ok(ProviderOutcome::Subscribed) => {
                    info!(provider = name, "Newsletter subscription accepted");
                    return Ok(Accepted {
                        provider: Some(name.to_string()),
                        dev_fallback: false,
                    });
                }
                Ok(ProviderOutcome::Failed { diagnostic }) => {
                    warn!(provider = name, %diagnostic, "Provider rejected subscription");
                }
                Err(_) => {
                    warn!(
                        provider = name,
                        timeout_ms = self.attempt_timeout.as_millis() as u64,
                        "Provider timed out"
                    );
                }
            }
        }

        if self.mode.is_development() {
            debug!("Newsletter signup accepted without a provider (development mode)");
            return Ok(Accepted {
                provider: None,
                dev_fallback: true,
            });
        }

        error!("No newsletter provider accepted the submission");
        Err(SubmissionError::ServiceUnavailable)
    }
}

impl std::fmt::Debug for SubmissionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionGateway")
            .field("mode", &self.mode)
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("attempt_timeout", &self.attempt_timeout)
            .finish_non_exhaustive()
    }
}
