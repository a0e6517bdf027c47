// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter for the newsletter endpoint.
//!
//! Each key gets a counter and an absolute window end. The counter is
//! incremented on every request; once the clock passes the window end the
//! entry is dropped and a fresh window starts at count 1. There is no
//! partial decay.
//!
//! The in-memory store is unbounded and only drops an expired entry when
//! its key is seen again. That is acceptable for a single low-traffic
//! process; several processes would need a shared store behind
//! [`RateLimitStore`].

use crate::clock::{Clock, SystemClock};
use crate::config::RateLimitConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Counter state of one key in the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub key: String,
    pub count: u32,
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for rate-limit entries.
///
/// `hit` must reset an expired entry and increment atomically with respect
/// to concurrent hits on the same key.
#[async_trait]
pub trait RateLimitStore: Send + Sync + std::fmt::Debug {
    /// Record one request for `key` at `now` and return the updated entry.
    async fn hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> Result<RateLimitEntry, StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, RateLimitEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> Result<RateLimitEntry, StoreError> {
        let mut entries = self.entries.write().await;

        if entries.get(key).is_some_and(|entry| now > entry.window_end) {
            entries.remove(key);
        }

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry {
                key: key.to_string(),
                count: 0,
                window_end: now + window,
            });
        entry.count = entry.count.saturating_add(1);

        Ok(entry.clone())
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        limit: u32,
        /// Requests left in the current window
        remaining: u32,
        reset_at: DateTime<Utc>,
    },
    /// Request is rate limited
    Limited {
        limit: u32,
        reset_at: DateTime<Utc>,
        /// Whole seconds until the window resets, rounded up
        retry_after_secs: u64,
    },
}

/// Fixed-window limiter over an injected store.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(
        config: RateLimitConfig,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    /// Limiter backed by a fresh in-memory store and the system clock.
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, Arc::new(InMemoryStore::new()), Arc::new(SystemClock))
    }

    /// Count a request for `key` and decide whether it may proceed.
    pub async fn check(&self, key: &str) -> Result<RateLimitResult, StoreError> {
        let now = self.clock.now();
        let limit = self.config.max_requests;
        let entry = self.store.hit(key, now, self.config.window()).await?;

        if entry.count > limit {
            let millis = (entry.window_end - now).num_milliseconds().max(0) as u64;
            let retry_after_secs = millis.div_ceil(1000);
            debug!(key, count = entry.count, retry_after_secs, "Rate limit exceeded");
            return Ok(RateLimitResult::Limited {
                limit,
                reset_at: entry.window_end,
                retry_after_secs,
            });
        }

        Ok(RateLimitResult::Allowed {
            limit,
            remaining: limit - entry.count,
            reset_at: entry.window_end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn limiter(max_requests: u32) -> (RateLimiter, Arc<ManualClock>) {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let config = RateLimitConfig {
            window_secs: 900,
            max_requests,
        };
        let limiter = RateLimiter::new(config, Arc::new(InMemoryStore::new()), clock.clone());
        (limiter, clock)
    }

    #[tokio::test]
    async fn test_sixth_request_is_limited() {
        let (limiter, _clock) = limiter(5);

        for expected_remaining in (0..5).rev() {
            match limiter.check("10.0.0.1").await.unwrap() {
                RateLimitResult::Allowed { remaining, .. } => {
                    assert_eq!(remaining, expected_remaining)
                }
                RateLimitResult::Limited { .. } => panic!("Should not be limited"),
            }
        }

        match limiter.check("10.0.0.1").await.unwrap() {
            RateLimitResult::Limited {
                limit,
                retry_after_secs,
                ..
            } => {
                assert_eq!(limit, 5);
                assert_eq!(retry_after_secs, 900);
            }
            RateLimitResult::Allowed { .. } => panic!("Should be limited"),
        }
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let (limiter, clock) = limiter(1);

        assert!(matches!(
            limiter.check("key").await.unwrap(),
            RateLimitResult::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check("key").await.unwrap(),
            RateLimitResult::Limited { .. }
        ));

        // Exactly at the window end the old window still applies.
        clock.advance(chrono::Duration::seconds(900));
        assert!(matches!(
            limiter.check("key").await.unwrap(),
            RateLimitResult::Limited { .. }
        ));

        clock.advance(chrono::Duration::milliseconds(1));
        assert!(matches!(
            limiter.check("key").await.unwrap(),
            RateLimitResult::Allowed { remaining: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_retry_after_rounds_up() {
        let (limiter, clock) = limiter(1);
        limiter.check("key").await.unwrap();

        clock.advance(chrono::Duration::milliseconds(899_500));
        match limiter.check("key").await.unwrap() {
            RateLimitResult::Limited {
                retry_after_secs, ..
            } => assert_eq!(retry_after_secs, 1),
            RateLimitResult::Allowed { .. } => panic!("Should be limited"),
        }
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (limiter, _clock) = limiter(1);

        limiter.check("a").await.unwrap();
        assert!(matches!(
            limiter.check("a").await.unwrap(),
            RateLimitResult::Limited { .. }
        ));
        assert!(matches!(
            limiter.check("b").await.unwrap(),
            RateLimitResult::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_store_keeps_expired_keys_until_seen() {
        let store = InMemoryStore::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let window = chrono::Duration::seconds(60);

        store.hit("a", start, window).await.unwrap();
        store.hit("b", start, window).await.unwrap();

        let later = start + chrono::Duration::hours(1);
        let entry = store.hit("a", later, window).await.unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.window_end, later + window);
        // Expired keys are only dropped when seen again.
        assert_eq!(store.entries.read().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_hits_are_counted_once_each() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .hit("shared", now, chrono::Duration::seconds(60))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let entry = store
            .hit("shared", now, chrono::Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(entry.count, 51);
    }
}
