// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the essay site.

use crate::validator::ValidationError;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a front-matter header into metadata.
#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("front-matter must be a key/value mapping")]
    NotMapping,
}

/// Content repository errors.
///
/// These never reach page rendering: the repository logs them and degrades
/// to an empty or "not found" result.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid front-matter in {path}: {source}")]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },
}

/// Outcome of a rejected newsletter submission.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited {
        retry_after_secs: u64,
        limit: u32,
        remaining: u32,
        reset_at: DateTime<Utc>,
    },

    #[error("no newsletter provider accepted the submission")]
    ServiceUnavailable,

    /// Server-side detail; never shown to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}
