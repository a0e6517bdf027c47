// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Newsletter email validator.
//!
//! Accepts `local-part@domain.tld` shaped addresses of at most 254
//! characters and returns them trimmed and lowercased.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

/// Longest address accepted (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required parameter: email")]
    MissingEmail,

    #[error("Email address longer than {max} characters")]
    TooLong { max: usize },

    #[error("Invalid email address format: {0}")]
    InvalidFormat(String),
}

/// Validate a raw email and return its normalized form.
pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        debug!("Missing email parameter");
        return Err(ValidationError::MissingEmail);
    }

    if trimmed.chars().count() > MAX_EMAIL_LEN {
        debug!(length = trimmed.chars().count(), "Email too long");
        return Err(ValidationError::TooLong { max: MAX_EMAIL_LEN });
    }

    if !EMAIL_PATTERN.is_match(trimmed) {
        debug!("Email format invalid");
        return Err(ValidationError::InvalidFormat(trimmed.to_string()));
    }

    Ok(trimmed.to_lowercase())
}
