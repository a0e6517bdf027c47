// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Essay Site
//!
//! Back end of a personal essay-publishing website:
//!
//! - File-backed content repository with YAML front-matter, two locales
//!   (English default, Spanish) and published/draft visibility
//! - Reading-time estimates and human-readable dates
//! - Newsletter sign-up gateway: email validation, fixed-window rate
//!   limiting per client, ordered fallback across mailing providers
//! - Social preview cards (SVG) and an XML sitemap

pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod frontmatter;
pub mod gateway;
pub mod handlers;
pub mod limiter;
pub mod locale;
pub mod og;
pub mod providers;
pub mod repository;
pub mod sitemap;
pub mod validator;

pub use config::{Config, RuntimeMode};
pub use document::{Document, DocumentMetadata, DocumentSummary, ReadingStats};
pub use error::{ContentError, SubmissionError};
pub use gateway::{Accepted, SubmissionGateway};
pub use limiter::{RateLimitResult, RateLimiter};
pub use locale::Locale;
pub use repository::ContentRepository;
pub use validator::{validate_email, ValidationError};
