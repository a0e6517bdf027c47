// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Document types served by the content repository.
//!
//! A document is exposed in two shapes: [`Document`] carries the markup
//! body, [`DocumentSummary`] is the metadata-only list view.

use chrono::NaiveDate;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

/// Reading speed used for reading-time estimates.
pub const WORDS_PER_MINUTE: f64 = 200.0;

/// Estimated reading time derived from a document body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingStats {
    /// Display label, e.g. `"4 min read"`
    pub text: String,
    /// Fractional minutes
    pub minutes: f64,
    /// Reading time in milliseconds
    pub time_ms: u64,
    pub words: usize,
}

impl ReadingStats {
    pub fn from_body(body: &str) -> Self {
        let words = body.unicode_words().count();
        let minutes = words as f64 / WORDS_PER_MINUTE;
        // Round to hundredths before ceil so float noise cannot add a minute.
        let displayed = ((minutes * 100.0).round() / 100.0).ceil() as u64;

        Self {
            text: format!("{displayed} min read"),
            minutes,
            time_ms: (minutes * 60_000.0).round() as u64,
            words,
        }
    }
}

/// Validated front-matter of a document, with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    pub date: NaiveDate,
    /// Human-readable date, e.g. `"January 5, 2024"`
    pub display_date: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub published: bool,
    pub author: String,
    pub reading_time: String,
}

impl DocumentMetadata {
    /// Whether the document carries `tag`, ignoring case.
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == wanted)
    }
}

/// Format a date the way it appears on pages.
pub fn display_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// A full document, body included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub slug: String,
    pub metadata: DocumentMetadata,
    pub body: String,
    pub reading_stats: ReadingStats,
}

/// Metadata-only view of a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub slug: String,
    pub metadata: DocumentMetadata,
    pub reading_stats: ReadingStats,
}

impl From<Document> for DocumentSummary {
    fn from(document: Document) -> Self {
        Self {
            slug: document.slug,
            metadata: document.metadata,
            reading_stats: document.reading_stats,
        }
    }
}
