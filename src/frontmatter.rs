// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Front-matter splitting and the permissive metadata conversion.
//!
//! A content file looks like:
//!
//! ```text
//! ---
//! title: On Slowness
//! date: 2024-01-15
//! tags: [craft, attention]
//! ---
//! Body markup...
//! ```
//!
//! Missing or wrongly typed fields fall back to defaults and are reported in
//! [`ParsedDocument::defaults_applied`]. Only a header that is not YAML, or
//! not a mapping, is a hard failure.

use crate::document::{display_date, Document, DocumentMetadata, ReadingStats};
use crate::error::FrontMatterError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_yaml::{Mapping, Value};
use tracing::warn;

const FENCE: &str = "---";

/// Title used when a document has none.
pub const UNTITLED: &str = "Untitled";

/// Recognized front-matter keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    Title,
    Date,
    Summary,
    Tags,
    Featured,
    Published,
    Author,
}

impl MetadataField {
    pub fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Date => "date",
            Self::Summary => "summary",
            Self::Tags => "tags",
            Self::Featured => "featured",
            Self::Published => "published",
            Self::Author => "author",
        }
    }
}

impl std::fmt::Display for MetadataField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A document converted from a content file, with the fields that fell
/// back to defaults.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document: Document,
    pub defaults_applied: Vec<MetadataField>,
}

/// Inputs the conversion needs besides the file itself.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Author credited when the file names none
    pub default_author: &'a str,
    /// Date given to documents without a usable `date`
    pub today: NaiveDate,
}

/// Split a file into its front-matter header and body.
///
/// A file that does not open with a `---` line, or never closes the fence,
/// has no header.
pub fn split(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let rest = match content.split_once('\n') {
        Some((first, rest)) if first.trim_end() == FENCE => rest,
        _ => return (None, content),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }

    (None, content)
}

/// Convert a content file into a [`Document`].
pub fn parse_document(
    slug: &str,
    content: &str,
    ctx: ParseContext<'_>,
) -> Result<ParsedDocument, FrontMatterError> {
    let (header, body) = split(content);
    let mapping = match header {
        Some(header) => parse_header(header)?,
        None => Mapping::new(),
    };

    let mut defaults_applied = Vec::new();
    let get = |field: MetadataField| mapping.get(field.key()).filter(|v| !v.is_null());

    let title = get(MetadataField::Title)
        .and_then(scalar_string)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            defaults_applied.push(MetadataField::Title);
            UNTITLED.to_string()
        });

    let date = get(MetadataField::Date)
        .and_then(|value| {
            let parsed = scalar_string(value).as_deref().and_then(parse_date);
            if parsed.is_none() {
                warn!(slug, value = ?value, "Unparseable date, using today");
            }
            parsed
        })
        .unwrap_or_else(|| {
            defaults_applied.push(MetadataField::Date);
            ctx.today
        });

    let summary = get(MetadataField::Summary)
        .and_then(scalar_string)
        .unwrap_or_else(|| {
            defaults_applied.push(MetadataField::Summary);
            String::new()
        });

    let tags = get(MetadataField::Tags)
        .and_then(Value::as_sequence)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| {
            defaults_applied.push(MetadataField::Tags);
            Vec::new()
        });

    let featured = get(MetadataField::Featured)
        .and_then(truthy)
        .unwrap_or_else(|| {
            defaults_applied.push(MetadataField::Featured);
            false
        });

    // Only an explicit `false` hides a document.
    let published = get(MetadataField::Published)
        .and_then(flag)
        .unwrap_or_else(|| {
            defaults_applied.push(MetadataField::Published);
            true
        });

    let author = get(MetadataField::Author)
        .and_then(scalar_string)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            defaults_applied.push(MetadataField::Author);
            ctx.default_author.to_string()
        });

    let reading_stats = ReadingStats::from_body(body);

    Ok(ParsedDocument {
        document: Document {
            slug: slug.to_string(),
            metadata: DocumentMetadata {
                title,
                display_date: display_date(date),
                date,
                summary,
                tags,
                featured,
                published,
                author,
                reading_time: reading_stats.text.clone(),
            },
            body: body.to_string(),
            reading_stats,
        },
        defaults_applied,
    })
}

fn parse_header(header: &str) -> Result<Mapping, FrontMatterError> {
    if header.trim().is_empty() {
        return Ok(Mapping::new());
    }

    match serde_yaml::from_str::<Value>(header)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(FrontMatterError::NotMapping),
    }
}

/// Parse the date forms authors actually write.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(timestamp.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y/%m/%d").ok()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Like [`flag`], but a number counts as set when it is non-zero.
fn truthy(value: &Value) -> Option<bool> {
    match value {
        Value::Number(n) => Some(n.as_f64().is_some_and(|n| n != 0.0)),
        other => flag(other),
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
