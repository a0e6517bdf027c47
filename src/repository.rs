// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! File-backed content repository.
//!
//! Documents live in one directory per locale under the content root
//! (`essays/`, `essays-es/`), one `.mdx` file per document. Nothing is
//! cached: every query re-reads the directory.
//!
//! Queries never fail. A missing directory, an unreadable file or a broken
//! header is logged and the query degrades to an empty (or "not found")
//! result, so one bad file cannot take the site down.

use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeMode;
use crate::document::{Document, DocumentSummary};
use crate::error::ContentError;
use crate::frontmatter::{parse_document, ParseContext, ParsedDocument};
use crate::locale::Locale;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Extension of content files.
pub const CONTENT_EXTENSION: &str = "mdx";

/// Maximum number of featured documents returned.
pub const FEATURED_LIMIT: usize = 3;

/// Read-only view over the content tree.
#[derive(Debug, Clone)]
pub struct ContentRepository {
    root: PathBuf,
    mode: RuntimeMode,
    default_author: String,
    clock: Arc<dyn Clock>,
}

impl ContentRepository {
    /// Create a repository rooted at `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        mode: RuntimeMode,
        default_author: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            mode,
            default_author: default_author.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to date documents that carry no date.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Directory holding the documents of `locale`.
    pub fn locale_dir(&self, locale: Locale) -> PathBuf {
        self.root.join(locale.content_dir_name())
    }

    /// All visible documents, newest first.
    pub fn list_all(&self, locale: Locale) -> Vec<DocumentSummary> {
        match self.load_visible(locale) {
            Ok(documents) => documents,
            Err(err) => {
                error!(%locale, error = %err, "Failed to load documents");
                Vec::new()
            }
        }
    }

    /// A single document with its body.
    ///
    /// Absent, unreadable and hidden documents are all reported as `None`.
    pub fn get_by_slug(&self, slug: &str, locale: Locale) -> Option<Document> {
        if !is_plain_slug(slug) {
            debug!(slug, "Rejected slug that is not a plain file stem");
            return None;
        }

        let path = self
            .locale_dir(locale)
            .join(format!("{slug}.{CONTENT_EXTENSION}"));
        if !path.is_file() {
            return None;
        }

        let parsed = match self.load_file(slug, &path) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(slug, %locale, error = %err, "Failed to load document");
                return None;
            }
        };

        if !self.is_visible(&parsed.document) {
            debug!(slug, %locale, "Document is unpublished");
            return None;
        }

        Some(parsed.document)
    }

    /// Every slug present on disk, published or not.
    pub fn list_slugs(&self, locale: Locale) -> Vec<String> {
        let dir = self.locale_dir(locale);
        if !dir.is_dir() {
            warn!(%locale, dir = %dir.display(), "Content directory missing");
            return Vec::new();
        }

        match content_files(&dir) {
            Ok(files) => files.into_iter().map(|(slug, _)| slug).collect(),
            Err(err) => {
                error!(%locale, error = %err, "Failed to list document slugs");
                Vec::new()
            }
        }
    }

    /// Featured documents, newest first, at most [`FEATURED_LIMIT`].
    pub fn list_featured(&self, locale: Locale) -> Vec<DocumentSummary> {
        self.list_all(locale)
            .into_iter()
            .filter(|doc| doc.metadata.featured)
            .take(FEATURED_LIMIT)
            .collect()
    }

    /// Visible documents tagged with `tag`, ignoring case.
    pub fn list_by_tag(&self, tag: &str, locale: Locale) -> Vec<DocumentSummary> {
        self.list_all(locale)
            .into_iter()
            .filter(|doc| doc.metadata.has_tag(tag))
            .collect()
    }

    /// Distinct tags of visible documents, sorted.
    pub fn list_all_tags(&self, locale: Locale) -> Vec<String> {
        self.list_all(locale)
            .into_iter()
            .flat_map(|doc| doc.metadata.tags)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn load_visible(&self, locale: Locale) -> Result<Vec<DocumentSummary>, ContentError> {
        let dir = self.locale_dir(locale);
        if !dir.is_dir() {
            warn!(%locale, dir = %dir.display(), "Content directory missing");
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for (slug, path) in content_files(&dir)? {
            let parsed = self.load_file(&slug, &path)?;
            if self.is_visible(&parsed.document) {
                documents.push(DocumentSummary::from(parsed.document));
            }
        }

        // Stable sort: equal dates keep directory order.
        documents.sort_by(|a, b| b.metadata.date.cmp(&a.metadata.date));
        Ok(documents)
    }

    fn load_file(&self, slug: &str, path: &Path) -> Result<ParsedDocument, ContentError> {
        let content = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let ctx = ParseContext {
            default_author: &self.default_author,
            today: self.clock.now().date_naive(),
        };
        let parsed = parse_document(slug, &content, ctx).map_err(|source| {
            ContentError::FrontMatter {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if !parsed.defaults_applied.is_empty() {
            debug!(
                slug,
                defaults = ?parsed.defaults_applied,
                "Applied metadata defaults"
            );
        }
        Ok(parsed)
    }

    fn is_visible(&self, document: &Document) -> bool {
        self.mode.is_development() || document.metadata.published
    }
}

/// Content files of a directory as `(slug, path)`, in directory order.
fn content_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, ContentError> {
    let io_error = |source: std::io::Error| ContentError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let is_content = path.extension().and_then(|e| e.to_str()) == Some(CONTENT_EXTENSION);
        if !is_content || !path.is_file() {
            continue;
        }

        match path.file_stem().and_then(|s| s.to_str()) {
            Some(slug) if !slug.is_empty() => files.push((slug.to_string(), path.clone())),
            _ => warn!(path = %path.display(), "Skipping content file with a non UTF-8 name"),
        }
    }
    Ok(files)
}

/// A slug must name a file directly inside the locale directory.
fn is_plain_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('.')
        && !slug.contains(['/', '\\', '\0'])
}
