// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! XML sitemap.

use crate::locale::Locale;
use chrono::NaiveDate;
use quick_xml::escape::escape;
use std::fmt::Write;

/// Pages that exist independently of the content tree.
const STATIC_PAGES: [(&str, &str, &str); 3] = [
    ("", "daily", "1.0"),
    ("/essays", "weekly", "0.8"),
    ("/about", "monthly", "0.6"),
];

const ESSAY_CHANGE_FREQUENCY: &str = "weekly";
const ESSAY_PRIORITY: &str = "0.9";

/// Render the sitemap for `base_url` with the essay slugs of each locale.
///
/// Every entry carries `today` as its last modification date.
pub fn render_sitemap(base_url: &str, slugs: &[(Locale, Vec<String>)], today: NaiveDate) -> String {
    let base = base_url.trim_end_matches('/');
    let lastmod = today.format("%Y-%m-%d").to_string();

    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    for (path, frequency, priority) in STATIC_PAGES {
        let loc = if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}{path}")
        };
        push_url(&mut xml, &loc, &lastmod, frequency, priority);
    }

    for (locale, locale_slugs) in slugs {
        for slug in locale_slugs {
            let loc = format!("{base}{}/essays/{slug}", locale.path_prefix());
            push_url(&mut xml, &loc, &lastmod, ESSAY_CHANGE_FREQUENCY, ESSAY_PRIORITY);
        }
    }

    xml.push_str("</urlset>\n");
    xml
}

fn push_url(xml: &mut String, loc: &str, lastmod: &str, frequency: &str, priority: &str) {
    // Writing into a String cannot fail.
    let _ = write!(
        xml,
        "  <url>\n    <loc>{}</loc>\n    <lastmod>{lastmod}</lastmod>\n    \
         <changefreq>{frequency}</changefreq>\n    <priority>{priority}</priority>\n  </url>\n",
        escape(loc)
    );
}
