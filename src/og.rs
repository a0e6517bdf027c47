// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Social preview card rendered as a fixed-size SVG.

use quick_xml::escape::escape;
use std::fmt::Write;

pub const WIDTH: u32 = 1200;
pub const HEIGHT: u32 = 630;

/// Longest description shown on a card.
pub const DESCRIPTION_LIMIT: usize = 160;

const BACKGROUND: &str = "#262624";
const ACCENT: &str = "#da7756";
const TITLE_COLOR: &str = "#ffffff";
const DESCRIPTION_COLOR: &str = "#bfbfbc";

/// Titles longer than this use the smaller font size.
const LONG_TITLE_CHARS: usize = 60;
const MAX_TITLE_LINES: usize = 4;
const MAX_DESCRIPTION_LINES: usize = 3;

/// Render the preview card for `title` and an optional `description`.
pub fn render_card(
    site_name: &str,
    title: &str,
    description: Option<&str>,
) -> Result<String, std::fmt::Error> {
    let title_size: u32 = if title.chars().count() > LONG_TITLE_CHARS {
        48
    } else {
        64
    };
    let title_lines = wrap(title, chars_per_line(title_size), MAX_TITLE_LINES);

    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| truncate_text(d, DESCRIPTION_LIMIT));
    let description_lines = description
        .as_deref()
        .map(|d| wrap(d, chars_per_line(28), MAX_DESCRIPTION_LINES))
        .unwrap_or_default();

    let title_line_height = title_size * 6 / 5;
    let description_line_height = 40;
    let block_height = title_lines.len() as u32 * title_line_height
        + if description_lines.is_empty() {
            0
        } else {
            30 + description_lines.len() as u32 * description_line_height
        };
    let mut y = (HEIGHT.saturating_sub(block_height)) / 2 + title_size;

    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">"#
    )?;
    writeln!(
        svg,
        r#"<defs><pattern id="dots" width="100" height="100" patternUnits="userSpaceOnUse"><circle cx="25" cy="25" r="2" fill="{ACCENT}" fill-opacity="0.1"/><circle cx="75" cy="75" r="2" fill="{ACCENT}" fill-opacity="0.05"/></pattern></defs>"#
    )?;
    writeln!(svg, r#"<rect width="100%" height="100%" fill="{BACKGROUND}"/>"#)?;
    writeln!(svg, r#"<rect width="100%" height="100%" fill="url(#dots)"/>"#)?;
    writeln!(
        svg,
        r#"<text x="600" y="110" text-anchor="middle" font-family="system-ui, sans-serif" font-size="32" font-weight="600" letter-spacing="2" fill="{ACCENT}">{}</text>"#,
        escape(site_name.to_uppercase().as_str())
    )?;

    for line in &title_lines {
        writeln!(
            svg,
            r#"<text x="600" y="{y}" text-anchor="middle" font-family="system-ui, sans-serif" font-size="{title_size}" font-weight="700" fill="{TITLE_COLOR}">{}</text>"#,
            escape(line.as_str())
        )?;
        y += title_line_height;
    }

    if !description_lines.is_empty() {
        y += 30;
        for line in &description_lines {
            writeln!(
                svg,
                r#"<text x="600" y="{y}" text-anchor="middle" font-family="system-ui, sans-serif" font-size="28" fill="{DESCRIPTION_COLOR}">{}</text>"#,
                escape(line.as_str())
            )?;
            y += description_line_height;
        }
    }

    writeln!(
        svg,
        r#"<rect x="0" y="{}" width="{WIDTH}" height="8" fill="{ACCENT}"/>"#,
        HEIGHT - 8
    )?;
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Shorten `text` to at most `limit` characters on a word boundary,
/// appending `...` when anything was cut.
pub fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let cut: String = text.chars().take(limit).collect();
    // Drop the trailing partial word, if the cut landed inside one.
    let kept = match cut.rfind(char::is_whitespace) {
        Some(idx) => cut[..idx].trim_end(),
        None => cut.as_str(),
    };
    format!("{kept}...")
}

/// Rough characters per 900px line for a font size.
fn chars_per_line(font_size: u32) -> usize {
    (900 * 2 / font_size).max(10) as usize
}

/// Greedy word wrap; the last kept line gets an ellipsis if text remains.
fn wrap(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            last.push('…');
        }
    }
    lines
}
