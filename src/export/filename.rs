//! Conversation title and output filename

use crate::chat::PageLayout;
use crate::config::OutputConfig;
use crate::dom::{html, DomTree};
use crate::export::ExportFormat;
use chrono::{DateTime, Local};

/// Characters that are not allowed in filenames on at least one common platform
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Share of the length budget, counted from the end, in which a word boundary is preferred
const WORD_BOUNDARY_WINDOW: f64 = 0.4;

/// The conversation's title, if the page shows a meaningful one
///
/// Candidates are tried in layout order. Site suffixes such as `" - Gemini"` are removed and
/// titles that only name the site are skipped.
pub fn extract_title(tree: &DomTree, layout: &PageLayout) -> Option<String> {
    layout
        .title
        .iter()
        .filter_map(|path| path.first_in_document(&tree.root))
        .map(html::normalized_text)
        .map(|title| strip_suffix(title, &layout.title_suffixes))
        .find(|title| !title.is_empty() && !is_generic(title, &layout.generic_titles))
}

fn strip_suffix(title: String, suffixes: &[String]) -> String {
    suffixes
        .iter()
        .find_map(|suffix| title.strip_suffix(suffix.as_str()))
        .map(|stripped| stripped.trim().to_string())
        .unwrap_or(title)
}

fn is_generic(title: &str, generic: &[String]) -> bool {
    generic.iter().any(|g| g.eq_ignore_ascii_case(title))
}

/// Filename for an export made now
pub fn generate_filename(title: Option<&str>, format: ExportFormat, output: &OutputConfig) -> String {
    generate_filename_at(title, format, output, Local::now())
}

/// Filename for an export made at `now`
///
/// The title is cleaned of characters that are invalid in paths, shortened to the configured
/// length (at a word boundary when one is close to the end) and given the format's extension.
/// Without a usable title the name is `{prefix}-YYYYMMDD-HHMMSS`.
pub fn generate_filename_at(
    title: Option<&str>,
    format: ExportFormat,
    output: &OutputConfig,
    now: DateTime<Local>,
) -> String {
    let stem = title
        .map(sanitize)
        .map(|clean| truncate(&clean, output.max_filename_length))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| format!("{}-{}", output.filename_prefix, now.format("%Y%m%d-%H%M%S")));

    format!("{}.{}", stem, format.extension())
}

fn sanitize(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) || c.is_control() { ' ' } else { c })
        .collect();
    html::collapse_whitespace(&replaced)
}

fn truncate(name: &str, max_len: usize) -> String {
    let trim = |s: &str| s.trim_end_matches(['.', ' ']).trim_start().to_string();

    if name.chars().count() <= max_len {
        return trim(name);
    }

    let cut: String = name.chars().take(max_len).collect();
    let window_start = (max_len as f64 * (1.0 - WORD_BOUNDARY_WINDOW)) as usize;
    let boundary = cut
        .char_indices()
        .filter(|(_, c)| *c == ' ')
        .map(|(i, _)| i)
        .last()
        .filter(|&i| cut[..i].chars().count() >= window_start);

    match boundary {
        Some(i) => trim(&cut[..i]),
        None => trim(&cut),
    }
}
