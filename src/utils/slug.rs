// src/utils/slug.rs

//! Slug generation for public bookshop URLs.
//!
//! Every producer and consumer of slugs (the slug index, the direct-match
//! fallback, adapter filtering, sitemap/SEO output) goes through [`slugify`].
//! A slug is lowercase, hyphen-joined and limited to ASCII word characters.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Record;

/// Anything that is not an ASCII word character, whitespace or a hyphen.
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_\s-]").expect("static slug pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static slug pattern"));

static HYPHENS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("static slug pattern"));

/// Convert a display name into its canonical slug.
///
/// ```
/// use bookshop_directory::utils::slug::slugify;
///
/// assert_eq!(slugify("Powell's City of Books"), "powells-city-of-books");
/// assert_eq!(slugify("  Barnes & Noble -- Downtown "), "barnes-noble-downtown");
/// ```
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = DISALLOWED.replace_all(lowered.trim(), "");
    let hyphenated = WHITESPACE.replace_all(stripped.trim(), "-");
    let collapsed = HYPHENS.replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').to_string()
}

/// Whether `candidate` is exactly the slug of the record's display name.
///
/// Comparison is ordinal; no locale folding is applied. The empty slug
/// names nothing: a record whose name slugifies to `""` (punctuation or
/// non-ASCII only) has no public URL, so `""` never matches it.
pub fn matches(candidate: &str, record: &Record) -> bool {
    !candidate.is_empty() && slugify(&record.name) == candidate
}
