//! Slug derivation for idea artifacts.

/// Maximum slug length before disambiguation suffixes.
pub const MAX_SLUG_LEN: usize = 50;

const FALLBACK_SLUG: &str = "unnamed-idea";

/// Derive a filesystem-safe slug from a title.
///
/// Lowercases ASCII alphanumerics, collapses every other run of characters to
/// a single `-`, truncates to [`MAX_SLUG_LEN`] and trims edge hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Disambiguate `base` against already-taken slugs with `-2`, `-3`, ...
pub fn unique_slug(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    (2u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
