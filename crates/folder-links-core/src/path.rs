//! The single normalization rule shared by every surface.
//!
//! A folder link is link text whose target ends with `/`. Its folder path is
//! the trimmed target with exactly one trailing `/` removed. Comparison is
//! exact and case-sensitive.

/// Separator that marks a link target as a folder.
pub const FOLDER_SEPARATOR: char = '/';

/// Returns true if `target` denotes a folder (trimmed, ends with `/`).
pub fn is_folder_link(target: &str) -> bool {
    let trimmed = target.trim();
    !trimmed.is_empty() && trimmed.ends_with(FOLDER_SEPARATOR)
}

/// Convert a folder link target into the folder path it refers to.
///
/// Example: `folder_path_from_link(" Projects/2024/ ")` → `"Projects/2024"`
pub fn folder_path_from_link(target: &str) -> String {
    let trimmed = target.trim();
    trimmed
        .strip_suffix(FOLDER_SEPARATOR)
        .unwrap_or(trimmed)
        .to_string()
}

/// Convert a folder path into the canonical link target (`a/b` → `a/b/`).
pub fn folder_link_from_path(path: &str) -> String {
    format!("{}{}", path, FOLDER_SEPARATOR)
}

/// Split raw link text at the first `|` into target and alias.
pub fn split_alias(raw: &str) -> (&str, Option<&str>) {
    match raw.find('|') {
        Some(idx) => (&raw[..idx], Some(&raw[idx + 1..])),
        None => (raw, None),
    }
}

/// Returns true if `path` is `ancestor` itself or lies inside it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return false;
    }
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == FOLDER_SEPARATOR as u8)
}

/// Re-home `path` from `old` to `new`. Returns `None` when `path` is not
/// within `old`.
///
/// Example: `reparent("A/B/C", "A/B", "X")` → `Some("X/C")`
pub fn reparent(path: &str, old: &str, new: &str) -> Option<String> {
    if !is_within(path, old) {
        return None;
    }
    Some(format!("{}{}", new, &path[old.len()..]))
}

/// Last path component (the display name of a folder).
pub fn basename(path: &str) -> &str {
    path.rsplit(FOLDER_SEPARATOR).next().unwrap_or(path)
}
