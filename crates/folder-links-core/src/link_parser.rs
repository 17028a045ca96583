
use crate::events::FolderRename;
use crate::path::{folder_link_from_path, folder_path_from_link, is_folder_link, is_within, reparent, split_alias};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static WIKILINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]]+)\]\]").unwrap()
});

static FENCED_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[^\n]*\n.*?```|~~~[^\n]*\n.*?~~~").unwrap()
});

static INLINE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"`[^`]*`").unwrap()
});

/// A folder link found in markdown text.
///
/// All offsets are byte offsets into the source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderLinkOccurrence {
    /// Target exactly as written, e.g. " Projects/ " from `[[ Projects/ |p]]`
    pub raw_target: String,
    /// Display text after `|`, if any
    pub alias: Option<String>,
    /// Normalized folder path, e.g. "Projects"
    pub folder_path: String,
    /// Start of `[[`
    pub start: usize,
    /// End of `]]` (exclusive)
    pub end: usize,
    /// Start of the raw target (right after `[[`)
    pub target_start: usize,
    /// Byte length of the raw target
    pub target_len: usize,
    /// 1-based line number of `[[`
    pub line: usize,
}

impl FolderLinkOccurrence {
    /// Link key as used by the link index, e.g. "Projects/"
    pub fn key(&self) -> String {
        folder_link_from_path(&self.folder_path)
    }

    /// Text a reader sees when the link is rendered.
    pub fn display_text(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.raw_target)
    }
}

/// Build a set of byte ranges that are inside code blocks or inline code.
fn build_excluded_ranges(markdown: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    for m in FENCED_CODE_RE.find_iter(markdown) {
        ranges.push((m.start(), m.end()));
    }
    for m in INLINE_CODE_RE.find_iter(markdown) {
        ranges.push((m.start(), m.end()));
    }
    ranges
}

/// Returns true if the byte offset falls within any excluded range.
fn is_excluded(offset: usize, excluded: &[(usize, usize)]) -> bool {
    excluded.iter().any(|&(start, end)| offset >= start && offset < end)
}

/// Extract every folder link with its position. Links in fenced code blocks
/// and inline code are skipped.
pub fn extract_folder_links(markdown: &str) -> Vec<FolderLinkOccurrence> {
    let excluded = build_excluded_ranges(markdown);
    let mut occurrences = Vec::new();
    let mut line = 1;
    let mut line_scan_pos = 0;

    for cap in WIKILINK_RE.captures_iter(markdown) {
        let (Some(full_match), Some(content_match)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        if is_excluded(full_match.start(), &excluded) {
            continue;
        }

        let (raw_target, alias) = split_alias(content_match.as_str());
        if !is_folder_link(raw_target) {
            continue;
        }

        line += markdown[line_scan_pos..full_match.start()].matches('\n').count();
        line_scan_pos = full_match.start();

        occurrences.push(FolderLinkOccurrence {
            raw_target: raw_target.to_string(),
            alias: alias.map(str::to_string),
            folder_path: folder_path_from_link(raw_target),
            start: full_match.start(),
            end: full_match.end(),
            target_start: content_match.start(),
            target_len: raw_target.len(),
            line,
        });
    }

    occurrences
}

/// Count folder links per canonical key (`"Projects/"` → 2).
pub fn count_folder_links(markdown: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for occ in extract_folder_links(markdown) {
        *counts.entry(occ.key()).or_insert(0) += 1;
    }
    counts
}

/// Replace `remove_len` bytes at `offset` with `insert_text`.
#[derive(Debug, PartialEq, Eq)]
pub struct TextEdit {
    pub offset: usize,
    pub remove_len: usize,
    pub insert_text: String,
}

/// Pick the rename responsible for `folder_path`: the one with the longest
/// `old_path` that contains it.
pub fn most_specific_rename<'a>(
    folder_path: &str,
    renames: &'a [FolderRename],
) -> Option<&'a FolderRename> {
    renames
        .iter()
        .filter(|r| is_within(folder_path, &r.old_path))
        .max_by_key(|r| r.old_path.len())
}

/// Compute edits that move folder links affected by `renames` to their new
/// location. The folder itself and everything nested inside it are rewritten;
/// whitespace inside the brackets and any alias are preserved.
/// Edits come back in descending offset order.
pub fn compute_folder_rename_edits(markdown: &str, renames: &[FolderRename]) -> Vec<TextEdit> {
    let mut edits: Vec<TextEdit> = extract_folder_links(markdown)
        .into_iter()
        .filter_map(|occ| {
            let rename = most_specific_rename(&occ.folder_path, renames)?;
            let new_path = reparent(&occ.folder_path, &rename.old_path, &rename.new_path)?;
            if new_path == occ.folder_path {
                return None;
            }

            // Only the trimmed target is replaced so surrounding whitespace survives
            let leading_ws = occ.raw_target.len() - occ.raw_target.trim_start().len();
            Some(TextEdit {
                offset: occ.target_start + leading_ws,
                remove_len: occ.raw_target.trim().len(),
                insert_text: folder_link_from_path(&new_path),
            })
        })
        .collect();

    // Back to front, so earlier offsets stay valid.
    edits.sort_by(|a, b| b.offset.cmp(&a.offset));

    edits
}

/// Apply edits produced by `compute_folder_rename_edits` (reverse offset order).
pub fn apply_edits(text: &mut String, edits: &[TextEdit]) {
    for edit in edits {
        text.replace_range(edit.offset..edit.offset + edit.remove_len, &edit.insert_text);
    }
}
