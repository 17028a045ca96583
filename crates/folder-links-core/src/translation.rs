use crate::host::Translator;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const REVEAL_FILE: &str = "plugins.file-explorer.action-reveal-file";
pub const NOT_CREATED: &str = "plugins.outgoing-links.tooltip-not-created";
pub const CONFIRM_UPDATE_LINK: &str = "dialogue.label-confirm-update-link-to-file";
pub const LINKS_AFFECTED: &str = "dialogue.label-link-affected";
pub const UPDATE_LINKS_TITLE: &str = "dialogue.label-update-links";
pub const UPDATED_LINKS: &str = "dialogue.msg-updated-links";
pub const LINK_COUNT: &str = "nouns.link-with-count_plural";
pub const FILE_COUNT: &str = "nouns.file-with-count_plural";
pub const NOUN_FILE: &str = "plugins.bases.label-file-prop-file";
pub const NOUN_FOLDER: &str = "plugins.bases.label-file-prop-folder";

static ENGLISH: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        (REVEAL_FILE, "Reveal file in navigation"),
        (NOT_CREATED, "Not created yet. Click to create."),
        (CONFIRM_UPDATE_LINK, "Do you want to update links to this file?"),
        (LINKS_AFFECTED, "{{links}} in {{files}} will be affected."),
        (UPDATE_LINKS_TITLE, "Update links"),
        (UPDATED_LINKS, "Updated {{links}} in {{files}}."),
        (LINK_COUNT, "{{count}} links"),
        (FILE_COUNT, "{{count}} files"),
        (NOUN_FILE, "file"),
        (NOUN_FOLDER, "folder"),
    ])
});

/// Built-in English strings, used when the host offers no lookup of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnglishTranslator;

impl Translator for EnglishTranslator {
    fn translate(&self, key: &str, placeholders: &[(&str, String)]) -> String {
        let template = ENGLISH.get(key).copied().unwrap_or(key);
        interpolate(template, placeholders)
    }
}

/// Replace every `{{name}}` in `template`. Unknown placeholders stay as-is.
pub fn interpolate(template: &str, placeholders: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (name, value) in placeholders {
        out = out.replace(&format!("{{{{{}}}}}", name), value);
    }
    out
}

/// "N links in M files", as used by the rename prompt and notice.
pub fn links_in_files(
    translator: &dyn Translator,
    key: &str,
    links: usize,
    files: usize,
) -> String {
    translator.translate(
        key,
        &[
            ("links", translator.translate(LINK_COUNT, &[("count", links.to_string())])),
            ("files", translator.translate(FILE_COUNT, &[("count", files.to_string())])),
        ],
    )
}
