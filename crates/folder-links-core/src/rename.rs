//! Folder rename propagation.
//!
//! When a folder moves, every note that links to it (or to a folder inside
//! it) is rewritten so the links follow. Depending on the `always_update`
//! setting the user is asked first.

use crate::error::{FolderLinksError, Result};
use crate::events::FolderRename;
use crate::host::{Notifier, RenameChoice, RenamePrompt, RenamePromptRequest, Translator, Vault};
use crate::link_index::LinkIndex;
use crate::link_parser::{apply_edits, compute_folder_rename_edits, most_specific_rename};
use crate::path::{folder_path_from_link, is_within, reparent};
use crate::settings::SettingsService;
use crate::translation::{
    links_in_files, CONFIRM_UPDATE_LINK, LINKS_AFFECTED, NOUN_FILE, NOUN_FOLDER,
    UPDATED_LINKS, UPDATE_LINKS_TITLE,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;

/// Renames arriving within this window of each other are handled together.
pub const RENAME_BATCH_WINDOW: Duration = Duration::from_millis(20);

/// Renames that belong to one user action.
///
/// Moving a folder makes the host report every sub-folder as renamed too.
/// Those follow from the parent's rename and are dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenameBatch {
    renames: Vec<FolderRename>,
}

impl RenameBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rename. Returns false if it is implied by one already present.
    pub fn push(&mut self, rename: FolderRename) -> bool {
        if rename.old_path.is_empty() || rename.old_path == rename.new_path {
            return false;
        }
        if self.renames.iter().any(|r| implies(r, &rename)) {
            tracing::debug!("Dropping implied rename {} -> {}", rename.old_path, rename.new_path);
            return false;
        }
        self.renames.retain(|r| !implies(&rename, r));
        self.renames.push(rename);
        true
    }

    pub fn renames(&self) -> &[FolderRename] {
        &self.renames
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }
}

impl FromIterator<FolderRename> for RenameBatch {
    fn from_iter<I: IntoIterator<Item = FolderRename>>(iter: I) -> Self {
        let mut batch = RenameBatch::new();
        for rename in iter {
            batch.push(rename);
        }
        batch
    }
}

/// True if `child` is exactly what `parent` does to a folder inside it.
fn implies(parent: &FolderRename, child: &FolderRename) -> bool {
    parent.old_path != child.old_path
        && is_within(&child.old_path, &parent.old_path)
        && reparent(&child.old_path, &parent.old_path, &parent.new_path).as_deref()
            == Some(child.new_path.as_str())
}

/// Files and link totals affected by a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AffectedLinks {
    pub files: Vec<String>,
    pub links: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenameOutcome {
    /// No note links into the renamed folders.
    NoLinks,
    /// The user chose not to update.
    Declined,
    Updated(RewriteReport),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub links: usize,
    pub files: usize,
    /// Files whose content actually changed.
    pub written: Vec<String>,
}

pub struct FolderLinkManager {
    vault: Arc<dyn Vault>,
    index: Arc<LinkIndex>,
    settings: Arc<SettingsService>,
    translator: Arc<dyn Translator>,
    prompt: Arc<dyn RenamePrompt>,
    notifier: Arc<dyn Notifier>,
}

impl FolderLinkManager {
    pub fn new(
        vault: Arc<dyn Vault>,
        index: Arc<LinkIndex>,
        settings: Arc<SettingsService>,
        translator: Arc<dyn Translator>,
        prompt: Arc<dyn RenamePrompt>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            vault,
            index,
            settings,
            translator,
            prompt,
            notifier,
        }
    }

    /// Files linking into any renamed folder, and how many links they hold.
    pub fn affected_links(&self, renames: &[FolderRename]) -> AffectedLinks {
        let mut files = BTreeSet::new();
        let mut links = 0;
        for (file, key, count) in self.index.entries() {
            if most_specific_rename(&folder_path_from_link(&key), renames).is_some() {
                files.insert(file);
                links += count;
            }
        }
        AffectedLinks {
            files: files.into_iter().collect(),
            links,
        }
    }

    pub fn on_folder_rename(&self, rename: FolderRename) -> Result<RenameOutcome> {
        self.handle_batch(&RenameBatch::from_iter([rename]))
    }

    pub fn handle_batch(&self, batch: &RenameBatch) -> Result<RenameOutcome> {
        let Some(primary) = batch.renames().first() else {
            return Ok(RenameOutcome::NoLinks);
        };

        // Notes inside a moved folder moved with it.
        let moved = self.index.rehome_documents(batch.renames());
        if moved > 0 {
            tracing::debug!("{} note(s) moved with {}", moved, primary.old_path);
        }

        let affected = self.affected_links(batch.renames());
        if affected.files.is_empty() {
            tracing::debug!("No links to {} need updating", primary.old_path);
            return Ok(RenameOutcome::NoLinks);
        }

        let choice = if self.settings.get().always_update {
            RenameChoice::JustOnce
        } else {
            self.prompt.ask(&self.prompt_request(primary, &affected))
        };
        tracing::info!(
            "Folder {} renamed to {}: {} link(s) in {} file(s), {:?}",
            primary.old_path,
            primary.new_path,
            affected.links,
            affected.files.len(),
            choice
        );

        match choice {
            RenameChoice::DoNotUpdate => Ok(RenameOutcome::Declined),
            RenameChoice::JustOnce => {
                let report = self.rewrite_files(&affected, batch.renames())?;
                Ok(RenameOutcome::Updated(report))
            }
            RenameChoice::AlwaysUpdate => {
                let report = self.rewrite_files(&affected, batch.renames())?;
                self.settings.set_always_update(true)?;
                Ok(RenameOutcome::Updated(report))
            }
        }
    }

    fn prompt_request(&self, rename: &FolderRename, affected: &AffectedLinks) -> RenamePromptRequest {
        let t = &*self.translator;
        // The host only ships a "file" wording for this question.
        let confirm = t.translate(CONFIRM_UPDATE_LINK, &[]).replacen(
            &t.translate(NOUN_FILE, &[]),
            &t.translate(NOUN_FOLDER, &[]),
            1,
        );
        RenamePromptRequest {
            title: t.translate(UPDATE_LINKS_TITLE, &[]),
            body: vec![
                confirm,
                links_in_files(t, LINKS_AFFECTED, affected.links, affected.files.len()),
            ],
            old_path: rename.old_path.clone(),
            new_path: rename.new_path.clone(),
            links: affected.links,
            files: affected.files.len(),
        }
    }

    /// Rewrite folder links in `affected.files`, then post one notice.
    pub fn rewrite_files(
        &self,
        affected: &AffectedLinks,
        renames: &[FolderRename],
    ) -> Result<RewriteReport> {
        let mut written = Vec::new();
        for file in &affected.files {
            let failed = |e: FolderLinksError| FolderLinksError::RewriteFailed {
                file: file.clone(),
                reason: e.to_string(),
            };

            let mut content = self.vault.read(file).map_err(failed)?;
            let edits = compute_folder_rename_edits(&content, renames);
            if edits.is_empty() {
                continue;
            }
            apply_edits(&mut content, &edits);
            self.vault.write(file, &content).map_err(failed)?;
            self.index.index_document(file, &content);
            tracing::debug!("Rewrote {} link(s) in {}", edits.len(), file);
            written.push(file.clone());
        }

        let message = links_in_files(
            &*self.translator,
            UPDATED_LINKS,
            affected.links,
            affected.files.len(),
        );
        self.notifier.notice(&message);
        tracing::info!("{}", message);

        Ok(RewriteReport {
            links: affected.links,
            files: affected.files.len(),
            written,
        })
    }

    /// Handle folder renames until the folder service goes away. Renames
    /// that arrive close together form one batch.
    pub async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<FolderRename>) {
        loop {
            let first = match rx.recv().await {
                Ok(rename) => rename,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Missed {} folder rename(s)", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let mut batch = RenameBatch::new();
            batch.push(first);
            while let Ok(Ok(rename)) = tokio::time::timeout(RENAME_BATCH_WINDOW, rx.recv()).await {
                batch.push(rename);
            }

            let manager = Arc::clone(&self);
            let result = tokio::task::spawn_blocking(move || manager.handle_batch(&batch)).await;
            match result {
                Ok(Ok(outcome)) => tracing::debug!("Rename handled: {:?}", outcome),
                Ok(Err(e)) => {
                    tracing::error!("{}", e);
                    self.notifier.notice(&e.user_message());
                }
                Err(e) => tracing::error!("Rename task failed: {}", e),
            }
        }
        tracing::info!("Rename handler stopped");
    }
}
