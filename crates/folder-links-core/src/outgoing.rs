//! Outgoing-links panel.
//!
//! The host lists every link of the active note in this panel, folder links
//! included. Items ending in `/` get a folder-aware tooltip and icon, or are
//! removed entirely when the user turned them off.

use crate::host::Translator;
use crate::path::{folder_path_from_link, is_folder_link};
use crate::resolver::{resolve_path, LinkState};
use crate::settings::PluginSettings;
use crate::snapshot::FolderSnapshot;
use crate::translation::{NOT_CREATED, REVEAL_FILE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;

pub const OUTGOING_DEBOUNCE: Duration = Duration::from_millis(100);
pub const RESOLVED_ICON: &str = "link";
pub const UNRESOLVED_ICON: &str = "folder-plus";
pub const FOLDER_LINK_ATTRIBUTE: &str = "data-folder-link";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutgoingLinkItem {
    pub text: String,
    pub data_folder_link: Option<String>,
    pub aria_label: Option<String>,
    pub icon: Option<String>,
}

impl OutgoingLinkItem {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn is_folder_link(&self) -> bool {
        is_folder_link(&self.text)
    }
}

/// A change the host observed in the panel's element tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    CharacterData,
    Attribute(String),
}

impl MutationKind {
    pub fn is_relevant(&self) -> bool {
        match self {
            MutationKind::ChildList | MutationKind::CharacterData => true,
            MutationKind::Attribute(name) => name == FOLDER_LINK_ATTRIBUTE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    Ignored,
    Reentrant,
    Removed(usize),
    Scheduled,
}

pub struct OutgoingLinksPanel {
    items: Mutex<Vec<OutgoingLinkItem>>,
    folders: watch::Receiver<Arc<FolderSnapshot>>,
    translator: Arc<dyn Translator>,
    updating: AtomicBool,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl OutgoingLinksPanel {
    pub fn new(
        folders: watch::Receiver<Arc<FolderSnapshot>>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            folders,
            translator,
            updating: AtomicBool::new(false),
            pending: Mutex::new(None),
        }
    }

    /// The host re-rendered the list.
    pub fn set_items(&self, items: Vec<OutgoingLinkItem>) {
        *self.items.lock().unwrap_or_else(|e| e.into_inner()) = items;
    }

    pub fn items(&self) -> Vec<OutgoingLinkItem> {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// React to a batch of mutations. Must be called from within a tokio
    /// runtime, since updates are debounced on a spawned task.
    pub fn on_mutation(
        self: &Arc<Self>,
        mutations: &[MutationKind],
        settings: &PluginSettings,
    ) -> MutationOutcome {
        if !mutations.iter().any(MutationKind::is_relevant) {
            return MutationOutcome::Ignored;
        }
        if self
            .updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return MutationOutcome::Reentrant;
        }

        let outcome = if settings.show_in_outgoing_links {
            self.schedule_update();
            MutationOutcome::Scheduled
        } else {
            MutationOutcome::Removed(self.remove_folder_links())
        };

        self.updating.store(false, Ordering::Release);
        outcome
    }

    fn schedule_update(self: &Arc<Self>) {
        let panel = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(OUTGOING_DEBOUNCE).await;
            let snapshot = panel.folders.borrow().clone();
            let changed = panel.update_folder_links(&snapshot);
            tracing::debug!("Outgoing links panel updated: {} field(s) changed", changed);
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Drop every folder item. Returns how many were removed.
    pub fn remove_folder_links(&self) -> usize {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let before = items.len();
        items.retain(|item| !item.is_folder_link());
        before - items.len()
    }

    /// Bring folder items in line with `snapshot`. Only fields whose value
    /// differs are written; returns the number of writes.
    pub fn update_folder_links(&self, snapshot: &FolderSnapshot) -> usize {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let mut changed = 0;

        for item in items.iter_mut().filter(|item| item.is_folder_link()) {
            let state = resolve_path(&folder_path_from_link(&item.text), snapshot).state();
            let (label_key, icon) = match state {
                LinkState::Resolved => (REVEAL_FILE, RESOLVED_ICON),
                LinkState::Unresolved => (NOT_CREATED, UNRESOLVED_ICON),
            };
            let label = self.translator.translate(label_key, &[]);

            changed += set_if_changed(&mut item.data_folder_link, &item.text);
            changed += set_if_changed(&mut item.aria_label, &label);
            changed += set_if_changed(&mut item.icon, icon);
        }
        changed
    }
}

fn set_if_changed(field: &mut Option<String>, value: &str) -> usize {
    if field.as_deref() == Some(value) {
        0
    } else {
        *field = Some(value.to_string());
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::EnglishTranslator;

    type Sender = watch::Sender<Arc<FolderSnapshot>>;

    fn panel(folders: &[&str]) -> (Arc<OutgoingLinksPanel>, Sender) {
        let (tx, rx) =
            watch::channel(FolderSnapshot::from_paths(0, folders.iter().copied()).shared());
        let panel = Arc::new(OutgoingLinksPanel::new(rx, Arc::new(EnglishTranslator)));
        panel.set_items(vec![
            OutgoingLinkItem::new("Projects/"),
            OutgoingLinkItem::new("Archive/"),
            OutgoingLinkItem::new("Some note"),
        ]);
        (panel, tx)
    }

    #[test]
    fn relevant_mutations() {
        assert!(MutationKind::ChildList.is_relevant());
        assert!(MutationKind::CharacterData.is_relevant());
        assert!(MutationKind::Attribute("data-folder-link".into()).is_relevant());
        assert!(!MutationKind::Attribute("class".into()).is_relevant());
    }

    #[test]
    fn update_labels_resolved_and_unresolved_items() {
        let (panel, _tx) = panel(&["Projects"]);
        let snapshot = FolderSnapshot::from_paths(0, ["Projects"]);
        panel.update_folder_links(&snapshot);

        let items = panel.items();
        assert_eq!(items[0].icon.as_deref(), Some("link"));
        assert_eq!(items[0].aria_label.as_deref(), Some("Reveal file in navigation"));
        assert_eq!(items[0].data_folder_link.as_deref(), Some("Projects/"));
        assert_eq!(items[1].icon.as_deref(), Some("folder-plus"));
        assert_eq!(
            items[1].aria_label.as_deref(),
            Some("Not created yet. Click to create.")
        );
        assert_eq!(items[2], OutgoingLinkItem::new("Some note"));
    }

    #[test]
    fn update_is_idempotent() {
        let (panel, _tx) = panel(&[]);
        let snapshot = FolderSnapshot::from_paths(0, ["Projects"]);
        assert_eq!(panel.update_folder_links(&snapshot), 6);
        assert_eq!(panel.update_folder_links(&snapshot), 0);

        let snapshot = FolderSnapshot::from_paths(1, ["Projects", "Archive"]);
        assert_eq!(panel.update_folder_links(&snapshot), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn irrelevant_mutation_is_ignored() {
        let (panel, _tx) = panel(&[]);
        let outcome = panel.on_mutation(
            &[MutationKind::Attribute("style".into())],
            &PluginSettings::default(),
        );
        assert_eq!(outcome, MutationOutcome::Ignored);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_setting_removes_folder_items() {
        let (panel, _tx) = panel(&[]);
        let settings = PluginSettings {
            show_in_outgoing_links: false,
            ..Default::default()
        };
        let outcome = panel.on_mutation(&[MutationKind::ChildList], &settings);
        assert_eq!(outcome, MutationOutcome::Removed(2));
        assert_eq!(panel.items(), vec![OutgoingLinkItem::new("Some note")]);
    }

    #[tokio::test(start_paused = true)]
    async fn reentrant_call_is_rejected() {
        let (panel, _tx) = panel(&[]);
        panel.updating.store(true, Ordering::Release);
        let outcome = panel.on_mutation(&[MutationKind::ChildList], &PluginSettings::default());
        assert_eq!(outcome, MutationOutcome::Reentrant);
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_are_debounced() {
        let (panel, _tx) = panel(&["Projects"]);
        let settings = PluginSettings::default();

        for _ in 0..3 {
            assert_eq!(
                panel.on_mutation(&[MutationKind::ChildList], &settings),
                MutationOutcome::Scheduled
            );
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        assert!(panel.items()[0].icon.is_none(), "should still be waiting");

        tokio::time::sleep(OUTGOING_DEBOUNCE).await;
        assert_eq!(panel.items()[0].icon.as_deref(), Some("link"));
    }
}
