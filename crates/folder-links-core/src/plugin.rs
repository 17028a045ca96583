//! Composition root.
//!
//! [`FolderLinksPlugin`] owns the folder service, the link index and every
//! surface, forwards host events to them and fans each new folder snapshot
//! out to all of them.

use crate::editor::{EditorRegistry, SharedEditorView};
use crate::error::Result;
use crate::events::{EntryKind, FolderRename, VaultEvent};
use crate::folder_service::FolderService;
use crate::graph::{GraphViewManager, NodeClick, SharedGraphView};
use crate::host::{FileExplorer, Notifier, RenamePrompt, SettingsStore, Translator, Vault};
use crate::leaf_watcher::{Leaf, LeafWatcher, PanelRegistry, GRAPH_VIEW, OUTGOING_LINK};
use crate::link_index::LinkIndex;
use crate::outgoing::{MutationKind, MutationOutcome, OutgoingLinksPanel};
use crate::rendered::{RenderedLink, RenderedViews, SharedFolderLinkView};
use crate::rename::{FolderLinkManager, RenameOutcome};
use crate::resolver::{activate, LinkAction};
use crate::settings::{PluginSettings, SettingsService};
use crate::snapshot::FolderSnapshot;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Notes are markdown files.
pub const NOTE_EXTENSION: &str = ".md";

/// Everything the host provides.
#[derive(Clone)]
pub struct HostServices {
    pub vault: Arc<dyn Vault>,
    pub explorer: Arc<dyn FileExplorer>,
    pub translator: Arc<dyn Translator>,
    pub prompt: Arc<dyn RenamePrompt>,
    pub notifier: Arc<dyn Notifier>,
    pub settings_store: Arc<dyn SettingsStore>,
}

/// A core panel instance the plugin hooks into.
#[derive(Clone)]
pub enum CorePanel {
    Graph(SharedGraphView),
    Outgoing(Arc<OutgoingLinksPanel>),
}

pub struct FolderLinksPlugin {
    host: HostServices,
    folders: Arc<FolderService>,
    index: Arc<LinkIndex>,
    settings: Arc<SettingsService>,
    editors: EditorRegistry,
    rendered: RenderedViews,
    graphs: Arc<GraphViewManager>,
    renames: Arc<FolderLinkManager>,
    panels: Mutex<PanelRegistry<CorePanel>>,
    active_file: Mutex<Option<String>>,
    event_rx: Mutex<Option<mpsc::Receiver<VaultEvent>>>,
    rename_rx: Mutex<Option<broadcast::Receiver<FolderRename>>>,
}

impl FolderLinksPlugin {
    pub fn new(host: HostServices, settings: PluginSettings) -> Self {
        let (folders, event_rx) = FolderService::new(host.vault.clone());
        let folders = Arc::new(folders);
        // Subscribe before any event can be queued.
        let rename_rx = folders.subscribe_renames();

        let index = Arc::new(LinkIndex::new());
        let settings = Arc::new(SettingsService::new(settings, host.settings_store.clone()));
        let graphs = Arc::new(GraphViewManager::new(
            folders.subscribe(),
            host.explorer.clone(),
            host.vault.clone(),
        ));
        let renames = Arc::new(FolderLinkManager::new(
            host.vault.clone(),
            index.clone(),
            settings.clone(),
            host.translator.clone(),
            host.prompt.clone(),
            host.notifier.clone(),
        ));

        let mut panels = PanelRegistry::new();
        let (on_add, on_remove, on_update) = (graphs.clone(), graphs.clone(), graphs.clone());
        panels.register(
            LeafWatcher::new(GRAPH_VIEW)
                .on_init(move |leaf: &Leaf<CorePanel>| {
                    if let CorePanel::Graph(view) = &leaf.view {
                        on_add.add_instance(view);
                    }
                })
                .on_cleanup(move |leaf| {
                    if let CorePanel::Graph(view) = &leaf.view {
                        on_remove.remove_instance(view);
                    }
                })
                .on_update(move |leaf| {
                    if let CorePanel::Graph(view) = &leaf.view {
                        on_update.add_instance(view);
                    }
                })
                .allow_multiple(true),
            Vec::new(),
        );
        let outgoing_folders = folders.subscribe();
        panels.register(
            LeafWatcher::new(OUTGOING_LINK).on_init(move |leaf: &Leaf<CorePanel>| {
                if let CorePanel::Outgoing(panel) = &leaf.view {
                    panel.update_folder_links(&outgoing_folders.borrow());
                }
            }),
            Vec::new(),
        );

        Self {
            editors: EditorRegistry::new(folders.subscribe()),
            rendered: RenderedViews::new(folders.subscribe()),
            host,
            folders,
            index,
            settings,
            graphs,
            renames,
            panels: Mutex::new(panels),
            active_file: Mutex::new(None),
            event_rx: Mutex::new(Some(event_rx)),
            rename_rx: Mutex::new(Some(rename_rx)),
        }
    }

    /// Spawn the background tasks: the folder reload worker, the rename
    /// handler and the surface broadcaster. Calling it twice only starts the
    /// broadcaster again.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(rx) = lock(&self.event_rx).take() {
            handles.push(tokio::spawn(self.folders.clone().run_worker(rx)));
        }
        if let Some(rx) = lock(&self.rename_rx).take() {
            handles.push(tokio::spawn(self.renames.clone().run(rx)));
        }
        let plugin = Arc::clone(self);
        handles.push(tokio::spawn(async move { plugin.run_surfaces().await }));
        tracing::info!("Folder links started");
        handles
    }

    async fn run_surfaces(self: Arc<Self>) {
        let mut rx = self.folders.subscribe();
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            self.broadcast(&snapshot);
        }
    }

    /// Push `snapshot` to every surface.
    pub fn broadcast(&self, snapshot: &Arc<FolderSnapshot>) {
        let editors = self.editors.broadcast(snapshot);
        let rendered = self.rendered.broadcast(snapshot);
        let graphs = self.graphs.update(snapshot);
        let mut outgoing = 0;
        for leaf in lock(&self.panels).instances(OUTGOING_LINK) {
            if let CorePanel::Outgoing(panel) = leaf.view {
                outgoing += panel.update_folder_links(snapshot);
            }
        }
        tracing::debug!(
            generation = snapshot.generation(),
            editors,
            rendered,
            graphs,
            outgoing,
            "Broadcast folder snapshot"
        );
    }

    pub fn folders(&self) -> Arc<FolderSnapshot> {
        self.folders.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FolderSnapshot>> {
        self.folders.subscribe()
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn index(&self) -> &LinkIndex {
        &self.index
    }

    /// Index every note the host reports.
    pub fn index_notes<'a>(&self, notes: impl IntoIterator<Item = &'a str>) -> Result<usize> {
        let mut indexed = 0;
        for note in notes {
            self.reindex_note(note)?;
            indexed += 1;
        }
        tracing::info!("Indexed {} note(s), {} with folder links", indexed, self.index.len());
        Ok(indexed)
    }

    /// Re-read one note and update its folder links in the index.
    pub fn reindex_note(&self, file: &str) -> Result<()> {
        let content = self.host.vault.read(file)?;
        self.index.index_document(file, &content);
        Ok(())
    }

    /// Feed a vault create/rename/delete into the pipeline.
    pub fn on_vault_event(&self, event: VaultEvent) -> Result<()> {
        match &event {
            VaultEvent::Create {
                path,
                kind: EntryKind::File,
            } if is_note(path) => self.reindex_note(path)?,
            VaultEvent::Rename {
                path,
                old_path,
                kind: EntryKind::File,
            } => {
                self.index.rename_document(old_path, path);
                let mut active = lock(&self.active_file);
                if active.as_deref() == Some(old_path.as_str()) {
                    *active = Some(path.clone());
                }
            }
            VaultEvent::Delete {
                path,
                kind: EntryKind::File,
            } => self.index.remove_document(path),
            _ => {}
        }
        self.folders.notify(event);
        Ok(())
    }

    /// Propagate a folder rename right away instead of through the
    /// background handler, then reload the folder set.
    pub fn apply_folder_rename(&self, rename: FolderRename) -> Result<RenameOutcome> {
        let outcome = self.renames.on_folder_rename(rename)?;
        self.folders.refresh();
        Ok(outcome)
    }

    /// A note's content changed.
    pub fn on_note_modified(&self, file: &str) -> Result<()> {
        if is_note(file) {
            self.reindex_note(file)?;
        }
        Ok(())
    }

    /// The host opened `file` (or closed the last one). Editor views may
    /// not be ready yet, so this retries before giving up.
    pub async fn on_file_open(&self, file: Option<&str>) -> Result<()> {
        *lock(&self.active_file) = file.map(str::to_string);
        self.editors.on_file_open().await
    }

    /// Number of distinct folder links in the active note, if one is open.
    pub fn folder_links_in_active_file(&self) -> Option<usize> {
        let active = lock(&self.active_file).clone()?;
        Some(self.index.folder_links_in(&active))
    }

    pub fn register_editor(&self, view: &SharedEditorView) -> bool {
        self.editors.register(view)
    }

    pub fn post_process(&self, elements: Vec<RenderedLink>) -> Option<SharedFolderLinkView> {
        self.rendered.post_process(elements)
    }

    /// A new outgoing-links panel bound to the folder snapshot.
    pub fn create_outgoing_panel(&self) -> Arc<OutgoingLinksPanel> {
        Arc::new(OutgoingLinksPanel::new(
            self.folders.subscribe(),
            self.host.translator.clone(),
        ))
    }

    pub fn on_outgoing_mutation(
        &self,
        panel: &Arc<OutgoingLinksPanel>,
        mutations: &[MutationKind],
    ) -> MutationOutcome {
        panel.on_mutation(mutations, &self.settings.get())
    }

    /// Reconcile tracked panels with the leaves the host has open.
    pub fn on_active_leaf_change(
        &self,
        leaves_of_kind: impl Fn(&str) -> Vec<Leaf<CorePanel>>,
    ) -> Result<()> {
        lock(&self.panels).on_active_leaf_change(leaves_of_kind)
    }

    /// Click on any element carrying a folder link.
    pub fn on_link_click(&self, folder_link: &str) -> Result<LinkAction> {
        activate(
            folder_link,
            &self.folders.current(),
            &*self.host.explorer,
            &*self.host.vault,
        )
    }

    pub fn on_graph_node_click(&self, view: &SharedGraphView, id: &str) -> Result<NodeClick> {
        self.graphs.on_node_click(view, id)
    }

    pub fn set_show_in_outgoing_links(&self, show: bool) -> Result<()> {
        self.settings.set_show_in_outgoing_links(show)?;
        let snapshot = self.folders.current();
        for leaf in lock(&self.panels).instances(OUTGOING_LINK) {
            if let CorePanel::Outgoing(panel) = leaf.view {
                if show {
                    panel.update_folder_links(&snapshot);
                } else {
                    panel.remove_folder_links();
                }
            }
        }
        Ok(())
    }

    pub fn set_always_update(&self, value: bool) -> Result<()> {
        self.settings.set_always_update(value)
    }

    /// Let go of every tracked panel and forget indexed notes.
    pub fn unload(&self) {
        lock(&self.panels).on_active_leaf_change(|_| Vec::new()).ok();
        self.index.clear();
        tracing::info!("Folder links unloaded");
    }
}

fn is_note(path: &str) -> bool {
    path.ends_with(NOTE_EXTENSION)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
