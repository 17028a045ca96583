//! Live editor surface.
//!
//! Each editor view keeps its own copy of the folder snapshot
//! ([`EditorFolderState`]) and decorates the folder links in its visible
//! ranges. The [`EditorRegistry`] pushes new snapshots into every open view.

use crate::error::{FolderLinksError, Result};
use crate::link_parser::{extract_folder_links, FolderLinkOccurrence};
use crate::resolver::{resolve_path, LinkState, FOLDER_LINK_CLASS};
use crate::snapshot::FolderSnapshot;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tokio::time::Duration;

const FILE_OPEN_RETRIES: usize = 10;
const FILE_OPEN_RETRY_DELAY: Duration = Duration::from_millis(20);

// ---------------------------------------------------------------------------
// Per-view folder state
// ---------------------------------------------------------------------------

/// The folder snapshot as seen by one editor view.
#[derive(Clone, Debug)]
pub struct EditorFolderState {
    snapshot: Arc<FolderSnapshot>,
}

impl EditorFolderState {
    /// Start from the current global value so a view opened after the first
    /// publish is never empty.
    pub fn new(current: Arc<FolderSnapshot>) -> Self {
        Self { snapshot: current }
    }

    /// Accept `snapshot` only if it is newer. Returns true if the state changed.
    pub fn apply(&mut self, snapshot: &Arc<FolderSnapshot>) -> bool {
        if Arc::ptr_eq(&self.snapshot, snapshot) {
            return false;
        }
        if snapshot.generation() < self.snapshot.generation() {
            tracing::debug!(
                "Dropping stale folder snapshot {} (have {})",
                snapshot.generation(),
                self.snapshot.generation()
            );
            return false;
        }
        if snapshot.generation() == self.snapshot.generation()
            && snapshot.same_folders(&self.snapshot)
        {
            return false;
        }
        self.snapshot = snapshot.clone();
        true
    }

    pub fn snapshot(&self) -> &Arc<FolderSnapshot> {
        &self.snapshot
    }
}

// ---------------------------------------------------------------------------
// Decorations
// ---------------------------------------------------------------------------

/// Mark decoration over a folder link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoration {
    pub range: Range<usize>,
    pub state: LinkState,
    /// e.g. "is-resolved folder-link"
    pub class: String,
    /// The raw target, written to `data-folder-link` for the click handler
    pub data_folder_link: String,
}

/// Replacement widget shown in place of a folder link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderLinkWidget {
    pub range: Range<usize>,
    pub state: LinkState,
    pub text: String,
    pub href: String,
    pub line: usize,
}

/// What changed in a view since the last update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewUpdate {
    pub doc_changed: bool,
    pub viewport_changed: bool,
    pub selection_changed: bool,
    pub folders_changed: bool,
}

/// Keeps a view's decorations current, rebuilding only when needed.
#[derive(Debug, Default)]
pub struct FolderLinkDecorator {
    decorations: Vec<Decoration>,
    widgets: Vec<FolderLinkWidget>,
    builds: usize,
}

impl FolderLinkDecorator {
    pub fn update(&mut self, view: &EditorView, update: ViewUpdate) {
        if update.doc_changed || update.viewport_changed || update.folders_changed {
            self.decorations = view.build_decorations();
            self.builds += 1;
        }
        // Widget text depends on the cursor line as well.
        if update.doc_changed
            || update.viewport_changed
            || update.folders_changed
            || update.selection_changed
        {
            self.widgets = view.build_widgets();
        }
    }

    pub fn decorations(&self) -> &[Decoration] {
        &self.decorations
    }

    pub fn widgets(&self) -> &[FolderLinkWidget] {
        &self.widgets
    }

    /// Number of decoration rebuilds so far.
    pub fn builds(&self) -> usize {
        self.builds
    }
}

// ---------------------------------------------------------------------------
// Editor view
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// One editor pane: document text, viewport, cursor, and its folder state.
#[derive(Debug)]
pub struct EditorView {
    id: ViewId,
    text: String,
    visible: Vec<Range<usize>>,
    cursor: usize,
    connected: bool,
    /// None until the host has installed the folder state on this view.
    state: Option<EditorFolderState>,
    decorator: FolderLinkDecorator,
}

impl EditorView {
    /// A view whose whole document is visible.
    pub fn new(id: ViewId, text: impl Into<String>) -> Self {
        let text = text.into();
        let visible = vec![0..text.len()];
        Self {
            id,
            text,
            visible,
            cursor: 0,
            connected: true,
            state: None,
            decorator: FolderLinkDecorator::default(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    pub fn folder_state(&self) -> Option<&EditorFolderState> {
        self.state.as_ref()
    }

    /// Install the folder state field, seeded from the current snapshot.
    pub fn install_state(&mut self, current: Arc<FolderSnapshot>) {
        if self.state.is_none() {
            self.state = Some(EditorFolderState::new(current));
            self.refresh(ViewUpdate {
                folders_changed: true,
                ..Default::default()
            });
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.visible = vec![0..self.text.len()];
        self.cursor = self.cursor.min(self.text.len());
        self.refresh(ViewUpdate {
            doc_changed: true,
            ..Default::default()
        });
    }

    pub fn set_visible_ranges(&mut self, ranges: Vec<Range<usize>>) {
        self.visible = ranges;
        self.refresh(ViewUpdate {
            viewport_changed: true,
            ..Default::default()
        });
    }

    pub fn set_cursor(&mut self, offset: usize) {
        self.cursor = offset.min(self.text.len());
        self.refresh(ViewUpdate {
            selection_changed: true,
            ..Default::default()
        });
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Deliver a folder snapshot. Returns true if the view re-rendered.
    pub fn dispatch_folders(&mut self, snapshot: &Arc<FolderSnapshot>) -> Result<bool> {
        let state = self
            .state
            .as_mut()
            .ok_or(FolderLinksError::EditorStateUnavailable)?;
        if !state.apply(snapshot) {
            return Ok(false);
        }
        self.refresh(ViewUpdate {
            folders_changed: true,
            ..Default::default()
        });
        Ok(true)
    }

    pub fn decorations(&self) -> &[Decoration] {
        self.decorator.decorations()
    }

    pub fn widgets(&self) -> &[FolderLinkWidget] {
        self.decorator.widgets()
    }

    pub fn decoration_builds(&self) -> usize {
        self.decorator.builds()
    }

    fn refresh(&mut self, update: ViewUpdate) {
        let mut decorator = std::mem::take(&mut self.decorator);
        decorator.update(self, update);
        self.decorator = decorator;
    }

    /// 1-based line of the cursor.
    pub fn cursor_line(&self) -> usize {
        let before = self.text.get(..self.cursor).unwrap_or(&self.text);
        before.matches('\n').count() + 1
    }

    /// Folder links that overlap a visible range, each reported once.
    fn visible_links(&self) -> Vec<FolderLinkOccurrence> {
        let mut seen = HashSet::new();
        extract_folder_links(&self.text)
            .into_iter()
            .filter(|occ| {
                self.visible
                    .iter()
                    .any(|r| occ.start < r.end && occ.end > r.start)
            })
            .filter(|occ| seen.insert(occ.start))
            .collect()
    }

    fn link_state(&self, occ: &FolderLinkOccurrence) -> LinkState {
        match &self.state {
            Some(state) => resolve_path(&occ.folder_path, state.snapshot()).state(),
            None => LinkState::Unresolved,
        }
    }

    pub fn build_decorations(&self) -> Vec<Decoration> {
        self.visible_links()
            .into_iter()
            .map(|occ| {
                let state = self.link_state(&occ);
                Decoration {
                    range: occ.start..occ.end,
                    state,
                    class: format!("{} {}", state.class(), FOLDER_LINK_CLASS),
                    data_folder_link: occ.raw_target.clone(),
                }
            })
            .collect()
    }

    pub fn build_widgets(&self) -> Vec<FolderLinkWidget> {
        let cursor_line = self.cursor_line();
        self.visible_links()
            .into_iter()
            .map(|occ| {
                let state = self.link_state(&occ);
                // On the active line an aliased link shows its full source text.
                let text = match &occ.alias {
                    Some(alias) if occ.line == cursor_line => {
                        format!("{}|{}", occ.raw_target, alias)
                    }
                    _ => occ.display_text().to_string(),
                };
                FolderLinkWidget {
                    range: occ.start..occ.end,
                    state,
                    text,
                    href: occ.raw_target.clone(),
                    line: occ.line,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub type SharedEditorView = Arc<Mutex<EditorView>>;

/// Tracks open editor views and pushes folder snapshots into them.
///
/// Views are held weakly: a closed view disappears on the next broadcast
/// without explicit unregistration.
pub struct EditorRegistry {
    folders: watch::Receiver<Arc<FolderSnapshot>>,
    views: Mutex<Vec<(ViewId, Weak<Mutex<EditorView>>)>>,
}

impl EditorRegistry {
    pub fn new(folders: watch::Receiver<Arc<FolderSnapshot>>) -> Self {
        Self {
            folders,
            views: Mutex::new(Vec::new()),
        }
    }

    /// Register a view once; later calls for the same view are ignored.
    /// Returns true on first registration.
    pub fn register(&self, view: &SharedEditorView) -> bool {
        let id = lock(view).id();
        let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
        if views.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        views.push((id, Arc::downgrade(view)));
        tracing::debug!("Registered editor view {:?}", id);
        true
    }

    pub fn view_count(&self) -> usize {
        self.views
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, v)| v.strong_count() > 0)
            .count()
    }

    pub fn current(&self) -> Arc<FolderSnapshot> {
        self.folders.borrow().clone()
    }

    fn live_views(&self) -> Vec<SharedEditorView> {
        let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
        views.retain(|(_, v)| v.strong_count() > 0);
        views.iter().filter_map(|(_, v)| v.upgrade()).collect()
    }

    /// Push `snapshot` into every connected, ready view. Returns the number of
    /// views that re-rendered.
    pub fn broadcast(&self, snapshot: &Arc<FolderSnapshot>) -> usize {
        let mut rerendered = 0;
        for view in self.live_views() {
            let mut view = lock(&view);
            if !view.is_connected() {
                continue;
            }
            match view.dispatch_folders(snapshot) {
                Ok(true) => rerendered += 1,
                Ok(false) => {}
                Err(e) => tracing::debug!("View {:?} not ready: {}", view.id(), e),
            }
        }
        rerendered
    }

    /// On file-open the view's state field may not exist yet, so retry until
    /// every connected view has accepted the current snapshot.
    pub async fn on_file_open(&self) -> Result<()> {
        let current = self.current();
        for attempt in 0..FILE_OPEN_RETRIES {
            let mut pending = 0;
            for view in self.live_views() {
                let mut view = lock(&view);
                if !view.is_connected() {
                    continue;
                }
                if view.dispatch_folders(&current).is_err() {
                    pending += 1;
                }
            }
            if pending == 0 {
                return Ok(());
            }
            tracing::debug!(
                "{} editor view(s) not ready on file-open (attempt {})",
                pending,
                attempt + 1
            );
            tokio::time::sleep(FILE_OPEN_RETRY_DELAY).await;
        }
        Err(FolderLinksError::EditorStateUnavailable)
    }

}

fn lock(view: &SharedEditorView) -> std::sync::MutexGuard<'_, EditorView> {
    view.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(generation: u64, folders: &[&str]) -> Arc<FolderSnapshot> {
        FolderSnapshot::from_paths(generation, folders.iter().copied()).shared()
    }

    fn ready_view(id: u64, text: &str, folders: &Arc<FolderSnapshot>) -> EditorView {
        let mut view = EditorView::new(ViewId(id), text);
        view.install_state(folders.clone());
        view
    }

    // === EditorFolderState ===

    #[test]
    fn state_rejects_stale_generation() {
        let mut state = EditorFolderState::new(snap(5, &["a"]));
        assert!(!state.apply(&snap(4, &["a", "b"])));
        assert!(state.apply(&snap(6, &["a", "b"])));
        assert_eq!(state.snapshot().generation(), 6);
    }

    #[test]
    fn state_ignores_same_snapshot() {
        let s = snap(1, &["a"]);
        let mut state = EditorFolderState::new(s.clone());
        assert!(!state.apply(&s));
    }

    // === Decorations ===

    #[test]
    fn decorates_resolved_and_unresolved_links() {
        let view = ready_view(1, "[[Projects/]] [[Missing/]] [[Note]]", &snap(1, &["Projects"]));
        let decos = view.decorations();
        assert_eq!(decos.len(), 2);
        assert_eq!(decos[0].state, LinkState::Resolved);
        assert_eq!(decos[0].class, "is-resolved folder-link");
        assert_eq!(decos[0].data_folder_link, "Projects/");
        assert_eq!(decos[1].state, LinkState::Unresolved);
        assert_eq!(decos[1].class, "is-unresolved folder-link");
    }

    #[test]
    fn only_visible_links_are_decorated() {
        let text = "[[A/]]\n\n\n[[B/]]";
        let mut view = ready_view(1, text, &snap(1, &["A", "B"]));
        view.set_visible_ranges(vec![0..7]);
        assert_eq!(view.decorations().len(), 1);
        assert_eq!(view.decorations()[0].data_folder_link, "A/");
    }

    #[test]
    fn link_spanning_two_ranges_is_decorated_once() {
        let mut view = ready_view(1, "xx [[A/]] yy", &snap(1, &["A"]));
        view.set_visible_ranges(vec![0..5, 5..12]);
        assert_eq!(view.decorations().len(), 1);
    }

    #[test]
    fn folder_change_flips_classes() {
        let mut view = ready_view(1, "[[Archive/]]", &snap(1, &[]));
        assert_eq!(view.decorations()[0].state, LinkState::Unresolved);

        assert!(view.dispatch_folders(&snap(2, &["Archive"])).unwrap());
        assert_eq!(view.decorations()[0].state, LinkState::Resolved);
    }

    #[test]
    fn cursor_move_does_not_rebuild_decorations() {
        let mut view = ready_view(1, "[[A/]]\nline two", &snap(1, &["A"]));
        let builds = view.decoration_builds();
        view.set_cursor(10);
        assert_eq!(view.decoration_builds(), builds);
        view.set_text("[[A/]] changed");
        assert_eq!(view.decoration_builds(), builds + 1);
    }

    #[test]
    fn stale_dispatch_does_not_rebuild() {
        let mut view = ready_view(1, "[[A/]]", &snap(3, &["A"]));
        let builds = view.decoration_builds();
        assert!(!view.dispatch_folders(&snap(2, &[])).unwrap());
        assert_eq!(view.decoration_builds(), builds);
        assert_eq!(view.decorations()[0].state, LinkState::Resolved);
    }

    // === Widgets ===

    #[test]
    fn widget_shows_alias_away_from_cursor() {
        let mut view = ready_view(1, "top\n[[Projects/|my projects]]", &snap(1, &["Projects"]));
        view.set_cursor(0);
        let widgets = view.widgets();
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].text, "my projects");
        assert_eq!(widgets[0].href, "Projects/");
        assert_eq!(widgets[0].line, 2);
    }

    #[test]
    fn widget_shows_source_on_active_line() {
        let mut view = ready_view(1, "top\n[[Projects/|my projects]]", &snap(1, &["Projects"]));
        view.set_cursor(5);
        assert_eq!(view.widgets()[0].text, "Projects/|my projects");
    }

    #[test]
    fn widget_without_alias_shows_target() {
        let view = ready_view(1, "[[Projects/]]", &snap(1, &[]));
        assert_eq!(view.widgets()[0].text, "Projects/");
        assert_eq!(view.widgets()[0].state, LinkState::Unresolved);
    }

    // === Registry ===

    #[test]
    fn registers_each_view_once() {
        let (_tx, rx) = watch::channel(snap(0, &[]));
        let registry = EditorRegistry::new(rx);
        let view = Arc::new(Mutex::new(EditorView::new(ViewId(1), "")));
        assert!(registry.register(&view));
        assert!(!registry.register(&view));
        assert_eq!(registry.view_count(), 1);
    }

    #[test]
    fn broadcast_skips_disconnected_and_prunes_dropped() {
        let initial = snap(0, &[]);
        let (_tx, rx) = watch::channel(initial.clone());
        let registry = EditorRegistry::new(rx);

        let a = Arc::new(Mutex::new(ready_view(1, "[[A/]]", &initial)));
        let b = Arc::new(Mutex::new(ready_view(2, "[[A/]]", &initial)));
        let c = Arc::new(Mutex::new(ready_view(3, "[[A/]]", &initial)));
        registry.register(&a);
        registry.register(&b);
        registry.register(&c);

        b.lock().unwrap().set_connected(false);
        drop(c);

        let n = registry.broadcast(&snap(1, &["A"]));
        assert_eq!(n, 1);
        assert_eq!(registry.view_count(), 2);
        assert_eq!(a.lock().unwrap().decorations()[0].state, LinkState::Resolved);
        assert_eq!(b.lock().unwrap().decorations()[0].state, LinkState::Unresolved);
    }

    #[tokio::test(start_paused = true)]
    async fn file_open_retries_until_state_installed() {
        let current = snap(4, &["A"]);
        let (_tx, rx) = watch::channel(current.clone());
        let registry = Arc::new(EditorRegistry::new(rx));

        let view = Arc::new(Mutex::new(EditorView::new(ViewId(1), "[[A/]]")));
        registry.register(&view);

        let installer = {
            let view = view.clone();
            tokio::spawn(async move {
                tokio::time::sleep(FILE_OPEN_RETRY_DELAY * 2).await;
                view.lock().unwrap().install_state(snap(0, &[]));
            })
        };

        registry.on_file_open().await.unwrap();
        installer.await.unwrap();

        let view = view.lock().unwrap();
        assert_eq!(view.folder_state().unwrap().snapshot().generation(), 4);
        assert_eq!(view.decorations()[0].state, LinkState::Resolved);
    }

    #[tokio::test(start_paused = true)]
    async fn file_open_gives_up_when_state_never_appears() {
        let (_tx, rx) = watch::channel(snap(0, &[]));
        let registry = EditorRegistry::new(rx);
        let view = Arc::new(Mutex::new(EditorView::new(ViewId(1), "")));
        registry.register(&view);

        let err = registry.on_file_open().await.unwrap_err();
        assert!(matches!(err, FolderLinksError::EditorStateUnavailable));
    }
}
