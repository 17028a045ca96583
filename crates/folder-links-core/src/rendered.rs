//! Static rendered (reading) view.
//!
//! The host renders markdown to elements; folder links arrive here as
//! [`RenderedLink`]s and are re-classified every time the folder set changes.

use crate::path::{folder_path_from_link, is_folder_link};
use crate::resolver::{resolve_path, LinkState};
use crate::snapshot::FolderSnapshot;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;

pub const INTERNAL_LINK_CLASS: &str = "internal-link";

/// The parts of a rendered `<a>` element the engine reads and writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderedLink {
    pub text: String,
    pub href: Option<String>,
    pub data_href: Option<String>,
    pub data_folder_link: Option<String>,
    pub target: Option<String>,
    pub classes: BTreeSet<String>,
}

impl RenderedLink {
    /// An internal link as the host renders it before post-processing.
    pub fn internal(text: &str, href: &str) -> Self {
        Self {
            text: text.to_string(),
            href: Some(href.to_string()),
            data_href: Some(href.to_string()),
            data_folder_link: None,
            target: Some("_blank".to_string()),
            classes: BTreeSet::from([INTERNAL_LINK_CLASS.to_string()]),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    fn add_class(&mut self, class: &str) {
        self.classes.insert(class.to_string());
    }

    fn remove_class(&mut self, class: &str) {
        self.classes.remove(class);
    }

    /// Current resolution state, if the link has been classified.
    pub fn state(&self) -> Option<LinkState> {
        if self.has_class(LinkState::Resolved.class()) {
            Some(LinkState::Resolved)
        } else if self.has_class(LinkState::Unresolved.class()) {
            Some(LinkState::Unresolved)
        } else {
            None
        }
    }
}

/// The folder links of one rendered section.
#[derive(Debug)]
pub struct FolderLinkView {
    targets: Vec<RenderedLink>,
    rendered_generation: Option<u64>,
}

impl FolderLinkView {
    pub fn new(targets: Vec<RenderedLink>) -> Self {
        Self {
            targets,
            rendered_generation: None,
        }
    }

    pub fn targets(&self) -> &[RenderedLink] {
        &self.targets
    }

    /// Re-classify every target against `snapshot`. Older snapshots than the
    /// one last rendered are ignored. Returns true if anything was rendered.
    pub fn render(&mut self, snapshot: &FolderSnapshot) -> bool {
        if let Some(done) = self.rendered_generation {
            if snapshot.generation() < done {
                return false;
            }
        }
        self.rendered_generation = Some(snapshot.generation());

        for target in &mut self.targets {
            let link = match (&target.data_href, &target.data_folder_link) {
                (Some(href), _) => {
                    target.data_folder_link = Some(href.clone());
                    href.clone()
                }
                (None, Some(folder_link)) => folder_link.clone(),
                (None, None) => continue,
            };

            let state = resolve_path(&folder_path_from_link(&link), snapshot).state();
            target.add_class(state.class());
            target.remove_class(state.opposite_class());
            if state == LinkState::Resolved {
                // Stop the host from navigating to a note of that name.
                target.data_href = None;
                target.href = None;
                target.target = None;
            }
        }
        true
    }
}

pub type SharedFolderLinkView = Arc<Mutex<FolderLinkView>>;

/// Post-processor and registry for rendered views.
///
/// The host owns each returned view for as long as its section is on screen;
/// only a weak reference is kept here.
pub struct RenderedViews {
    folders: watch::Receiver<Arc<FolderSnapshot>>,
    views: Mutex<Vec<Weak<Mutex<FolderLinkView>>>>,
}

impl RenderedViews {
    pub fn new(folders: watch::Receiver<Arc<FolderSnapshot>>) -> Self {
        Self {
            folders,
            views: Mutex::new(Vec::new()),
        }
    }

    /// Pick out folder links from a rendered section. Returns the view that
    /// now tracks them, already rendered, or None if there were none.
    pub fn post_process(&self, elements: Vec<RenderedLink>) -> Option<SharedFolderLinkView> {
        let targets: Vec<RenderedLink> = elements
            .into_iter()
            .filter(|el| el.has_class(INTERNAL_LINK_CLASS) && is_folder_link(&el.text))
            .collect();
        if targets.is_empty() {
            return None;
        }

        let mut view = FolderLinkView::new(targets);
        view.render(&self.folders.borrow());
        let view = Arc::new(Mutex::new(view));
        self.views
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::downgrade(&view));
        Some(view)
    }

    pub fn view_count(&self) -> usize {
        self.views
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|v| v.strong_count() > 0)
            .count()
    }

    /// Re-render every live view; drops views the host has unloaded.
    pub fn broadcast(&self, snapshot: &FolderSnapshot) -> usize {
        let live: Vec<SharedFolderLinkView> = {
            let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
            views.retain(|v| v.strong_count() > 0);
            views.iter().filter_map(Weak::upgrade).collect()
        };
        live.iter()
            .filter(|view| {
                view.lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .render(snapshot)
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(generation: u64, folders: &[&str]) -> Arc<FolderSnapshot> {
        FolderSnapshot::from_paths(generation, folders.iter().copied()).shared()
    }

    #[test]
    fn post_process_keeps_only_folder_links() {
        let (_tx, rx) = watch::channel(snap(0, &[]));
        let views = RenderedViews::new(rx);
        let view = views
            .post_process(vec![
                RenderedLink::internal("Projects/", "Projects/"),
                RenderedLink::internal("Note", "Note"),
                RenderedLink {
                    text: "External/".into(),
                    ..Default::default()
                },
            ])
            .expect("should create a view");
        assert_eq!(view.lock().unwrap().targets().len(), 1);
    }

    #[test]
    fn section_without_folder_links_creates_no_view() {
        let (_tx, rx) = watch::channel(snap(0, &[]));
        let views = RenderedViews::new(rx);
        assert!(views
            .post_process(vec![RenderedLink::internal("Note", "Note")])
            .is_none());
        assert_eq!(views.view_count(), 0);
    }

    #[test]
    fn resolved_link_loses_navigation_attributes() {
        let mut view = FolderLinkView::new(vec![RenderedLink::internal("Projects/", "Projects/")]);
        view.render(&snap(1, &["Projects"]));

        let link = &view.targets()[0];
        assert_eq!(link.state(), Some(LinkState::Resolved));
        assert_eq!(link.data_folder_link.as_deref(), Some("Projects/"));
        assert!(link.href.is_none());
        assert!(link.data_href.is_none());
        assert!(link.target.is_none());
    }

    #[test]
    fn unresolved_link_keeps_attributes() {
        let mut view = FolderLinkView::new(vec![RenderedLink::internal("Archive/", "Archive/")]);
        view.render(&snap(1, &[]));

        let link = &view.targets()[0];
        assert_eq!(link.state(), Some(LinkState::Unresolved));
        assert_eq!(link.href.as_deref(), Some("Archive/"));
    }

    #[test]
    fn rerender_after_delete_uses_folder_link_attribute() {
        let mut view = FolderLinkView::new(vec![RenderedLink::internal("Projects/", "Projects/")]);
        view.render(&snap(1, &["Projects"]));
        view.render(&snap(2, &[]));

        let link = &view.targets()[0];
        assert_eq!(link.state(), Some(LinkState::Unresolved));
        assert!(!link.has_class("is-resolved"));
    }

    #[test]
    fn render_is_idempotent() {
        let mut view = FolderLinkView::new(vec![RenderedLink::internal("A/", "A/")]);
        view.render(&snap(1, &["A"]));
        let first = view.targets().to_vec();
        view.render(&snap(1, &["A"]));
        assert_eq!(view.targets(), first.as_slice());
    }

    #[test]
    fn stale_snapshot_is_not_rendered() {
        let mut view = FolderLinkView::new(vec![RenderedLink::internal("A/", "A/")]);
        assert!(view.render(&snap(3, &[])));
        assert!(!view.render(&snap(2, &["A"])));
        assert_eq!(view.targets()[0].state(), Some(LinkState::Unresolved));
    }

    #[test]
    fn broadcast_drops_unloaded_views() {
        let (_tx, rx) = watch::channel(snap(0, &[]));
        let views = RenderedViews::new(rx);
        let kept = views
            .post_process(vec![RenderedLink::internal("A/", "A/")])
            .unwrap();
        let unloaded = views
            .post_process(vec![RenderedLink::internal("B/", "B/")])
            .unwrap();
        drop(unloaded);

        assert_eq!(views.broadcast(&snap(1, &["A"])), 1);
        assert_eq!(views.view_count(), 1);
        assert_eq!(
            kept.lock().unwrap().targets()[0].state(),
            Some(LinkState::Resolved)
        );
    }

    #[test]
    fn new_section_renders_with_current_snapshot() {
        let (_tx, rx) = watch::channel(snap(4, &["A"]));
        let views = RenderedViews::new(rx);
        let view = views
            .post_process(vec![RenderedLink::internal("A/", "A/")])
            .unwrap();
        assert_eq!(
            view.lock().unwrap().targets()[0].state(),
            Some(LinkState::Resolved)
        );
    }
}
