use crate::error::{FolderLinksError, Result};
use std::collections::BTreeMap;

pub const FILE_EXPLORER: &str = "file-explorer";
pub const OUTGOING_LINK: &str = "outgoing-link";
pub const GRAPH_VIEW: &str = "graph";

/// Host-assigned identity of a workspace leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(pub u64);

/// A core panel instance living in some leaf.
#[derive(Clone, Debug)]
pub struct Leaf<T> {
    pub id: LeafId,
    pub view: T,
}

impl<T> Leaf<T> {
    pub fn new(id: LeafId, view: T) -> Self {
        Self { id, view }
    }
}

pub type LeafCallback<T> = Box<dyn Fn(&Leaf<T>) + Send + Sync>;

/// Tracks the live instances of one kind of core panel.
pub struct LeafWatcher<T> {
    id: String,
    instances: Vec<Leaf<T>>,
    on_init: Option<LeafCallback<T>>,
    on_cleanup: Option<LeafCallback<T>>,
    on_update: Option<LeafCallback<T>>,
    allow_multiple: bool,
}

impl<T> LeafWatcher<T> {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            instances: Vec::new(),
            on_init: None,
            on_cleanup: None,
            on_update: None,
            allow_multiple: false,
        }
    }

    pub fn on_init(mut self, cb: impl Fn(&Leaf<T>) + Send + Sync + 'static) -> Self {
        self.on_init = Some(Box::new(cb));
        self
    }

    pub fn on_cleanup(mut self, cb: impl Fn(&Leaf<T>) + Send + Sync + 'static) -> Self {
        self.on_cleanup = Some(Box::new(cb));
        self
    }

    pub fn on_update(mut self, cb: impl Fn(&Leaf<T>) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Box::new(cb));
        self
    }

    pub fn allow_multiple(mut self, allow: bool) -> Self {
        self.allow_multiple = allow;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn contains(&self, id: LeafId) -> bool {
        self.instances.iter().any(|leaf| leaf.id == id)
    }

    /// New instances are initialized; known ones get the update callback.
    pub fn add_instance(&mut self, leaf: Leaf<T>) {
        if self.contains(leaf.id) {
            if let Some(cb) = &self.on_update {
                cb(&leaf);
            }
            return;
        }
        if let Some(cb) = &self.on_init {
            cb(&leaf);
        }
        self.instances.push(leaf);
    }

    pub fn remove_instance(&mut self, id: LeafId) {
        if let Some(pos) = self.instances.iter().position(|leaf| leaf.id == id) {
            let leaf = self.instances.remove(pos);
            if let Some(cb) = &self.on_cleanup {
                cb(&leaf);
            }
        }
    }

    pub fn clear_instances(&mut self) {
        for leaf in self.instances.drain(..) {
            if let Some(cb) = &self.on_cleanup {
                cb(&leaf);
            }
        }
    }

    pub fn instances(&self) -> &[Leaf<T>] {
        &self.instances
    }

    /// The instance, when exactly one is tracked.
    pub fn instance(&self) -> Option<&Leaf<T>> {
        match self.instances.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Bring tracked instances in line with the leaves the host reports.
    pub fn reconcile(&mut self, found: Vec<Leaf<T>>) -> Result<()> {
        match found.len() {
            0 => self.clear_instances(),
            1 => found.into_iter().for_each(|leaf| self.add_instance(leaf)),
            n if self.allow_multiple => {
                tracing::debug!("{} instances of {}", n, self.id);
                found.into_iter().for_each(|leaf| self.add_instance(leaf));
            }
            _ => return Err(FolderLinksError::MultipleInstances(self.id.clone())),
        }
        Ok(())
    }
}

/// Every registered watcher, keyed by panel kind.
pub struct PanelRegistry<T> {
    watchers: BTreeMap<String, LeafWatcher<T>>,
}

impl<T> Default for PanelRegistry<T> {
    fn default() -> Self {
        Self {
            watchers: BTreeMap::new(),
        }
    }
}

impl<T: Clone> PanelRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `watcher`, initializing it with the leaves that already exist.
    pub fn register(&mut self, mut watcher: LeafWatcher<T>, existing: Vec<Leaf<T>>) {
        for leaf in existing {
            watcher.add_instance(leaf);
        }
        tracing::debug!("Watching {} panels", watcher.id());
        self.watchers.insert(watcher.id.clone(), watcher);
    }

    pub fn unregister(&mut self, id: &str) -> Option<LeafWatcher<T>> {
        self.watchers.remove(id)
    }

    pub fn watcher(&self, id: &str) -> Option<&LeafWatcher<T>> {
        self.watchers.get(id)
    }

    pub fn instance(&self, id: &str) -> Option<&Leaf<T>> {
        self.watchers.get(id).and_then(LeafWatcher::instance)
    }

    pub fn instances(&self, id: &str) -> Vec<Leaf<T>> {
        self.watchers
            .get(id)
            .map(|w| w.instances().to_vec())
            .unwrap_or_default()
    }

    /// Reconcile one watcher against the leaves of its kind.
    pub fn reconcile(&mut self, id: &str, found: Vec<Leaf<T>>) -> Result<()> {
        match self.watchers.get_mut(id) {
            Some(watcher) => watcher.reconcile(found),
            None => Ok(()),
        }
    }

    /// The active leaf changed: reconcile every watcher. `leaves_of_kind`
    /// returns the leaves currently open for a panel kind.
    pub fn on_active_leaf_change(
        &mut self,
        leaves_of_kind: impl Fn(&str) -> Vec<Leaf<T>>,
    ) -> Result<()> {
        for watcher in self.watchers.values_mut() {
            let found = leaves_of_kind(watcher.id());
            watcher.reconcile(found)?;
        }
        Ok(())
    }
}
