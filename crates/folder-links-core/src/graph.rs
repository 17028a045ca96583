use crate::error::Result;
use crate::host::{FileExplorer, Vault};
use crate::path::{folder_path_from_link, is_folder_link};
use crate::resolver::{activate_path, LinkAction};
use crate::snapshot::{FolderEntry, FolderSnapshot};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Node type as the graph renderer classifies it. Folder links never resolve
/// to a note, so the renderer always reports them as `Unresolved`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Resolved,
    Unresolved,
    Attachment,
    Tag,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    /// The folder this node links to, when it exists.
    pub folder: Option<FolderEntry>,
    /// Fill colour override (`0xRRGGBB`). `None` means the renderer default.
    pub fill: Option<u32>,
}

impl GraphNode {
    pub fn new(id: &str, kind: NodeKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            folder: None,
            fill: None,
        }
    }
}

/// One graph panel.
#[derive(Debug)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub highlighted: Option<String>,
    /// Theme colour for regular nodes, e.g. `"#a3a3a3"`.
    pub node_color: String,
    renderer_ready: bool,
    render_requests: usize,
}

impl GraphView {
    pub fn new(nodes: Vec<GraphNode>, node_color: &str) -> Self {
        Self {
            nodes,
            highlighted: None,
            node_color: node_color.to_string(),
            renderer_ready: true,
            render_requests: 0,
        }
    }

    /// A panel whose renderer has not been created yet.
    pub fn without_renderer() -> Self {
        Self {
            renderer_ready: false,
            ..Self::new(Vec::new(), "")
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn render_requests(&self) -> usize {
        self.render_requests
    }

    /// Colour the renderer should paint `id` with right now. `None` means
    /// the renderer's own colour for the node type.
    pub fn fill_color(&self, id: &str) -> Option<u32> {
        let node = self.node(id)?;
        let highlighted = self.highlighted.as_deref() == Some(id);
        match node.fill {
            Some(color) if node.kind == NodeKind::Unresolved && !highlighted => Some(color),
            _ => None,
        }
    }
}

pub type SharedGraphView = Arc<Mutex<GraphView>>;

/// What a node click did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeClick {
    Folder(LinkAction),
    /// Not a folder link; the renderer's own handler should run.
    Delegated,
}

/// Parse a `#rrggbb` or `#rgb` colour.
pub fn parse_hex_color(hex: &str) -> Option<u32> {
    let digits = hex.trim().strip_prefix('#')?;
    match digits.len() {
        6 => u32::from_str_radix(digits, 16).ok(),
        3 => {
            let short = u32::from_str_radix(digits, 16).ok()?;
            let (r, g, b) = ((short >> 8) & 0xf, (short >> 4) & 0xf, short & 0xf);
            Some((r * 0x11) << 16 | (g * 0x11) << 8 | (b * 0x11))
        }
        _ => None,
    }
}

/// Keeps folder-link nodes in every open graph panel in sync with the folder
/// set.
pub struct GraphViewManager {
    folders: watch::Receiver<Arc<FolderSnapshot>>,
    explorer: Arc<dyn FileExplorer>,
    vault: Arc<dyn Vault>,
    instances: Mutex<Vec<SharedGraphView>>,
}

impl GraphViewManager {
    pub fn new(
        folders: watch::Receiver<Arc<FolderSnapshot>>,
        explorer: Arc<dyn FileExplorer>,
        vault: Arc<dyn Vault>,
    ) -> Self {
        Self {
            folders,
            explorer,
            vault,
            instances: Mutex::new(Vec::new()),
        }
    }

    /// Start tracking a panel. Panels without a renderer are skipped.
    pub fn add_instance(&self, view: &SharedGraphView) -> bool {
        if !view.lock().unwrap_or_else(|e| e.into_inner()).renderer_ready {
            tracing::debug!("Graph view has no renderer yet, not tracking it");
            return false;
        }
        {
            let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
            if !instances.iter().any(|v| Arc::ptr_eq(v, view)) {
                instances.push(Arc::clone(view));
            }
        }
        let snapshot = self.folders.borrow().clone();
        update_instance(&mut view.lock().unwrap_or_else(|e| e.into_inner()), &snapshot);
        true
    }

    pub fn remove_instance(&self, view: &SharedGraphView) {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|v| !Arc::ptr_eq(v, view));
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Re-apply `snapshot` to every tracked panel. Returns how many panels
    /// were asked to re-render.
    pub fn update(&self, snapshot: &FolderSnapshot) -> usize {
        let instances = self.instances.lock().unwrap_or_else(|e| e.into_inner()).clone();
        instances
            .iter()
            .filter(|view| {
                update_instance(&mut view.lock().unwrap_or_else(|e| e.into_inner()), snapshot)
            })
            .count()
    }

    /// Click on node `id` in `view`.
    pub fn on_node_click(&self, view: &SharedGraphView, id: &str) -> Result<NodeClick> {
        if !is_folder_link(id) {
            return Ok(NodeClick::Delegated);
        }
        let folder = view
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .node(id)
            .and_then(|n| n.folder.clone());

        let action = match folder {
            Some(entry) => {
                self.explorer.reveal_in_folder(&entry);
                LinkAction::Revealed(entry.path)
            }
            None => {
                let snapshot = self.folders.borrow().clone();
                activate_path(&folder_path_from_link(id), &snapshot, &*self.explorer, &*self.vault)?
            }
        };
        Ok(NodeClick::Folder(action))
    }
}

/// Attach folders and fill colours to the folder-link nodes of one panel.
/// Returns true if a re-render was requested.
fn update_instance(view: &mut GraphView, snapshot: &FolderSnapshot) -> bool {
    let color = parse_hex_color(&view.node_color);
    let mut changed = false;

    for node in view.nodes.iter_mut().filter(|n| is_folder_link(&n.id)) {
        let (folder, fill) = match snapshot.find(&folder_path_from_link(&node.id)) {
            Some(entry) => (Some(entry.clone()), color),
            None => (None, None),
        };
        if node.folder != folder || node.fill != fill {
            node.folder = folder;
            node.fill = fill;
            changed = true;
        }
    }

    if changed {
        view.render_requests += 1;
    }
    changed
}
