use crate::events::{FolderRename, VaultEvent};
use crate::host::FolderSource;
use crate::snapshot::FolderSnapshot;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Duration;

/// Quiet period after the last vault event before folders are reloaded.
pub const DEBOUNCE_DURATION: Duration = Duration::from_millis(50);

const EVENT_CHANNEL_CAPACITY: usize = 1000;
const RENAME_CHANNEL_CAPACITY: usize = 256;

/// Owns the folder snapshot and publishes a new one whenever the folder set
/// changes.
///
/// Vault events go in through [`FolderService::notify`]; a background worker
/// ([`FolderService::run_worker`]) waits for the burst to settle, reloads the
/// folder list once, and publishes only if it differs from the current
/// snapshot. Consumers hold a `watch::Receiver` and always see the latest
/// value, however late they subscribe.
pub struct FolderService {
    source: Arc<dyn FolderSource>,
    event_tx: mpsc::Sender<VaultEvent>,
    snapshot_tx: watch::Sender<Arc<FolderSnapshot>>,
    rename_tx: broadcast::Sender<FolderRename>,
}

impl FolderService {
    /// Load the initial snapshot synchronously and return the receiver the
    /// worker must be started with.
    pub fn new(source: Arc<dyn FolderSource>) -> (Self, mpsc::Receiver<VaultEvent>) {
        let initial = FolderSnapshot::from_paths(0, source.list_folders()).shared();
        tracing::info!("Loaded {} folders", initial.len());

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = watch::channel(initial);
        let (rename_tx, _) = broadcast::channel(RENAME_CHANNEL_CAPACITY);
        (
            Self {
                source,
                event_tx,
                snapshot_tx,
                rename_tx,
            },
            event_rx,
        )
    }

    /// Queue a vault event. Never blocks.
    ///
    /// Folder renames are also forwarded to rename subscribers right away,
    /// since the debounced reload only keeps the end state.
    pub fn notify(&self, event: VaultEvent) {
        if let Some(rename) = event.as_folder_rename() {
            // No subscribers is fine.
            let _ = self.rename_tx.send(rename);
        }

        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                // A reload is already pending and will pick this change up.
                tracing::debug!("Folder event queue full, coalescing {}", event.path());
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::error!(
                    "Folder service channel closed (worker dead?), dropping event for {}",
                    event.path()
                );
            }
        }
    }

    /// Latest published snapshot.
    pub fn current(&self) -> Arc<FolderSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FolderSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe_renames(&self) -> broadcast::Receiver<FolderRename> {
        self.rename_tx.subscribe()
    }

    /// Reload all folders now. Publishes and returns true only if the folder
    /// set changed.
    pub fn refresh(&self) -> bool {
        let folders = self.source.list_folders();
        let published = self.snapshot_tx.send_if_modified(|current| {
            let candidate = FolderSnapshot::from_paths(current.generation() + 1, &folders);
            if candidate.same_folders(current) {
                false
            } else {
                *current = candidate.shared();
                true
            }
        });

        if published {
            let current = self.current();
            tracing::info!(
                "Published folder snapshot generation {} ({} folders)",
                current.generation(),
                current.len()
            );
        } else {
            tracing::debug!("Folder set unchanged, nothing published");
        }
        published
    }

    /// Background worker: debounce vault events and reload once per burst.
    pub async fn run_worker(self: Arc<Self>, mut rx: mpsc::Receiver<VaultEvent>) {
        tracing::info!("Folder service worker started");
        loop {
            let Some(first) = rx.recv().await else {
                break;
            };
            tracing::debug!("Vault event for {}", first.path());

            // Wait until no event has arrived for DEBOUNCE_DURATION.
            let mut burst = 1usize;
            let mut closed = false;
            loop {
                match tokio::time::timeout(DEBOUNCE_DURATION, rx.recv()).await {
                    Ok(Some(event)) => {
                        tracing::debug!("Vault event for {}", event.path());
                        burst += 1;
                    }
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            tracing::debug!("Reloading folders after {} event(s)", burst);
            // Listing folders may walk the disk.
            let service = self.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || service.refresh()).await {
                tracing::error!("Folder reload failed: {}", e);
            }

            if closed {
                break;
            }
        }
        tracing::info!("Folder service worker stopped");
    }
}
