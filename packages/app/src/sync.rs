//! Keeps a scored copy of every location in step with the store.
//!
//! The list is only ever replaced wholesale: every change event triggers
//! a full re-fetch, scores are recomputed, and a new [`Snapshot`] is
//! published through a [`watch`] channel with a higher version.

use std::sync::Arc;

use mozzi_aggregation::{ScoredLocation, score_all};
use mozzi_location_models::LocationId;
use mozzi_store::{ChangeFeed, Store, StoreError};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// One published state of the location list.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Increases by one on every successful fetch. Zero means nothing has
    /// been fetched yet.
    pub version: u64,
    /// Scored locations in store order.
    pub locations: Arc<Vec<ScoredLocation>>,
}

impl Snapshot {
    /// Finds a location by id.
    #[must_use]
    pub fn find(&self, id: &LocationId) -> Option<&ScoredLocation> {
        self.locations.iter().find(|l| l.id() == id)
    }
}

/// Owner of the in-memory location list.
pub struct SyncController {
    store: Arc<dyn Store>,
    state: watch::Sender<Snapshot>,
    refreshing: Mutex<()>,
}

impl SyncController {
    /// Creates a controller with an empty list.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            state: watch::Sender::new(Snapshot::default()),
            refreshing: Mutex::new(()),
        }
    }

    /// The latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Subscribes to snapshot replacements.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    /// Re-fetches every location and publishes a new snapshot.
    ///
    /// Refreshes run one at a time, so a later call never publishes
    /// older rows than an earlier one. On failure the error is logged,
    /// the previous snapshot stays in place, and `false` is returned.
    pub async fn refresh(&self) -> bool {
        let _serial = self.refreshing.lock().await;
        match self.fetch().await {
            Ok(locations) => {
                self.state.send_modify(|snap| {
                    snap.version += 1;
                    snap.locations = Arc::new(locations);
                    log::debug!(
                        "Synced {} locations (version {})",
                        snap.locations.len(),
                        snap.version
                    );
                });
                true
            }
            Err(e) => {
                log::error!("Failed to load locations: {e}");
                false
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<ScoredLocation>, StoreError> {
        Ok(score_all(self.store.fetch_locations().await?))
    }

    /// Subscribes to `feed`, fetches once, then re-fetches on every change
    /// event until the returned handle is dropped or stopped. Changes made
    /// during the first fetch are still delivered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the change feed cannot be subscribed to.
    /// A failed initial fetch is only logged.
    pub async fn start(self: &Arc<Self>, feed: &dyn ChangeFeed) -> Result<SyncHandle, StoreError> {
        let mut subscription = feed.subscribe()?;
        self.refresh().await;

        let controller = Arc::clone(self);

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                log::debug!("Change on {} ({}), re-syncing", event.table, event.kind);
                controller.refresh().await;
            }
            log::info!("Change feed closed");
        });

        Ok(SyncHandle { task: Some(task) })
    }
}

/// Running listener started by [`SyncController::start`].
///
/// Dropping the handle aborts the listener, which releases the change
/// feed subscription.
pub struct SyncHandle {
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Aborts the listener and waits until it has let go of the
    /// subscription.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Whether the listener is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
