//! Change detection by periodic fingerprinting.
//!
//! Each tick fetches the `locations` rows and the exact `reports` count,
//! and compares them with the previous tick. One [`ChangeEvent`] is
//! emitted per table that differs. The first tick only records a
//! baseline.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::memory::MemoryStore;
use crate::rest::RestStore;
use crate::{
    CHANGE_CHANNEL_BUFFER, ChangeEvent, ChangeFeed, ChangeKind, Store, StoreError, Subscription,
    Table,
};

/// A store that can be fingerprinted by [`PollingFeed`].
#[async_trait]
pub trait PollSource: Store {
    /// Exact number of rows in the `reports` table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the count cannot be read.
    async fn report_count(&self) -> Result<u64, StoreError>;
}

#[async_trait]
impl PollSource for RestStore {
    async fn report_count(&self) -> Result<u64, StoreError> {
        self.count_reports().await
    }
}

#[async_trait]
impl PollSource for MemoryStore {
    async fn report_count(&self) -> Result<u64, StoreError> {
        self.count_reports()
    }
}

/// Snapshot of both tables used to detect changes between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    locations: u64,
    reports: u64,
}

impl Fingerprint {
    async fn take(store: &dyn PollSource) -> Result<Self, StoreError> {
        let rows = store.fetch_locations().await?;
        let encoded = serde_json::to_string(&rows)?;
        let mut hasher = DefaultHasher::new();
        encoded.hash(&mut hasher);

        Ok(Self {
            locations: hasher.finish(),
            reports: store.report_count().await?,
        })
    }

    fn changed_tables(self, next: Self) -> Vec<Table> {
        let mut changed = Vec::new();
        if self.locations != next.locations {
            changed.push(Table::Locations);
        }
        if self.reports != next.reports {
            changed.push(Table::Reports);
        }
        changed
    }
}

/// Polling change feed, used for [`RestStore`] which has no push channel.
pub struct PollingFeed {
    store: Arc<dyn PollSource>,
    interval: Duration,
}

impl PollingFeed {
    /// Creates a feed that checks the store every `interval`.
    #[must_use]
    pub fn new(store: Arc<dyn PollSource>, interval: Duration) -> Self {
        Self { store, interval }
    }
}

impl ChangeFeed for PollingFeed {
    /// Starts the polling task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    fn subscribe(&self) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_BUFFER);
        let store = Arc::clone(&self.store);
        let interval = self.interval;

        let producer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last: Option<Fingerprint> = None;

            loop {
                ticker.tick().await;

                let next = match Fingerprint::take(store.as_ref()).await {
                    Ok(fp) => fp,
                    Err(e) => {
                        log::warn!("Change poll failed: {e}");
                        continue;
                    }
                };

                if let Some(prev) = last {
                    for table in prev.changed_tables(next) {
                        log::debug!("Detected change in {table}");
                        let event = ChangeEvent {
                            table,
                            kind: ChangeKind::Unknown,
                        };
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                last = Some(next);
            }
        });

        Ok(Subscription::new(rx, Some(producer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mozzi_location_models::{Accumulator, Dimension, Level, Location, LocationId, NewReport};

    const INTERVAL: Duration = Duration::from_secs(5);

    fn seeded() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_locations(vec![Location {
            id: LocationId::from("1"),
            name: "우도".to_string(),
            latitude: 33.5,
            longitude: 126.95,
            address: None,
            category: None,
            dist: None,
            crowd_sum: Some(0),
            crowd_count: Some(0),
            parking_sum: Some(0),
            parking_count: Some(0),
        }]))
    }

    /// Waits one second of (paused) time for an event.
    async fn next_event(sub: &mut Subscription) -> Option<ChangeEvent> {
        tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test(start_paused = true)]
    async fn emits_one_event_per_changed_table() {
        let store = seeded();
        let feed = PollingFeed::new(store.clone(), INTERVAL);
        let mut sub = feed.subscribe().unwrap();
        let id = LocationId::from("1");

        // Baseline tick at t=0.
        assert_eq!(next_event(&mut sub).await, None);

        store
            .insert_report(&NewReport::for_dimension(
                id.clone(),
                Dimension::Congestion,
                Level::High,
                None,
            ))
            .await
            .unwrap();
        tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;
        assert_eq!(
            next_event(&mut sub).await,
            Some(ChangeEvent {
                table: Table::Reports,
                kind: ChangeKind::Unknown,
            })
        );
        assert_eq!(next_event(&mut sub).await, None);

        // A failed poll is skipped and the previous baseline kept.
        store.set_fail_reads(true);
        store
            .set_accumulator(&id, Dimension::Congestion, Accumulator::new(4, 1))
            .await
            .unwrap();
        tokio::time::sleep(INTERVAL).await;
        assert_eq!(next_event(&mut sub).await, None);

        store.set_fail_reads(false);
        tokio::time::sleep(INTERVAL - Duration::from_secs(2)).await;
        assert_eq!(
            next_event(&mut sub).await,
            Some(ChangeEvent {
                table: Table::Locations,
                kind: ChangeKind::Unknown,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_subscription_stops_polling() {
        let store = seeded();
        let feed = PollingFeed::new(store.clone(), INTERVAL);
        let sub = feed.subscribe().unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        // Held by the test, the feed and the polling task.
        assert_eq!(Arc::strong_count(&store), 3);

        drop(sub);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(Arc::strong_count(&store), 2);
    }

    #[test]
    fn reports_only_tables_that_changed() {
        let base = Fingerprint {
            locations: 1,
            reports: 10,
        };
        assert!(base.changed_tables(base).is_empty());
        assert_eq!(
            base.changed_tables(Fingerprint {
                locations: 1,
                reports: 11
            }),
            vec![Table::Reports]
        );
        assert_eq!(
            base.changed_tables(Fingerprint {
                locations: 2,
                reports: 11
            }),
            vec![Table::Locations, Table::Reports]
        );
    }
}
