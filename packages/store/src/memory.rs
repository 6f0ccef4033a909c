//! In-process store with a synchronous change feed.
//!
//! Every successful write notifies all live subscribers immediately.
//! Reads and writes can be switched to fail so callers can exercise
//! their error paths.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mozzi_location_models::{
    Accumulator, Dimension, Level, Location, LocationId, NewLocation, NewReport,
};
use tokio::sync::mpsc;

use crate::{
    CHANGE_CHANNEL_BUFFER, ChangeEvent, ChangeFeed, ChangeKind, Store, StoreError, Subscription,
    Table,
};

#[derive(Default)]
struct Tables {
    locations: Vec<Location>,
    reports: Vec<NewReport>,
}

/// A [`Store`] and [`ChangeFeed`] backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    listeners: Mutex<Vec<mpsc::Sender<ChangeEvent>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `locations`.
    #[must_use]
    pub fn with_locations(locations: Vec<Location>) -> Self {
        let store = Self::default();
        store.lock_tables().locations = locations;
        store
    }

    /// Makes every subsequent read fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of every report written so far.
    #[must_use]
    pub fn reports(&self) -> Vec<NewReport> {
        self.lock_tables().reports.clone()
    }

    /// Number of reports written so far.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] while reads are switched to fail.
    pub fn count_reports(&self) -> Result<u64, StoreError> {
        self.check(&self.fail_reads)?;
        Ok(u64::try_from(self.lock_tables().reports.len()).unwrap_or(u64::MAX))
    }

    /// Returns a copy of one location row.
    #[must_use]
    pub fn location(&self, id: &LocationId) -> Option<Location> {
        self.lock_tables()
            .locations
            .iter()
            .find(|l| &l.id == id)
            .cloned()
    }

    /// Number of subscribers that are still listening.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.lock_listeners();
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::Sender<ChangeEvent>>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected {
                status: 503,
                message: "memory store is set to fail".to_string(),
                details: None,
                hint: None,
            });
        }
        Ok(())
    }

    fn notify(&self, table: Table, kind: ChangeKind) {
        let event = ChangeEvent { table, kind };
        self.lock_listeners().retain(|tx| match tx.try_send(event) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    fn update_location(
        &self,
        id: &LocationId,
        update: impl FnOnce(&mut Location),
    ) -> Result<(), StoreError> {
        {
            let mut tables = self.lock_tables();
            let location = tables
                .locations
                .iter_mut()
                .find(|l| &l.id == id)
                .ok_or_else(|| StoreError::UnknownLocation(id.clone()))?;
            update(location);
        }
        self.notify(Table::Locations, ChangeKind::Update);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_locations(&self) -> Result<Vec<Location>, StoreError> {
        self.check(&self.fail_reads)?;
        Ok(self.lock_tables().locations.clone())
    }

    async fn insert_report(&self, report: &NewReport) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        self.lock_tables().reports.push(report.clone());
        self.notify(Table::Reports, ChangeKind::Insert);
        Ok(())
    }

    async fn set_accumulator(
        &self,
        id: &LocationId,
        dimension: Dimension,
        acc: Accumulator,
    ) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        self.update_location(id, |l| l.set_accumulator(dimension, acc))
    }

    async fn increment_accumulator(
        &self,
        id: &LocationId,
        dimension: Dimension,
        level: Level,
    ) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        self.update_location(id, |l| {
            let next = l.accumulator(dimension).with_report(level);
            l.set_accumulator(dimension, next);
        })
    }

    async fn insert_location(&self, location: &NewLocation) -> Result<Location, StoreError> {
        self.check(&self.fail_writes)?;
        let row = Location {
            id: LocationId::new(uuid::Uuid::new_v4().to_string()),
            name: location.name.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            address: Some(location.address.clone()),
            category: Some(location.category.clone()),
            dist: Some(location.dist.clone()),
            crowd_sum: Some(location.crowd_sum),
            crowd_count: Some(location.crowd_count),
            parking_sum: Some(location.parking_sum),
            parking_count: Some(location.parking_count),
        };
        self.lock_tables().locations.push(row.clone());
        self.notify(Table::Locations, ChangeKind::Insert);
        Ok(row)
    }
}

impl ChangeFeed for MemoryStore {
    fn subscribe(&self) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_BUFFER);
        self.lock_listeners().push(tx);
        Ok(Subscription::new(rx, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jeju() -> Location {
        Location {
            id: LocationId::from("1"),
            name: "애월 해변".to_string(),
            latitude: 33.4628,
            longitude: 126.3094,
            address: None,
            category: None,
            dist: None,
            crowd_sum: None,
            crowd_count: None,
            parking_sum: None,
            parking_count: None,
        }
    }

    #[tokio::test]
    async fn writes_notify_subscribers() {
        let store = MemoryStore::with_locations(vec![jeju()]);
        let mut sub = store.subscribe().unwrap();

        store
            .insert_report(&NewReport::for_dimension(
                LocationId::from("1"),
                Dimension::Congestion,
                Level::High,
                None,
            ))
            .await
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.table, Table::Reports);
        assert_eq!(event.kind, ChangeKind::Insert);
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned() {
        let store = MemoryStore::with_locations(vec![jeju()]);
        let sub = store.subscribe().unwrap();
        assert_eq!(store.listener_count(), 1);

        drop(sub);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn increment_adds_to_existing_totals() {
        let store = MemoryStore::with_locations(vec![jeju()]);
        let id = LocationId::from("1");

        store
            .increment_accumulator(&id, Dimension::Parking, Level::Moderate)
            .await
            .unwrap();
        store
            .increment_accumulator(&id, Dimension::Parking, Level::VeryHigh)
            .await
            .unwrap();

        let row = store.location(&id).unwrap();
        assert_eq!(row.accumulator(Dimension::Parking), Accumulator::new(8, 2));
        assert_eq!(row.accumulator(Dimension::Congestion), Accumulator::default());
    }

    #[tokio::test]
    async fn unknown_location_update_fails() {
        let store = MemoryStore::new();
        let err = store
            .set_accumulator(
                &LocationId::from("missing"),
                Dimension::Congestion,
                Accumulator::new(1, 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownLocation(_)));
    }

    #[tokio::test]
    async fn failing_reads_and_writes() {
        let store = MemoryStore::with_locations(vec![jeju()]);
        store.set_fail_reads(true);
        assert!(store.fetch_locations().await.is_err());
        store.set_fail_reads(false);
        assert_eq!(store.fetch_locations().await.unwrap().len(), 1);

        store.set_fail_writes(true);
        let err = store
            .insert_location(&NewLocation::new("x", 33.0, 126.0))
            .await;
        assert!(err.is_err());
        assert_eq!(store.fetch_locations().await.unwrap().len(), 1);
    }
}
