#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Client for the hosted `locations`/`reports` store.
//!
//! The store itself is an external `PostgREST` service. This crate
//! defines the narrow [`Store`] and [`ChangeFeed`] traits the rest of
//! the workspace programs against, plus three implementations:
//!
//! - [`rest::RestStore`] talks to `PostgREST` over HTTP.
//! - [`poll::PollingFeed`] detects table changes on any [`poll::PollSource`] by
//!   fingerprinting both tables on an interval.
//! - [`memory::MemoryStore`] keeps everything in process and notifies
//!   subscribers synchronously on every write.

pub mod memory;
pub mod poll;
pub mod rest;

use async_trait::async_trait;
use mozzi_location_models::{
    Accumulator, Dimension, Level, Location, LocationId, NewLocation, NewReport,
};
use strum_macros::{AsRefStr, Display, EnumString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Buffer size for change-event channels.
///
/// Any single pending event already triggers a full re-fetch, so events
/// that arrive while the buffer is full are dropped.
pub const CHANGE_CHANNEL_BUFFER: usize = 16;

/// Errors that can occur talking to the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store rejected the request (constraint violation, RLS, etc.).
    #[error("Store rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Primary error message.
        message: String,
        /// Additional detail, when the store supplied any.
        details: Option<String>,
        /// Suggested fix, when the store supplied one.
        hint: Option<String>,
    },

    /// A write that should have returned a row returned none.
    #[error("Store returned no row for {table}")]
    MissingRow {
        /// Table the row was expected from.
        table: Table,
    },

    /// The referenced location does not exist.
    #[error("Unknown location: {0}")]
    UnknownLocation(LocationId),
}

/// Tables that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    /// The `locations` table.
    Locations,
    /// The `reports` table.
    Reports,
}

/// What happened to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
    /// Something changed but the feed cannot tell what.
    Unknown,
}

/// A single change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Table the change happened in.
    pub table: Table,
    /// Kind of change.
    pub kind: ChangeKind,
}

/// A live change-feed subscription.
///
/// Events arrive through [`Subscription::recv`]. Dropping the
/// subscription unsubscribes: the receiver closes and any producer task
/// backing it is aborted.
pub struct Subscription {
    rx: mpsc::Receiver<ChangeEvent>,
    producer: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wraps a receiver and the task feeding it, if any.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<ChangeEvent>, producer: Option<JoinHandle<()>>) -> Self {
        Self { rx, producer }
    }

    /// Waits for the next change event.
    ///
    /// Returns `None` once the feed has shut down.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

/// Read/write access to the hosted tables.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetches every location row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the request or decoding fails.
    async fn fetch_locations(&self) -> Result<Vec<Location>, StoreError>;

    /// Appends a report row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store rejects the row.
    async fn insert_report(&self, report: &NewReport) -> Result<(), StoreError>;

    /// Overwrites one dimension's accumulator on a location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    async fn set_accumulator(
        &self,
        id: &LocationId,
        dimension: Dimension,
        acc: Accumulator,
    ) -> Result<(), StoreError>;

    /// Adds one report at `level` to a location's accumulator inside the
    /// store, without a client-side read.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the increment fails.
    async fn increment_accumulator(
        &self,
        id: &LocationId,
        dimension: Dimension,
        level: Level,
    ) -> Result<(), StoreError>;

    /// Inserts a location and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails or no row comes back.
    async fn insert_location(&self, location: &NewLocation) -> Result<Location, StoreError>;
}

/// Source of change notifications for both tables.
pub trait ChangeFeed: Send + Sync {
    /// Opens a new subscription.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the feed cannot be opened.
    fn subscribe(&self) -> Result<Subscription, StoreError>;
}
