//! Congestion and parking reports.
//!
//! Each (location, dimension) pair has its own lock:
//! `Idle -> Submitting -> Cooldown(until) -> Idle`. A report can only
//! start from `Idle`. Cooldown is entered whatever the outcome and
//! expires lazily: the next lookup after the deadline sees `Idle`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mozzi_auth::User;
use mozzi_location_models::{Dimension, Level, LocationId, NewReport};
use mozzi_store::{Store, StoreError};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::IncrementMode;
use crate::sync::SyncController;

/// Shown when an anonymous user tries to rate congestion.
pub const ANONYMOUS_CONGESTION_MESSAGE: &str = "회원가입 후 제보가 가능합니다. 🌿";

/// Shown when an anonymous user tries to rate parking.
pub const ANONYMOUS_PARKING_MESSAGE: &str = "회원가입 후 주차 제보가 가능합니다. 🚗";

/// The sign-up prompt for a dimension.
#[must_use]
pub const fn anonymous_message(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Congestion => ANONYMOUS_CONGESTION_MESSAGE,
        Dimension::Parking => ANONYMOUS_PARKING_MESSAGE,
    }
}

/// Observable state of one rating lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingState {
    /// Ready for a report.
    Idle,
    /// A report is being written.
    Submitting,
    /// A report just finished; new ones are refused until the deadline.
    Cooldown {
        /// When the lock returns to idle.
        until: Instant,
    },
}

type LockKey = (LocationId, Dimension);

/// Rating locks keyed by (location, dimension).
pub struct SubmissionLocks {
    cooldown: Duration,
    states: Mutex<HashMap<LockKey, RatingState>>,
}

impl SubmissionLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Current state of one lock.
    #[must_use]
    pub fn state(&self, location_id: &LocationId, dimension: Dimension) -> RatingState {
        let key = (location_id.clone(), dimension);
        let mut states = self.lock();
        Self::current(&mut states, &key)
    }

    fn current(states: &mut HashMap<LockKey, RatingState>, key: &LockKey) -> RatingState {
        match states.get(key) {
            Some(RatingState::Cooldown { until }) if Instant::now() >= *until => {
                states.remove(key);
                RatingState::Idle
            }
            Some(state) => *state,
            None => RatingState::Idle,
        }
    }

    /// Moves an idle lock to `Submitting`. The returned guard puts it into
    /// cooldown when dropped.
    fn acquire(&self, location_id: &LocationId, dimension: Dimension) -> Option<LockGuard<'_>> {
        let key = (location_id.clone(), dimension);
        let mut states = self.lock();
        if Self::current(&mut states, &key) != RatingState::Idle {
            return None;
        }
        states.insert(key.clone(), RatingState::Submitting);
        Some(LockGuard { locks: self, key })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<LockKey, RatingState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct LockGuard<'a> {
    locks: &'a SubmissionLocks,
    key: LockKey,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let until = Instant::now() + self.locks.cooldown;
        self.locks
            .lock()
            .insert(self.key.clone(), RatingState::Cooldown { until });
    }
}

/// Why a report was refused before anything was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    /// Nobody is signed in. Carries the sign-up prompt to show.
    #[error("{0}")]
    Anonymous(&'static str),

    /// The same place and dimension is being submitted or cooling down.
    #[error("A report for this place is still being processed")]
    Busy,
}

/// What happened to an accepted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The report and the accumulator update were written and the list
    /// re-synced. The view should keep `location_id` selected.
    Recorded {
        /// Location to keep selected.
        location_id: LocationId,
    },
    /// A store call failed. Nothing was retried.
    Failed {
        /// Location the report was for.
        location_id: LocationId,
        /// Store error text, already logged.
        error: String,
    },
}

/// Writes reports and keeps running totals up to date.
pub struct ReportSubmitter {
    store: Arc<dyn Store>,
    sync: Arc<SyncController>,
    locks: SubmissionLocks,
    mode: IncrementMode,
}

impl ReportSubmitter {
    /// Creates a submitter.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        sync: Arc<SyncController>,
        cooldown: Duration,
        mode: IncrementMode,
    ) -> Self {
        Self {
            store,
            sync,
            locks: SubmissionLocks::new(cooldown),
            mode,
        }
    }

    /// The rating locks, for showing a "reported" state.
    #[must_use]
    pub const fn locks(&self) -> &SubmissionLocks {
        &self.locks
    }

    /// Reports `level` for one dimension of a location.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitRejection`] without touching the store when nobody
    /// is signed in or the lock for this location and dimension is taken.
    pub async fn submit(
        &self,
        user: Option<&User>,
        location_id: &LocationId,
        dimension: Dimension,
        level: Level,
        comment: Option<String>,
    ) -> Result<SubmitOutcome, SubmitRejection> {
        let Some(user) = user else {
            return Err(SubmitRejection::Anonymous(anonymous_message(dimension)));
        };
        let Some(_guard) = self.locks.acquire(location_id, dimension) else {
            log::debug!("Ignoring {dimension} report for {location_id}: busy");
            return Err(SubmitRejection::Busy);
        };

        log::info!(
            "User {} reports {dimension} {} for {location_id}",
            user.id,
            level.value()
        );

        match self.record(location_id, dimension, level, comment).await {
            Ok(()) => {
                self.sync.refresh().await;
                Ok(SubmitOutcome::Recorded {
                    location_id: location_id.clone(),
                })
            }
            Err(e) => {
                log::error!("Failed to record {dimension} report for {location_id}: {e}");
                Ok(SubmitOutcome::Failed {
                    location_id: location_id.clone(),
                    error: e.to_string(),
                })
            }
        }
    }

    async fn record(
        &self,
        location_id: &LocationId,
        dimension: Dimension,
        level: Level,
        comment: Option<String>,
    ) -> Result<(), StoreError> {
        // Client mode rewrites the totals, so they must come from a synced row.
        let prior = match self.mode {
            IncrementMode::Client => Some(
                self.sync
                    .snapshot()
                    .find(location_id)
                    .map(|s| s.location.accumulator(dimension))
                    .ok_or_else(|| StoreError::UnknownLocation(location_id.clone()))?,
            ),
            IncrementMode::Server => None,
        };

        let report = NewReport::for_dimension(location_id.clone(), dimension, level, comment);
        self.store.insert_report(&report).await?;

        match prior {
            Some(prior) => {
                self.store
                    .set_accumulator(location_id, dimension, prior.with_report(level))
                    .await
            }
            None => {
                self.store
                    .increment_accumulator(location_id, dimension, level)
                    .await
            }
        }
    }
}
