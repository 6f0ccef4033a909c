//! Adding new places.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mozzi_geocoder::{FAILURE_MESSAGE, GeocodeError, GeocodeService, GeocodedPlace};
use mozzi_location_models::{Location, NewLocation};
use mozzi_store::{Store, StoreError};
use thiserror::Error;

use crate::sync::SyncController;

/// Errors from the add-place flow.
#[derive(Debug, Error)]
pub enum PlaceError {
    /// Name, latitude or longitude is blank.
    #[error("Name, latitude and longitude are all required")]
    Incomplete,

    /// A coordinate field is not a usable number.
    #[error("Invalid {field}: {value:?}")]
    InvalidCoordinate {
        /// `"latitude"` or `"longitude"`.
        field: &'static str,
        /// Text as entered.
        value: String,
    },

    /// Another place is already being added.
    #[error("A place is already being added")]
    Busy,

    /// The store refused the insert.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The address lookup failed.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    /// The address lookup found nothing.
    #[error("No coordinates found for {0:?}")]
    NoMatch(String),
}

impl PlaceError {
    /// Short message for the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Geocode(_) | Self::NoMatch(_) => FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// The add-place form, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPlaceForm {
    /// Place name.
    pub name: String,
    /// Latitude text.
    pub lat: String,
    /// Longitude text.
    pub lng: String,
}

impl NewPlaceForm {
    /// Creates a form from its three fields.
    #[must_use]
    pub fn new(name: impl Into<String>, lat: impl Into<String>, lng: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lat: lat.into(),
            lng: lng.into(),
        }
    }

    /// Whether every field has a value.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.lat, &self.lng]
            .iter()
            .all(|f| !f.trim().is_empty())
    }

    /// Validates the form into an insertable row.
    ///
    /// # Errors
    ///
    /// Returns [`PlaceError::Incomplete`] or
    /// [`PlaceError::InvalidCoordinate`].
    pub fn to_new_location(&self) -> Result<NewLocation, PlaceError> {
        if !self.is_complete() {
            return Err(PlaceError::Incomplete);
        }
        let latitude = parse_coordinate("latitude", &self.lat, 90.0)?;
        let longitude = parse_coordinate("longitude", &self.lng, 180.0)?;
        Ok(NewLocation::new(self.name.trim(), latitude, longitude))
    }

    /// Fills name and coordinates from a geocoding result.
    pub fn fill_from(&mut self, place: &GeocodedPlace) {
        self.name.clone_from(&place.name);
        self.lat = place.latitude.to_string();
        self.lng = place.longitude.to_string();
    }

    /// Empties every field.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn parse_coordinate(field: &'static str, text: &str, limit: f64) -> Result<f64, PlaceError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= limit)
        .ok_or_else(|| PlaceError::InvalidCoordinate {
            field,
            value: text.to_string(),
        })
}

/// Clears the `adding` flag even if the insert is cancelled.
struct AddingGuard<'a>(&'a AtomicBool);

impl Drop for AddingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Creates locations and fills the form from address lookups.
pub struct PlaceCreator {
    store: Arc<dyn Store>,
    sync: Arc<SyncController>,
    geocoder: Option<Arc<dyn GeocodeService>>,
    adding: AtomicBool,
}

impl PlaceCreator {
    /// Creates the flow. Address lookup is unavailable without a geocoder.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        sync: Arc<SyncController>,
        geocoder: Option<Arc<dyn GeocodeService>>,
    ) -> Self {
        Self {
            store,
            sync,
            geocoder,
            adding: AtomicBool::new(false),
        }
    }

    /// Whether an insert is in flight.
    #[must_use]
    pub fn is_adding(&self) -> bool {
        self.adding.load(Ordering::SeqCst)
    }

    /// Inserts the place described by `form`.
    ///
    /// On success the form is cleared, the list is re-synced and the new
    /// row is returned. On failure the form is left untouched so the user
    /// can retry.
    ///
    /// # Errors
    ///
    /// Returns [`PlaceError`] if the form is invalid, another insert is in
    /// flight, or the store refuses the row.
    pub async fn create(&self, form: &mut NewPlaceForm) -> Result<Location, PlaceError> {
        let new = form.to_new_location()?;

        if self.adding.swap(true, Ordering::SeqCst) {
            return Err(PlaceError::Busy);
        }
        let result = {
            let _adding = AddingGuard(&self.adding);
            self.store.insert_location(&new).await
        };

        match result {
            Ok(row) => {
                log::info!("Added place {} ({})", row.name, row.id);
                form.clear();
                self.sync.refresh().await;
                Ok(row)
            }
            Err(e) => {
                log_store_failure(&e);
                Err(e.into())
            }
        }
    }

    /// Looks up `address` and fills the form with the result.
    ///
    /// # Errors
    ///
    /// Returns [`PlaceError::Geocode`] or [`PlaceError::NoMatch`]; both
    /// surface as the same user message.
    pub async fn fill_from_address(
        &self,
        address: &str,
        form: &mut NewPlaceForm,
    ) -> Result<GeocodedPlace, PlaceError> {
        let geocoder = self
            .geocoder
            .as_ref()
            .ok_or(PlaceError::Geocode(GeocodeError::NoProviders))?;

        match geocoder.geocode(address).await {
            Ok(Some(place)) => {
                form.fill_from(&place);
                Ok(place)
            }
            Ok(None) => {
                log::warn!("No coordinates for '{address}'");
                Err(PlaceError::NoMatch(address.to_string()))
            }
            Err(e) => {
                log::warn!("Geocoding '{address}' failed: {e}");
                Err(e.into())
            }
        }
    }
}

fn log_store_failure(err: &StoreError) {
    match err {
        StoreError::Rejected {
            status,
            message,
            details,
            hint,
        } => log::error!(
            "Failed to add place ({status}): {message} details={} hint={}",
            details.as_deref().unwrap_or("-"),
            hint.as_deref().unwrap_or("-"),
        ),
        other => log::error!("Failed to add place: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mozzi_geocoder::GeocodingProvider;
    use mozzi_location_models::{
        Accumulator, DEFAULT_CATEGORY, DEFAULT_DIST, Dimension, Level, LocationId, NewReport,
    };
    use mozzi_store::memory::MemoryStore;
    use std::time::Duration;

    fn creator(store: &Arc<MemoryStore>, geocoder: Option<Arc<dyn GeocodeService>>) -> PlaceCreator {
        let sync = Arc::new(SyncController::new(store.clone()));
        PlaceCreator::new(store.clone(), sync, geocoder)
    }

    #[tokio::test]
    async fn adds_place_with_zeroed_totals() {
        let store = Arc::new(MemoryStore::new());
        let places = creator(&store, None);
        let mut form = NewPlaceForm::new("성산 일출봉", "33.4586", "126.9427");

        let row = places.create(&mut form).await.unwrap();
        assert_eq!(form, NewPlaceForm::default());
        assert!(!places.is_adding());

        assert_eq!(row.name, "성산 일출봉");
        assert!((row.latitude - 33.4586).abs() < 1e-9);
        assert_eq!(row.category.as_deref(), Some(DEFAULT_CATEGORY));
        assert_eq!(row.dist.as_deref(), Some(DEFAULT_DIST));
        for dimension in Dimension::ALL {
            assert_eq!(row.accumulator(dimension), Accumulator::new(0, 0));
        }
        assert!(places.sync.snapshot().find(&row.id).is_some());
    }

    #[tokio::test]
    async fn incomplete_or_bad_form_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let places = creator(&store, None);

        let mut form = NewPlaceForm::new("협재", "", "126.2");
        assert!(matches!(
            places.create(&mut form).await,
            Err(PlaceError::Incomplete)
        ));

        let mut form = NewPlaceForm::new("협재", "north", "126.2");
        assert!(matches!(
            places.create(&mut form).await,
            Err(PlaceError::InvalidCoordinate {
                field: "latitude",
                ..
            })
        ));
        assert_eq!(form.lat, "north");

        let mut form = NewPlaceForm::new("협재", "33.3", "526.2");
        assert!(places.create(&mut form).await.is_err());
        assert!(store.fetch_locations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_keeps_form() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_writes(true);
        let places = creator(&store, None);
        let mut form = NewPlaceForm::new("협재", "33.39", "126.23");

        let err = places.create(&mut form).await.unwrap_err();
        assert!(matches!(err, PlaceError::Store(_)));
        assert_eq!(form, NewPlaceForm::new("협재", "33.39", "126.23"));
        assert!(!places.is_adding());
    }

    struct FixedGeocoder(Option<GeocodedPlace>);

    #[async_trait]
    impl GeocodeService for FixedGeocoder {
        async fn geocode(&self, _address: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn address_lookup_fills_form() {
        let store = Arc::new(MemoryStore::new());
        let place = GeocodedPlace {
            name: "애월 해변 카페".to_string(),
            address: "제주특별자치도 제주시 애월읍".to_string(),
            latitude: 33.4628,
            longitude: 126.3094,
            provider: GeocodingProvider::Kakao,
        };
        let places = creator(&store, Some(Arc::new(FixedGeocoder(Some(place)))));
        let mut form = NewPlaceForm::default();

        places
            .fill_from_address("애월해안로 272", &mut form)
            .await
            .unwrap();
        assert_eq!(form.name, "애월 해변 카페");
        assert_eq!(form.lat, "33.4628");
        assert_eq!(form.lng, "126.3094");
        assert!(form.is_complete());
    }

    #[tokio::test]
    async fn failed_lookup_uses_failure_message() {
        let store = Arc::new(MemoryStore::new());
        let places = creator(&store, Some(Arc::new(FixedGeocoder(None))));
        let mut form = NewPlaceForm::new("keep", "", "");

        let err = places
            .fill_from_address("없는 주소", &mut form)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), FAILURE_MESSAGE);
        assert_eq!(form.name, "keep");

        let places = creator(&store, None);
        let err = places
            .fill_from_address("없는 주소", &mut form)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), FAILURE_MESSAGE);
    }

    /// Never finishes an insert while `hang` is set.
    #[derive(Default)]
    struct HangingStore {
        inner: MemoryStore,
        hang: AtomicBool,
    }

    #[async_trait]
    impl Store for HangingStore {
        async fn fetch_locations(&self) -> Result<Vec<Location>, StoreError> {
            self.inner.fetch_locations().await
        }

        async fn insert_report(&self, report: &NewReport) -> Result<(), StoreError> {
            self.inner.insert_report(report).await
        }

        async fn set_accumulator(
            &self,
            id: &LocationId,
            dimension: Dimension,
            acc: Accumulator,
        ) -> Result<(), StoreError> {
            self.inner.set_accumulator(id, dimension, acc).await
        }

        async fn increment_accumulator(
            &self,
            id: &LocationId,
            dimension: Dimension,
            level: Level,
        ) -> Result<(), StoreError> {
            self.inner.increment_accumulator(id, dimension, level).await
        }

        async fn insert_location(&self, location: &NewLocation) -> Result<Location, StoreError> {
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner.insert_location(location).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_insert_clears_adding_flag() {
        let store = Arc::new(HangingStore::default());
        store.hang.store(true, Ordering::SeqCst);
        let sync = Arc::new(SyncController::new(store.clone()));
        let places = PlaceCreator::new(store.clone(), sync, None);
        let mut form = NewPlaceForm::new("우도", "33.5", "126.95");

        let cancelled =
            tokio::time::timeout(Duration::from_secs(1), places.create(&mut form)).await;
        assert!(cancelled.is_err());
        assert!(!places.is_adding());
        assert_eq!(form, NewPlaceForm::new("우도", "33.5", "126.95"));

        store.hang.store(false, Ordering::SeqCst);
        let row = places.create(&mut form).await.unwrap();
        assert_eq!(row.name, "우도");
    }
}
