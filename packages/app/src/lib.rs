#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Client flows for the mozzi map.
//!
//! [`App`] wires a store, a change feed, an auth service and an optional
//! geocoder into the flows a front end drives: keeping the list in sync,
//! reporting congestion and parking, adding places, and signing in and
//! out. View state ([`view::ViewState`]) is owned by the front end and
//! passed in where a flow changes it.

pub mod config;
pub mod places;
pub mod recommend;
pub mod session;
pub mod submit;
pub mod sync;
pub mod view;

use std::sync::Arc;

use mozzi_auth::gotrue::GoTrueAuth;
use mozzi_auth::{AuthError, AuthService, CONFIRMATION_SENT_MESSAGE, SignUpOutcome, User};
use mozzi_geocoder::{FallbackGeocoder, GeocodeService};
use mozzi_location_models::{Dimension, Level, Location};
use mozzi_store::poll::PollingFeed;
use mozzi_store::rest::RestStore;
use mozzi_store::{ChangeFeed, Store, StoreError};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::places::{NewPlaceForm, PlaceCreator, PlaceError};
use crate::session::SessionToken;
use crate::submit::{ReportSubmitter, SubmitOutcome, SubmitRejection};
use crate::sync::{SyncController, SyncHandle};
use crate::view::ViewState;

/// Errors from building an [`App`].
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The store client could not be created.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The assembled client.
pub struct App {
    config: Config,
    auth: Arc<dyn AuthService>,
    feed: Arc<dyn ChangeFeed>,
    sync: Arc<SyncController>,
    submitter: ReportSubmitter,
    places: PlaceCreator,
}

impl App {
    /// Assembles an app from explicit parts.
    #[must_use]
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        feed: Arc<dyn ChangeFeed>,
        auth: Arc<dyn AuthService>,
        geocoder: Option<Arc<dyn GeocodeService>>,
    ) -> Self {
        let sync = Arc::new(SyncController::new(Arc::clone(&store)));
        let submitter = ReportSubmitter::new(
            Arc::clone(&store),
            Arc::clone(&sync),
            config.cooldown,
            config.increment_mode,
        );
        let places = PlaceCreator::new(store, Arc::clone(&sync), geocoder);

        Self {
            config,
            auth,
            feed,
            sync,
            submitter,
            places,
        }
    }

    /// Connects to the hosted store and auth service described by
    /// `config`.
    ///
    /// A geocoder that cannot be configured is logged and left out; the
    /// rest of the app works without it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the project URL or key is missing or the
    /// HTTP client cannot be built.
    pub fn connect(config: Config) -> Result<Self, AppError> {
        let (url, anon_key) = config.hosted()?;

        let auth = Arc::new(GoTrueAuth::new(url, anon_key));
        let store = Arc::new(
            RestStore::new(url, anon_key)?
                .with_access_token(Arc::new(SessionToken::new(auth.watch()))),
        );
        let polled = Arc::clone(&store);
        let feed = Arc::new(PollingFeed::new(polled, config.poll_interval));

        let kakao_key = config.kakao_api_key.clone();
        let geocoder: Option<Arc<dyn GeocodeService>> =
            match FallbackGeocoder::from_registry(|var| {
                if var == "KAKAO_REST_API_KEY" {
                    kakao_key.clone()
                } else {
                    std::env::var(var).ok()
                }
            }) {
                Ok(geocoder) => Some(Arc::new(geocoder)),
                Err(e) => {
                    log::warn!("Address lookup disabled: {e}");
                    None
                }
            };

        log::info!(
            "Connected to {url} (increment mode: {}, poll every {:?})",
            config.increment_mode,
            config.poll_interval
        );
        Ok(Self::new(config, store, feed, auth, geocoder))
    }

    /// Loads the list and starts following changes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the change feed cannot be subscribed to.
    pub async fn start(&self) -> Result<SyncHandle, StoreError> {
        self.sync.start(self.feed.as_ref()).await
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The synced location list.
    #[must_use]
    pub const fn sync(&self) -> &Arc<SyncController> {
        &self.sync
    }

    /// The auth service.
    #[must_use]
    pub const fn auth(&self) -> &Arc<dyn AuthService> {
        &self.auth
    }

    /// The report flow.
    #[must_use]
    pub const fn submitter(&self) -> &ReportSubmitter {
        &self.submitter
    }

    /// The add-place flow.
    #[must_use]
    pub const fn places(&self) -> &PlaceCreator {
        &self.places
    }

    /// The signed-in user, if any. Session errors count as signed out.
    pub async fn current_user(&self) -> Option<User> {
        match self.auth.current_session().await {
            Ok(session) => session.map(|s| s.user),
            Err(e) => {
                log::warn!("Could not restore session: {e}");
                None
            }
        }
    }

    /// Reports `level` for the location on the home card.
    ///
    /// A gating rejection is also written to the view's auth message. On
    /// success the reported location stays selected.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitRejection`] when nobody is signed in or the rating
    /// is still locked. Returns `Ok(None)` when there is no location to
    /// rate.
    pub async fn report_selected(
        &self,
        view: &mut ViewState,
        dimension: Dimension,
        level: Level,
        comment: Option<String>,
    ) -> Result<Option<SubmitOutcome>, SubmitRejection> {
        let snapshot = self.sync.snapshot();
        let Some(selected) = view.selected(&snapshot.locations) else {
            return Ok(None);
        };
        let location_id = selected.id().clone();

        let result = self
            .submitter
            .submit(view.user(), &location_id, dimension, level, comment)
            .await;

        match &result {
            Ok(SubmitOutcome::Recorded { location_id }) => view.select(location_id.clone()),
            Err(rejection @ SubmitRejection::Anonymous(_)) => {
                view.set_auth_message(rejection.to_string());
            }
            Ok(SubmitOutcome::Failed { .. }) | Err(SubmitRejection::Busy) => {}
        }
        result.map(Some)
    }

    /// Adds the place in `form`, then selects it and returns home.
    ///
    /// # Errors
    ///
    /// Returns [`PlaceError`]; the form is kept for a retry.
    pub async fn add_place(
        &self,
        view: &mut ViewState,
        form: &mut NewPlaceForm,
    ) -> Result<Location, PlaceError> {
        let row = self.places.create(form).await?;
        view.place_added(row.id.clone());
        Ok(row)
    }

    /// Signs in and updates the view.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`]; its user message is also written to the
    /// view.
    pub async fn sign_in(
        &self,
        view: &mut ViewState,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        match self.auth.sign_in(email, password).await {
            Ok(session) => {
                view.on_session(Some(&session));
                Ok(())
            }
            Err(e) => {
                view.set_auth_message(e.user_message());
                Err(e)
            }
        }
    }

    /// Signs up and updates the view.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`]; its user message is also written to the
    /// view.
    pub async fn sign_up(
        &self,
        view: &mut ViewState,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        match self.auth.sign_up(email, password).await {
            Ok(outcome) => {
                match &outcome {
                    SignUpOutcome::SignedIn(session) => view.on_session(Some(session)),
                    SignUpOutcome::ConfirmationSent => {
                        view.set_auth_message(CONFIRMATION_SENT_MESSAGE);
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                view.set_auth_message(e.user_message());
                Err(e)
            }
        }
    }

    /// Signs out; the view keeps browsing anonymously.
    pub async fn sign_out(&self, view: &mut ViewState) {
        if let Err(e) = self.auth.sign_out().await {
            log::warn!("Sign-out failed: {e}");
        }
        view.on_session(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{AuthScreen, Tab};
    use mozzi_auth::memory::MemoryAuth;
    use mozzi_location_models::LocationId;
    use mozzi_store::memory::MemoryStore;

    fn app(store: &Arc<MemoryStore>, auth: MemoryAuth) -> App {
        App::new(
            Config::default(),
            store.clone(),
            store.clone(),
            Arc::new(auth),
            None,
        )
    }

    fn seeded() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_locations(vec![Location {
            id: LocationId::from("1"),
            name: "애월 해변".to_string(),
            latitude: 33.4628,
            longitude: 126.3094,
            address: None,
            category: None,
            dist: None,
            crowd_sum: Some(3),
            crowd_count: Some(1),
            parking_sum: Some(2),
            parking_count: Some(1),
        }]))
    }

    #[tokio::test]
    async fn anonymous_report_sets_prompt() {
        let store = seeded();
        let app = app(&store, MemoryAuth::default());
        app.sync().refresh().await;
        let mut view = ViewState::new();
        view.browse();

        let err = app
            .report_selected(&mut view, Dimension::Congestion, Level::High, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitRejection::Anonymous(_)));
        assert_eq!(view.auth_message(), Some(submit::ANONYMOUS_CONGESTION_MESSAGE));
        assert!(store.reports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn signed_in_report_keeps_selection() {
        let store = seeded();
        let app = app(
            &store,
            MemoryAuth::default().with_account("a@jeju.kr", "secret1"),
        );
        let handle = app.start().await.unwrap();
        let mut view = ViewState::new();
        app.sign_in(&mut view, "a@jeju.kr", "secret1").await.unwrap();
        assert_eq!(view.auth_screen(), AuthScreen::App);

        let outcome = app
            .report_selected(&mut view, Dimension::Parking, Level::VeryHigh, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Recorded {
                location_id: LocationId::from("1")
            }
        );

        let snap = app.sync().snapshot();
        let selected = view.selected(&snap.locations).unwrap();
        assert_eq!(selected.id().as_str(), "1");
        assert!((selected.scores.parking - 3.5).abs() < f64::EPSILON);
        assert_eq!(store.reports()[0].comment, "주차 제보");

        handle.stop().await;
    }

    #[tokio::test]
    async fn adding_place_selects_it() {
        let store = seeded();
        let app = app(&store, MemoryAuth::default());
        let mut view = ViewState::new();
        view.set_tab(Tab::Add);
        let mut form = NewPlaceForm::new("성산 일출봉", "33.4586", "126.9427");

        let row = app.add_place(&mut view, &mut form).await.unwrap();
        assert_eq!(view.tab(), Tab::Home);
        let snap = app.sync().snapshot();
        assert_eq!(view.selected(&snap.locations).unwrap().id(), &row.id);
        assert_eq!(snap.locations.len(), 2);
    }

    #[tokio::test]
    async fn auth_messages() {
        let store = seeded();
        let app = app(&store, MemoryAuth::new(true));
        let mut view = ViewState::new();

        let outcome = app.sign_up(&mut view, "b@jeju.kr", "secret1").await.unwrap();
        assert_eq!(outcome, SignUpOutcome::ConfirmationSent);
        assert_eq!(view.auth_message(), Some(CONFIRMATION_SENT_MESSAGE));
        assert_eq!(view.auth_screen(), AuthScreen::Login);

        assert!(app.sign_in(&mut view, "b@jeju.kr", "wrong").await.is_err());
        assert_eq!(view.auth_message(), Some("Invalid login credentials"));

        app.sign_out(&mut view).await;
        assert!(view.is_anonymous());
        assert!(app.current_user().await.is_none());
    }
}
