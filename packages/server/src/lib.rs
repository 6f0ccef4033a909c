#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web map feed for the mozzi map.
//!
//! Serves a read-only JSON view of the synced location list (scores,
//! search, recommendations and `GeoJSON` markers) for web map clients.
//! The list is kept current by a running sync controller; writes go
//! through the client flows only.

mod handlers;
pub mod interactive;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use mozzi_app::config::Config;
use mozzi_app::sync::SyncController;

/// Shared application state.
pub struct AppState {
    /// Owner of the location snapshot being served.
    pub sync: Arc<SyncController>,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/locations", web::get().to(handlers::locations))
            .route("/locations/{id}", web::get().to(handlers::location))
            .route("/search", web::get().to(handlers::search))
            .route("/recommendations", web::get().to(handlers::recommendations))
            .route("/markers", web::get().to(handlers::markers)),
    );
}

/// Starts the HTTP server and blocks until it shuts down.
///
/// Reads the store configuration from the environment, starts a sync
/// controller, and binds to `BIND_ADDR`:`PORT` (default
/// `127.0.0.1:8080`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if configuration is missing, the
/// change feed cannot be started, or the server fails to bind.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    // The CLI may have installed a logger already.
    let _ = pretty_env_logger::try_init_custom_env("RUST_LOG");

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let app = mozzi_app::App::connect(config).map_err(std::io::Error::other)?;

    log::info!("Loading locations...");
    let _sync_handle = app.start().await.map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState {
        sync: Arc::clone(app.sync()),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use mozzi_location_models::{Location, LocationId};
    use mozzi_store::memory::MemoryStore;

    fn row(id: &str, name: &str, crowd: (i64, i64)) -> Location {
        Location {
            id: LocationId::from(id),
            name: name.to_string(),
            latitude: 33.4,
            longitude: 126.5,
            address: None,
            category: None,
            dist: None,
            crowd_sum: Some(crowd.0),
            crowd_count: Some(crowd.1),
            parking_sum: None,
            parking_count: None,
        }
    }

    async fn state() -> web::Data<AppState> {
        let store = Arc::new(MemoryStore::with_locations(vec![
            row("1", "애월 해변", (2, 1)),
            row("2", "성산 일출봉", (10, 2)),
            row("3", "협재 해수욕장", (1, 1)),
            row("4", "우도", (3, 1)),
        ]));
        let sync = Arc::new(SyncController::new(store));
        sync.refresh().await;
        web::Data::new(AppState { sync })
    }

    macro_rules! service {
        ($state:expr) => {
            test::init_service(App::new().app_data($state).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn health_reports_snapshot() {
        let app = service!(state().await);
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["syncVersion"], 1);
        assert_eq!(body["locations"], 4);
    }

    #[actix_web::test]
    async fn lists_and_finds_locations() {
        let app = service!(state().await);

        let req = test::TestRequest::get().uri("/api/locations").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 4);

        let req = test::TestRequest::get().uri("/api/locations/2").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "성산 일출봉");
        assert_eq!(body["congestion"]["level"], 5);

        let req = test::TestRequest::get().uri("/api/locations/99").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn search_matches_substring() {
        let app = service!(state().await);

        let req = test::TestRequest::get()
            .uri("/api/search?q=%EC%95%A0%EC%9B%94")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], "1");

        let req = test::TestRequest::get().uri("/api/search").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn recommendations_exclude_selected() {
        let app = service!(state().await);

        let req = test::TestRequest::get()
            .uri("/api/recommendations?selected=3")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "4"]);

        // Without a selection the first location is the home card.
        let req = test::TestRequest::get()
            .uri("/api/recommendations")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["3", "4"]);
    }

    #[actix_web::test]
    async fn markers_are_geojson() {
        let app = service!(state().await);
        let req = test::TestRequest::get()
            .uri("/api/markers?selected=2")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/geo+json"
        );

        let body: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(body["type"], "FeatureCollection");
        assert_eq!(body["features"].as_array().unwrap().len(), 4);
        assert_eq!(body["view"]["zoom"], 12);
    }
}
