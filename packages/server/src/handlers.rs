//! HTTP handler functions for the map feed.

use actix_web::{HttpResponse, web};
use mozzi_aggregation::ScoredLocation;
use mozzi_app::recommend;
use mozzi_app::sync::Snapshot;
use mozzi_location_models::LocationId;
use mozzi_map::{GeoJsonRenderer, MapRenderer, MapView, markers as build_markers};
use mozzi_server_models::{ApiError, ApiHealth, ApiLocation, SearchParams, SelectionParams};

use crate::AppState;

fn to_api(list: &[&ScoredLocation]) -> Vec<ApiLocation> {
    list.iter().map(|l| ApiLocation::from(*l)).collect()
}

/// The selected location if it exists, else the first one.
fn resolve_selected<'a>(
    snapshot: &'a Snapshot,
    selected: Option<&LocationId>,
) -> Option<&'a ScoredLocation> {
    selected
        .and_then(|id| snapshot.find(id))
        .or_else(|| snapshot.locations.first())
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.sync.snapshot();
    HttpResponse::Ok().json(ApiHealth {
        healthy: snapshot.version > 0,
        version: env!("CARGO_PKG_VERSION").to_string(),
        sync_version: snapshot.version,
        locations: snapshot.locations.len(),
    })
}

/// `GET /api/locations`
pub async fn locations(state: web::Data<AppState>) -> HttpResponse {
    let snapshot = state.sync.snapshot();
    let list: Vec<ApiLocation> = snapshot.locations.iter().map(ApiLocation::from).collect();
    HttpResponse::Ok().json(list)
}

/// `GET /api/locations/{id}`
pub async fn location(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = LocationId::new(path.into_inner());
    let snapshot = state.sync.snapshot();

    snapshot.find(&id).map_or_else(
        || {
            HttpResponse::NotFound().json(ApiError {
                error: format!("No location with id {id}"),
            })
        },
        |found| HttpResponse::Ok().json(ApiLocation::from(found)),
    )
}

/// `GET /api/search?q=`
///
/// Case-sensitive substring match on names; a missing or empty query
/// returns an empty list.
pub async fn search(state: web::Data<AppState>, params: web::Query<SearchParams>) -> HttpResponse {
    let snapshot = state.sync.snapshot();
    let query = params.q.as_deref().unwrap_or_default();
    HttpResponse::Ok().json(to_api(&recommend::search(&snapshot.locations, query)))
}

/// `GET /api/recommendations?selected=`
pub async fn recommendations(
    state: web::Data<AppState>,
    params: web::Query<SelectionParams>,
) -> HttpResponse {
    let snapshot = state.sync.snapshot();
    let selected_id = params.selected_id();
    let selected = resolve_selected(&snapshot, selected_id.as_ref()).map(ScoredLocation::id);
    HttpResponse::Ok().json(to_api(&recommend::recommendations(
        &snapshot.locations,
        selected,
    )))
}

/// `GET /api/markers?selected=`
///
/// All locations as a `GeoJSON` `FeatureCollection`, centred on the
/// selected location.
pub async fn markers(
    state: web::Data<AppState>,
    params: web::Query<SelectionParams>,
) -> HttpResponse {
    let snapshot = state.sync.snapshot();
    let selected_id = params.selected_id();
    let view = MapView::centered_on(resolve_selected(&snapshot, selected_id.as_ref()));
    let collection = GeoJsonRenderer.render(&view, &build_markers(&snapshot.locations));

    match serde_json::to_string(&collection) {
        Ok(body) => HttpResponse::Ok()
            .content_type("application/geo+json")
            .body(body),
        Err(e) => {
            log::error!("Failed to serialize markers: {e}");
            HttpResponse::InternalServerError().json(ApiError {
                error: "Failed to serialize markers".to_string(),
            })
        }
    }
}
