#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Map markers for scored locations.
//!
//! Each location becomes a [`Marker`] coloured by its congestion tier.
//! Rendering is behind the [`MapRenderer`] trait so the same markers can
//! be emitted as `GeoJSON` for a web map or as text lines for a terminal.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value, feature::Id};
use mozzi_aggregation::ScoredLocation;
use mozzi_location_models::{Coordinates, DEFAULT_CENTER, Level, LocationId};
use serde::Serialize;

/// Zoom level used when the map is first shown.
pub const DEFAULT_ZOOM: u8 = 12;

/// One pin on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    /// Location the marker stands for.
    pub id: LocationId,
    /// Location name (tooltip).
    pub name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Congestion tier.
    pub level: Level,
    /// Fill colour for the tier (hex).
    pub color: &'static str,
}

impl Marker {
    /// Builds the marker for one scored location.
    #[must_use]
    pub fn from_scored(scored: &ScoredLocation) -> Self {
        let level = scored.congestion_level();
        Self {
            id: scored.id().clone(),
            name: scored.name().to_string(),
            latitude: scored.location.latitude,
            longitude: scored.location.longitude,
            level,
            color: level.congestion().color,
        }
    }

    fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("name".to_string(), self.name.clone().into());
        properties.insert("level".to_string(), self.level.value().into());
        properties.insert("label".to_string(), self.level.congestion().label.into());
        properties.insert("color".to_string(), self.color.into());

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![
                self.longitude,
                self.latitude,
            ]))),
            id: Some(Id::String(self.id.to_string())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Builds markers for every location, in list order.
#[must_use]
pub fn markers(locations: &[ScoredLocation]) -> Vec<Marker> {
    locations.iter().map(Marker::from_scored).collect()
}

/// Where the map is looking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    /// Map centre.
    pub center: Coordinates,
    /// Zoom level.
    pub zoom: u8,
}

impl MapView {
    /// Centres on the selected location, or on the island default when
    /// nothing is selected.
    #[must_use]
    pub fn centered_on(selected: Option<&ScoredLocation>) -> Self {
        Self {
            center: selected.map_or(DEFAULT_CENTER, |s| s.location.coordinates()),
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl Default for MapView {
    fn default() -> Self {
        Self::centered_on(None)
    }
}

/// Something the user did on the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEvent {
    /// A marker was activated.
    Selected(LocationId),
}

/// Turns markers into a displayable map.
pub trait MapRenderer {
    /// What the renderer produces.
    type Output;

    /// Renders `markers` as seen from `view`.
    fn render(&self, view: &MapView, markers: &[Marker]) -> Self::Output;
}

/// Renders markers as a `GeoJSON` `FeatureCollection` of points.
///
/// The view is attached as a `view` foreign member so a client can set
/// its initial centre and zoom.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoJsonRenderer;

impl MapRenderer for GeoJsonRenderer {
    type Output = FeatureCollection;

    fn render(&self, view: &MapView, markers: &[Marker]) -> FeatureCollection {
        let mut foreign = JsonObject::new();
        foreign.insert(
            "view".to_string(),
            serde_json::json!({
                "center": [view.center.longitude, view.center.latitude],
                "zoom": view.zoom,
            }),
        );

        FeatureCollection {
            bbox: None,
            features: markers.iter().map(Marker::to_feature).collect(),
            foreign_members: Some(foreign),
        }
    }
}

/// Renders markers as one text line each, for terminals.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl MapRenderer for TextRenderer {
    type Output = Vec<String>;

    fn render(&self, _view: &MapView, markers: &[Marker]) -> Vec<String> {
        markers
            .iter()
            .map(|m| {
                format!(
                    "[{}] {} ({:.4}, {:.4}) {}",
                    m.level.value(),
                    m.name,
                    m.latitude,
                    m.longitude,
                    m.level.congestion().label,
                )
            })
            .collect()
    }
}

/// Maps a marker index picked by the user to a selection event.
#[must_use]
pub fn select(markers: &[Marker], index: usize) -> Option<MapEvent> {
    markers.get(index).map(|m| MapEvent::Selected(m.id.clone()))
}
