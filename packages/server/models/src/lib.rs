#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the mozzi map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the store row types to allow independent evolution of the API
//! contract.

use mozzi_aggregation::{ScoredLocation, format_congestion, format_parking};
use mozzi_location_models::{Dimension, LocationId};
use serde::{Deserialize, Serialize};

/// A location with its derived scores, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLocation {
    /// Location id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Street address, if recorded.
    pub address: Option<String>,
    /// Category label.
    pub category: Option<String>,
    /// Distance label.
    pub dist: Option<String>,
    /// Congestion details.
    pub congestion: ApiScore,
    /// Parking details.
    pub parking: ApiScore,
}

/// One derived score with its presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiScore {
    /// Running average.
    pub score: f64,
    /// Average formatted for display.
    pub display: String,
    /// Rounded tier (1-5).
    pub level: u8,
    /// Tier headline.
    pub label: String,
    /// Tier description (congestion only).
    pub description: Option<String>,
    /// Marker colour (congestion only).
    pub color: Option<String>,
    /// Number of reports behind the average.
    pub report_count: i64,
}

impl ApiScore {
    fn of(scored: &ScoredLocation, dimension: Dimension) -> Self {
        let score = scored.scores.get(dimension);
        let report_count = scored.location.accumulator(dimension).count;

        match dimension {
            Dimension::Congestion => {
                let tier = scored.congestion_level().congestion();
                Self {
                    score,
                    display: format_congestion(score),
                    level: tier.level.value(),
                    label: tier.label.to_string(),
                    description: Some(tier.description.to_string()),
                    color: Some(tier.color.to_string()),
                    report_count,
                }
            }
            Dimension::Parking => {
                let tier = scored.parking_level().parking();
                Self {
                    score,
                    display: format_parking(score),
                    level: tier.level.value(),
                    label: tier.label.to_string(),
                    description: None,
                    color: None,
                    report_count,
                }
            }
        }
    }
}

impl From<&ScoredLocation> for ApiLocation {
    fn from(scored: &ScoredLocation) -> Self {
        let row = &scored.location;
        Self {
            id: row.id.to_string(),
            name: row.name.clone(),
            latitude: row.latitude,
            longitude: row.longitude,
            address: row.address.clone(),
            category: row.category.clone(),
            dist: row.dist.clone(),
            congestion: ApiScore::of(scored, Dimension::Congestion),
            parking: ApiScore::of(scored, Dimension::Parking),
        }
    }
}

/// Query parameters for the search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    /// Substring to look for in names.
    pub q: Option<String>,
}

/// Query parameters for endpoints that depend on the selected location.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionParams {
    /// Selected location id; the first location when absent or unknown.
    pub selected: Option<String>,
}

impl SelectionParams {
    /// The selected id, if one was given.
    #[must_use]
    pub fn selected_id(&self) -> Option<LocationId> {
        self.selected
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(LocationId::from)
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the location list has been loaded at least once.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// Version of the location snapshot being served.
    pub sync_version: u64,
    /// Number of locations in the snapshot.
    pub locations: usize,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// What went wrong.
    pub error: String,
}
