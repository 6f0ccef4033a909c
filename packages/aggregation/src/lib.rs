#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Derived congestion and parking scores.
//!
//! Scores are never stored. They are computed from the `(sum, count)`
//! accumulators held on each location row every time a fresh snapshot
//! arrives from the store. An empty accumulator scores `1.0` so a
//! location nobody has rated yet reads as "plenty of room".

use mozzi_location_models::{Accumulator, Dimension, Level, Location, LocationId};
use serde::Serialize;

/// Score used when a dimension has no reports yet.
pub const DEFAULT_SCORE: f64 = 1.0;

/// Returns the running average for an accumulator.
///
/// Falls back to [`DEFAULT_SCORE`] when `count` is zero (or negative,
/// which the store should never produce).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average(acc: Accumulator) -> f64 {
    if acc.count > 0 {
        acc.sum as f64 / acc.count as f64
    } else {
        DEFAULT_SCORE
    }
}

/// Maps a raw score onto a display [`Level`].
///
/// Rounds half away from zero and clamps into 1-5. Non-finite scores map
/// to the lowest level.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn tier(score: f64) -> Level {
    if !score.is_finite() {
        return Level::VeryLow;
    }
    let rounded = score.round().clamp(1.0, 5.0) as u8;
    Level::from_value(rounded).unwrap_or(Level::VeryLow)
}

/// Formats a congestion score the way the main card shows it.
#[must_use]
pub fn format_congestion(score: f64) -> String {
    format!("{score:.2}")
}

/// Formats a parking score the way the parking badge shows it.
#[must_use]
pub fn format_parking(score: f64) -> String {
    format!("{score:.1}")
}

/// Both derived scores for one location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedScores {
    /// Average congestion level.
    pub congestion: f64,
    /// Average parking level.
    pub parking: f64,
}

impl DerivedScores {
    /// Computes the scores for a location row.
    #[must_use]
    pub fn of(location: &Location) -> Self {
        Self {
            congestion: average(location.accumulator(Dimension::Congestion)),
            parking: average(location.accumulator(Dimension::Parking)),
        }
    }

    /// Returns the score for one dimension.
    #[must_use]
    pub const fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Congestion => self.congestion,
            Dimension::Parking => self.parking,
        }
    }
}

/// A location row paired with its derived scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredLocation {
    /// The stored row, accumulators included.
    pub location: Location,
    /// Scores computed from the row's accumulators.
    pub scores: DerivedScores,
}

impl ScoredLocation {
    /// Scores a single row.
    #[must_use]
    pub fn new(location: Location) -> Self {
        let scores = DerivedScores::of(&location);
        Self { location, scores }
    }

    /// Shortcut for the row's id.
    #[must_use]
    pub const fn id(&self) -> &LocationId {
        &self.location.id
    }

    /// Shortcut for the row's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.location.name
    }

    /// Display level for the congestion score.
    #[must_use]
    pub fn congestion_level(&self) -> Level {
        tier(self.scores.congestion)
    }

    /// Display level for the parking score.
    #[must_use]
    pub fn parking_level(&self) -> Level {
        tier(self.scores.parking)
    }
}

/// Scores every row, keeping the order the store returned them in.
#[must_use]
pub fn score_all(rows: Vec<Location>) -> Vec<ScoredLocation> {
    rows.into_iter().map(ScoredLocation::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(crowd: Option<(i64, i64)>, parking: Option<(i64, i64)>) -> Location {
        Location {
            id: LocationId::from("1"),
            name: "협재 해수욕장".to_string(),
            latitude: 33.394,
            longitude: 126.239,
            address: None,
            category: None,
            dist: None,
            crowd_sum: crowd.map(|(s, _)| s),
            crowd_count: crowd.map(|(_, c)| c),
            parking_sum: parking.map(|(s, _)| s),
            parking_count: parking.map(|(_, c)| c),
        }
    }

    #[test]
    fn empty_accumulator_scores_default() {
        assert!((average(Accumulator::new(0, 0)) - DEFAULT_SCORE).abs() < f64::EPSILON);
        // A stray sum with no count is still ignored.
        assert!((average(Accumulator::new(12, 0)) - DEFAULT_SCORE).abs() < f64::EPSILON);
    }

    #[test]
    fn average_divides_sum_by_count() {
        assert!((average(Accumulator::new(7, 2)) - 3.5).abs() < f64::EPSILON);
        assert!((average(Accumulator::new(5, 5)) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn null_columns_score_default() {
        let scores = DerivedScores::of(&location(None, Some((8, 2))));
        assert!((scores.congestion - 1.0).abs() < f64::EPSILON);
        assert!((scores.parking - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn tier_rounds_and_clamps() {
        assert_eq!(tier(1.0), Level::VeryLow);
        assert_eq!(tier(2.49), Level::Low);
        assert_eq!(tier(2.5), Level::Moderate);
        assert_eq!(tier(4.6), Level::VeryHigh);
        assert_eq!(tier(0.2), Level::VeryLow);
        assert_eq!(tier(9.0), Level::VeryHigh);
        assert_eq!(tier(f64::NAN), Level::VeryLow);
    }

    #[test]
    fn tier_stays_in_range_for_any_valid_accumulator() {
        for count in 1..=20_i64 {
            for sum in count..=count * 5 {
                let level = tier(average(Accumulator::new(sum, count)));
                assert!((1..=5).contains(&level.value()));
            }
        }
    }

    #[test]
    fn score_all_keeps_store_order() {
        let mut second = location(Some((10, 2)), None);
        second.id = LocationId::from("2");
        let scored = score_all(vec![location(None, None), second]);
        assert_eq!(scored[0].id().as_str(), "1");
        assert_eq!(scored[1].id().as_str(), "2");
        assert_eq!(scored[1].congestion_level(), Level::VeryHigh);
    }

    #[test]
    fn formats_use_card_precision() {
        assert_eq!(format_congestion(10.0 / 3.0), "3.33");
        assert_eq!(format_parking(2.26), "2.3");
    }
}
