#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Location, report, and level types shared across the mozzi map.
//!
//! These types mirror the rows stored in the hosted `locations` and
//! `reports` tables. Every other package (aggregation, store, sync, the
//! server and the terminal client) speaks in terms of these types.

pub mod tier;

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use tier::{CongestionTier, ParkingTier};

/// Category assigned to locations added from the client.
pub const DEFAULT_CATEGORY: &str = "관광";

/// Distance placeholder stored for locations added from the client.
pub const DEFAULT_DIST: &str = "N/A";

/// Comment attached to parking reports when the caller supplies none.
pub const PARKING_REPORT_COMMENT: &str = "주차 제보";

/// Map centre used when no location is selected (western Jeju).
pub const DEFAULT_CENTER: Coordinates = Coordinates {
    latitude: 33.39,
    longitude: 126.23,
};

/// Opaque location identifier.
///
/// The store may hand back either a text or an integer primary key; both
/// are kept as their string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    /// Wraps a raw identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LocationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for LocationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Int(n) => Self(n.to_string()),
        })
    }
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// A community rating from 1 (empty) to 5 (packed).
///
/// Used for both congestion and parking reports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    /// Level 1: plenty of room
    VeryLow = 1,
    /// Level 2: quiet
    Low = 2,
    /// Level 3: lively
    Moderate = 3,
    /// Level 4: getting crowded
    High = 4,
    /// Level 5: full
    VeryHigh = 5,
}

impl Level {
    /// Every level, lowest first.
    pub const ALL: [Self; 5] = [
        Self::VeryLow,
        Self::Low,
        Self::Moderate,
        Self::High,
        Self::VeryHigh,
    ];

    /// Returns the numeric value of this level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Creates a level from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-5.
    pub const fn from_value(value: u8) -> Result<Self, InvalidLevelError> {
        match value {
            1 => Ok(Self::VeryLow),
            2 => Ok(Self::Low),
            3 => Ok(Self::Moderate),
            4 => Ok(Self::High),
            5 => Ok(Self::VeryHigh),
            _ => Err(InvalidLevelError { value }),
        }
    }

    /// Text form stored in the `reports` table (`"1"` through `"5"`).
    #[must_use]
    pub fn as_report_text(self) -> String {
        self.value().to_string()
    }

    /// Display descriptor for a congestion score at this level.
    #[must_use]
    pub fn congestion(self) -> &'static CongestionTier {
        tier::congestion_tier(self)
    }

    /// Display descriptor for a parking score at this level.
    #[must_use]
    pub fn parking(self) -> &'static ParkingTier {
        tier::parking_tier(self)
    }
}

/// Error returned when a [`Level`] is built from a value outside 1-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidLevelError {
    /// The invalid value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid level {}: expected 1-5", self.value)
    }
}

impl std::error::Error for InvalidLevelError {}

/// Which aspect of a location a report rates.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    /// How crowded the place is.
    Congestion,
    /// How full the parking lot is.
    Parking,
}

impl Dimension {
    /// Both dimensions.
    pub const ALL: [Self; 2] = [Self::Congestion, Self::Parking];

    /// Column holding this dimension's running sum.
    #[must_use]
    pub const fn sum_column(self) -> &'static str {
        match self {
            Self::Congestion => "crowd_sum",
            Self::Parking => "parking_sum",
        }
    }

    /// Column holding this dimension's running count.
    #[must_use]
    pub const fn count_column(self) -> &'static str {
        match self {
            Self::Congestion => "crowd_count",
            Self::Parking => "parking_count",
        }
    }
}

/// Running `(sum, count)` pair kept per location per dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    /// Sum of every submitted level.
    pub sum: i64,
    /// Number of submitted levels.
    pub count: i64,
}

impl Accumulator {
    /// Creates an accumulator from raw totals.
    #[must_use]
    pub const fn new(sum: i64, count: i64) -> Self {
        Self { sum, count }
    }

    /// Returns the accumulator after one more report at `level`.
    #[must_use]
    pub fn with_report(self, level: Level) -> Self {
        Self {
            sum: self.sum + i64::from(level.value()),
            count: self.count + 1,
        }
    }
}

/// A location row as stored in the `locations` table.
///
/// Accumulator columns may be null in older rows; use
/// [`Location::accumulator`] rather than reading them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Primary key.
    pub id: LocationId,
    /// Display name.
    pub name: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// Free-form category (e.g. `관광`).
    #[serde(default)]
    pub category: Option<String>,
    /// Pre-rendered distance text.
    #[serde(default)]
    pub dist: Option<String>,
    /// Sum of congestion reports.
    #[serde(default)]
    pub crowd_sum: Option<i64>,
    /// Number of congestion reports.
    #[serde(default)]
    pub crowd_count: Option<i64>,
    /// Sum of parking reports.
    #[serde(default)]
    pub parking_sum: Option<i64>,
    /// Number of parking reports.
    #[serde(default)]
    pub parking_count: Option<i64>,
}

impl Location {
    /// Returns the accumulator for `dimension`, treating null columns as
    /// zero.
    #[must_use]
    pub fn accumulator(&self, dimension: Dimension) -> Accumulator {
        let (sum, count) = match dimension {
            Dimension::Congestion => (self.crowd_sum, self.crowd_count),
            Dimension::Parking => (self.parking_sum, self.parking_count),
        };
        Accumulator::new(sum.unwrap_or(0), count.unwrap_or(0))
    }

    /// Overwrites the accumulator for `dimension`.
    pub fn set_accumulator(&mut self, dimension: Dimension, acc: Accumulator) {
        match dimension {
            Dimension::Congestion => {
                self.crowd_sum = Some(acc.sum);
                self.crowd_count = Some(acc.count);
            }
            Dimension::Parking => {
                self.parking_sum = Some(acc.sum);
                self.parking_count = Some(acc.count);
            }
        }
    }

    /// Returns the location's coordinates.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Insert payload for a new location.
///
/// Accumulators always start at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
    /// Display name.
    pub name: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Street address.
    pub address: String,
    /// Category.
    pub category: String,
    /// Distance text.
    pub dist: String,
    /// Initial congestion sum.
    pub crowd_sum: i64,
    /// Initial congestion count.
    pub crowd_count: i64,
    /// Initial parking sum.
    pub parking_sum: i64,
    /// Initial parking count.
    pub parking_count: i64,
}

impl NewLocation {
    /// Builds an insert payload with zeroed accumulators and the default
    /// category.
    #[must_use]
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            address: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
            dist: DEFAULT_DIST.to_string(),
            crowd_sum: 0,
            crowd_count: 0,
            parking_sum: 0,
            parking_count: 0,
        }
    }
}

/// Insert payload for the `reports` table.
///
/// Both level columns are `NOT NULL` text constrained to `"1"`-`"5"`, so
/// the dimension that is not being reported carries a neutral `"1"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReport {
    /// Location this report refers to.
    pub location_id: LocationId,
    /// Congestion level as text.
    pub congestion_level: String,
    /// Parking level as text.
    pub parking_level: String,
    /// Free-text comment.
    pub comment: String,
}

impl NewReport {
    /// Builds a report for a single dimension.
    ///
    /// Parking reports without a comment get [`PARKING_REPORT_COMMENT`];
    /// congestion reports default to an empty comment.
    #[must_use]
    pub fn for_dimension(
        location_id: LocationId,
        dimension: Dimension,
        level: Level,
        comment: Option<String>,
    ) -> Self {
        let placeholder = Level::VeryLow.as_report_text();
        match dimension {
            Dimension::Congestion => Self {
                location_id,
                congestion_level: level.as_report_text(),
                parking_level: placeholder,
                comment: comment.unwrap_or_default(),
            },
            Dimension::Parking => Self {
                location_id,
                congestion_level: placeholder,
                parking_level: level.as_report_text(),
                comment: comment.unwrap_or_else(|| PARKING_REPORT_COMMENT.to_string()),
            },
        }
    }
}
