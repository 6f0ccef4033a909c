//! Display descriptors for each [`Level`].
//!
//! The congestion tiers describe the state of the mozzi mascot (from
//! soft and fresh to burnt); parking tiers are short lot-status labels.

use serde::Serialize;

use crate::Level;

/// How a congestion score is presented at a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CongestionTier {
    /// Level this tier describes.
    pub level: Level,
    /// Headline shown on the main card.
    pub label: &'static str,
    /// One-line description under the headline.
    pub description: &'static str,
    /// Marker fill colour (hex).
    pub color: &'static str,
}

/// How a parking score is presented at a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParkingTier {
    /// Level this tier describes.
    pub level: Level,
    /// Badge text.
    pub label: &'static str,
}

static CONGESTION_TIERS: [CongestionTier; 5] = [
    CongestionTier {
        level: Level::VeryLow,
        label: "모찌가 부드러워요",
        description: "아주 쾌적하고 여유로워요!",
        color: "#D1FAE5",
    },
    CongestionTier {
        level: Level::Low,
        label: "모찌가 말랑해요",
        description: "기분 좋게 한산한 상태입니다.",
        color: "#BBF7D0",
    },
    CongestionTier {
        level: Level::Moderate,
        label: "모찌가 구워지고 있어요",
        description: "사람들이 적당히 활기차요.",
        color: "#FDE047",
    },
    CongestionTier {
        level: Level::High,
        label: "모찌가 익고 있어요",
        description: "북적북적! 조금씩 붐비고 있어요.",
        color: "#F59E0B",
    },
    CongestionTier {
        level: Level::VeryHigh,
        label: "모찌가 타고 있어요",
        description: "사람이 너무 많아요! 다른 곳은 어때요?",
        color: "#EF4444",
    },
];

static PARKING_TIERS: [ParkingTier; 5] = [
    ParkingTier {
        level: Level::VeryLow,
        label: "주차장 텅텅",
    },
    ParkingTier {
        level: Level::Low,
        label: "주차 여유",
    },
    ParkingTier {
        level: Level::Moderate,
        label: "주차 보통",
    },
    ParkingTier {
        level: Level::High,
        label: "주차 혼잡",
    },
    ParkingTier {
        level: Level::VeryHigh,
        label: "주차 만차",
    },
];

pub(crate) fn congestion_tier(level: Level) -> &'static CongestionTier {
    &CONGESTION_TIERS[level.value() as usize - 1]
}

pub(crate) fn parking_tier(level: Level) -> &'static ParkingTier {
    &PARKING_TIERS[level.value() as usize - 1]
}
