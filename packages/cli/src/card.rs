//! Plain-text rendering of locations for the terminal.

use mozzi_aggregation::{ScoredLocation, format_congestion, format_parking};
use mozzi_app::submit::SubmitOutcome;
use mozzi_location_models::{DEFAULT_CATEGORY, DEFAULT_DIST, Dimension, Level};

/// One line per location, for lists and search results.
#[must_use]
pub fn summary_line(scored: &ScoredLocation) -> String {
    format!(
        "{:<6} {}  혼잡 {} ({})  주차 {}",
        scored.id().as_str(),
        scored.name(),
        format_congestion(scored.scores.congestion),
        scored.congestion_level().congestion().label,
        format_parking(scored.scores.parking),
    )
}

/// The home card for `scored`, followed by quieter suggestions.
#[must_use]
pub fn home_card(scored: &ScoredLocation, recommendations: &[&ScoredLocation]) -> Vec<String> {
    let row = &scored.location;
    let congestion = scored.congestion_level().congestion();
    let parking = scored.parking_level().parking();

    let mut lines = vec![
        format!(
            "{} ({} · {})",
            row.name,
            row.category.as_deref().unwrap_or(DEFAULT_CATEGORY),
            row.dist.as_deref().unwrap_or(DEFAULT_DIST),
        ),
        format!(
            "  {}  {}",
            congestion.label,
            format_congestion(scored.scores.congestion)
        ),
        format!("  {}", congestion.description),
        format!(
            "  주차: {} ({})",
            parking.label,
            format_parking(scored.scores.parking)
        ),
        format!(
            "  제보 {}건",
            row.accumulator(Dimension::Congestion).count
        ),
    ];
    if let Some(address) = row.address.as_deref() {
        lines.push(format!("  {address}"));
    }

    if !recommendations.is_empty() {
        lines.push("한적한 곳 추천:".to_string());
        lines.extend(recommendations.iter().map(|r| {
            format!(
                "  - {} {}",
                r.name(),
                format_congestion(r.scores.congestion)
            )
        }));
    }
    lines
}

/// Choice label for a rating level in `dimension`.
#[must_use]
pub fn level_choice(dimension: Dimension, level: Level) -> String {
    let label = match dimension {
        Dimension::Congestion => level.congestion().label,
        Dimension::Parking => level.parking().label,
    };
    format!("{} - {label}", level.value())
}

/// What to tell the user after a report was accepted.
#[must_use]
pub fn outcome_message(outcome: &SubmitOutcome) -> String {
    match outcome {
        SubmitOutcome::Recorded { location_id } => format!("Report recorded for {location_id}."),
        SubmitOutcome::Failed { error, .. } => format!("Report failed: {error}"),
    }
}
