//! Quieter alternatives and name search.

use mozzi_aggregation::ScoredLocation;
use mozzi_location_models::LocationId;

/// Most alternatives shown at once.
pub const MAX_RECOMMENDATIONS: usize = 2;

/// Congestion scores below this count as quiet (tier 3 or lower).
pub const QUIET_THRESHOLD: f64 = 3.5;

/// Up to [`MAX_RECOMMENDATIONS`] quiet places other than `selected`, in
/// list order.
#[must_use]
pub fn recommendations<'a>(
    locations: &'a [ScoredLocation],
    selected: Option<&LocationId>,
) -> Vec<&'a ScoredLocation> {
    locations
        .iter()
        .filter(|l| Some(l.id()) != selected)
        .filter(|l| l.scores.congestion < QUIET_THRESHOLD)
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

/// Places whose name contains `query`. Case-sensitive; an empty query
/// matches nothing.
#[must_use]
pub fn search<'a>(locations: &'a [ScoredLocation], query: &str) -> Vec<&'a ScoredLocation> {
    if query.is_empty() {
        return Vec::new();
    }
    locations
        .iter()
        .filter(|l| l.name().contains(query))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mozzi_aggregation::score_all;
    use mozzi_location_models::Location;

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

    fn ids(list: &[&ScoredLocation]) -> Vec<String> {
        list.iter().map(|l| l.id().to_string()).collect()
    }

    #[test]
    fn excludes_selected_and_busy_places() {
        let list = score_all(vec![
            row("1", "애월 해변", (0, 0)),
            row("2", "성산 일출봉", (9, 2)),
            row("3", "협재 해수욕장", (7, 2)),
            row("4", "한라산", (2, 1)),
            row("5", "우도", (1, 1)),
        ]);

        // 4.5 is busy, 3.5 is not below the threshold.
        assert_eq!(
            ids(&recommendations(&list, Some(&LocationId::from("1")))),
            vec!["4", "5"]
        );
        assert_eq!(ids(&recommendations(&list, None)), vec!["1", "4"]);
    }

    #[test]
    fn never_more_than_two() {
        let list = score_all((0..10).map(|i| row(&i.to_string(), "x", (1, 1))).collect());
        for selected in ["0", "5", "missing"] {
            let recs = recommendations(&list, Some(&LocationId::from(selected)));
            assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
            assert!(recs.iter().all(|r| r.id().as_str() != selected));
        }
    }

    #[test]
    fn search_is_case_sensitive_substring() {
        let list = score_all(vec![
            row("1", "애월 해변", (0, 0)),
            row("2", "성산 일출봉", (0, 0)),
            row("3", "Jeju Zoo", (0, 0)),
        ]);
        assert_eq!(ids(&search(&list, "애월")), vec!["1"]);
        assert_eq!(ids(&search(&list, "Zoo")), vec!["3"]);
        assert!(search(&list, "zoo").is_empty());
        assert!(search(&list, "").is_empty());
    }
}
