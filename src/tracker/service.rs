use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use chrono::NaiveDate;
use dashmap::DashMap;

use crate::data::types::{MarketDetail, Outcome, Station};

/// Resolved winners kept per station.
const RECENT_WINNERS_CAP: usize = 14;
/// Change lines reported per check.
const MAX_CHANGES: usize = 3;
/// Outcomes shown in a snapshot.
const TOP_OUTCOMES: usize = 3;

#[derive(Debug, Clone)]
pub struct WinnerEntry {
    pub date: NaiveDate,
    pub winner: String,
}

#[derive(Debug, Default)]
struct StationState {
    tracking: bool,
    current_slug: Option<String>,
    last_prices: HashMap<String, f64>,
    resolved: bool,
    #[allow(dead_code)]
    resolved_winner: Option<String>,
    recent_winners: VecDeque<WinnerEntry>,
}

/// Owns all per-station tracking state. Every mutation goes through a
/// method here, so scheduled checks and command handlers serialize on the
/// per-station entry instead of sharing bare maps.
pub struct Tracker {
    stations: DashMap<Station, StationState>,
}

impl Tracker {
    pub fn new() -> Self {
        let stations = DashMap::new();
        for station in Station::ALL {
            stations.insert(station, StationState::default());
        }
        Self { stations }
    }

    pub fn set_tracking(&self, station: Station, on: bool) {
        if let Some(mut state) = self.stations.get_mut(&station) {
            state.tracking = on;
        }
    }

    pub fn is_tracking(&self, station: Station) -> bool {
        self.stations
            .get(&station)
            .map(|state| state.tracking)
            .unwrap_or(false)
    }

    pub fn current_slug(&self, station: Station) -> Option<String> {
        self.stations
            .get(&station)
            .and_then(|state| state.current_slug.clone())
    }

    /// Install the day's slug. An actual change discards the previous
    /// market's prices and resolution flag; the winner history survives
    /// rotation. Outcome names repeat verbatim across days, so carrying
    /// prices over would misclassify the new market's first read.
    pub fn update_slug(&self, station: Station, slug: Option<String>) {
        if let Some(mut state) = self.stations.get_mut(&station) {
            if state.current_slug != slug {
                state.last_prices.clear();
                state.resolved = false;
                state.resolved_winner = None;
            }
            state.current_slug = slug;
        }
    }

    /// Compare fetched outcome prices against the last observed ones.
    ///
    /// Returns formatted change lines in descending-price order, capped to
    /// the first three. First-seen outcomes are recorded without a line;
    /// the stored price is always overwritten. Comparison is exact: the API
    /// serializes an unchanged price identically, so epsilon tolerance
    /// would only mask real ticks.
    pub fn diff_prices(&self, station: Station, detail: &MarketDetail) -> Vec<String> {
        let mut state = match self.stations.get_mut(&station) {
            Some(state) => state,
            None => return Vec::new(),
        };

        let mut outcomes: Vec<&Outcome> = detail.outcomes.iter().collect();
        outcomes.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal));

        let mut changes = Vec::new();
        for outcome in outcomes {
            let last = state.last_prices.get(&outcome.name).copied();
            if let Some(last) = last {
                if last != outcome.price && changes.len() < MAX_CHANGES {
                    let arrow = if outcome.price > last { "↑" } else { "↓" };
                    changes.push(format!(
                        "{} {} {}% ({:.2}¢)",
                        outcome.name,
                        arrow,
                        percent(outcome.price),
                        outcome.price
                    ));
                }
            }
            state.last_prices.insert(outcome.name.clone(), outcome.price);
        }
        changes
    }

    /// Announce a newly resolved market, at most once per slug lifetime.
    /// Also appends the winner to the station's bounded streak history.
    pub fn detect_resolution(
        &self,
        station: Station,
        detail: &MarketDetail,
        today: NaiveDate,
    ) -> Option<String> {
        let mut state = self.stations.get_mut(&station)?;
        if state.resolved {
            return None;
        }
        let winner = detail.resolved_outcome.clone()?;

        state.resolved = true;
        state.resolved_winner = Some(winner.clone());
        if state.recent_winners.len() >= RECENT_WINNERS_CAP {
            state.recent_winners.pop_front();
        }
        state.recent_winners.push_back(WinnerEntry {
            date: today,
            winner: winner.clone(),
        });

        Some(format!(
            "✅ [{}] {}: {} (highest temp recorded)",
            station.label(),
            detail.end_date.format("%Y-%m-%d"),
            winner
        ))
    }

    /// Winner history, oldest first.
    pub fn recent_winners(&self, station: Station) -> Vec<WinnerEntry> {
        self.stations
            .get(&station)
            .map(|state| state.recent_winners.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Top outcomes by price, snapshot-formatted: "Above 25°C • 62% (0.62¢)".
pub fn top_outcomes(outcomes: &[Outcome]) -> Vec<String> {
    let mut sorted: Vec<&Outcome> = outcomes.iter().collect();
    sorted.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(Ordering::Equal));
    sorted
        .iter()
        .take(TOP_OUTCOMES)
        .map(|o| format!("{} • {}% ({:.2}¢)", o.name, percent(o.price), o.price))
        .collect()
}

fn percent(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn detail(outcomes: &[(&str, f64)]) -> MarketDetail {
        detail_with(outcomes, None)
    }

    fn detail_with(outcomes: &[(&str, f64)], resolved: Option<&str>) -> MarketDetail {
        MarketDetail {
            slug: "highest-temperature-in-london-on-august-7".to_string(),
            end_date: Utc.with_ymd_and_hms(2026, 8, 7, 21, 0, 0).unwrap(),
            outcomes: outcomes
                .iter()
                .map(|(name, price)| Outcome {
                    name: name.to_string(),
                    price: *price,
                })
                .collect(),
            resolved_outcome: resolved.map(|s| s.to_string()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    #[test]
    fn test_first_poll_is_silent_and_records_prices() {
        let tracker = Tracker::new();
        let first = detail(&[("Above 25°C", 0.62), ("20-25°C", 0.30), ("Below 20°C", 0.08)]);

        assert!(tracker.diff_prices(Station::London, &first).is_empty());

        // Unchanged second read stays silent, proving the baselines stuck.
        assert!(tracker.diff_prices(Station::London, &first).is_empty());
    }

    #[test]
    fn test_changed_price_emits_one_line_and_updates_store() {
        let tracker = Tracker::new();
        tracker.diff_prices(
            Station::London,
            &detail(&[("Above 25°C", 0.62), ("20-25°C", 0.30), ("Below 20°C", 0.08)]),
        );

        let changes = tracker.diff_prices(
            Station::London,
            &detail(&[("Above 25°C", 0.70), ("20-25°C", 0.30), ("Below 20°C", 0.08)]),
        );
        assert_eq!(changes, vec!["Above 25°C ↑ 70% (0.70¢)".to_string()]);

        // Stored price moved to 0.70: repeating the read emits nothing.
        let repeat = tracker.diff_prices(
            Station::London,
            &detail(&[("Above 25°C", 0.70), ("20-25°C", 0.30), ("Below 20°C", 0.08)]),
        );
        assert!(repeat.is_empty());
    }

    #[test]
    fn test_arrow_direction() {
        let tracker = Tracker::new();
        tracker.diff_prices(Station::Nyc, &detail(&[("Above 25°C", 0.50), ("Below 20°C", 0.50)]));

        let changes = tracker.diff_prices(
            Station::Nyc,
            &detail(&[("Above 25°C", 0.55), ("Below 20°C", 0.45)]),
        );
        assert_eq!(
            changes,
            vec![
                "Above 25°C ↑ 55% (0.55¢)".to_string(),
                "Below 20°C ↓ 45% (0.45¢)".to_string(),
            ]
        );
    }

    #[test]
    fn test_changes_are_price_ordered_and_capped_at_three() {
        let tracker = Tracker::new();
        tracker.diff_prices(
            Station::London,
            &detail(&[("A", 0.10), ("B", 0.20), ("C", 0.30), ("D", 0.40)]),
        );

        let changes = tracker.diff_prices(
            Station::London,
            &detail(&[("A", 0.11), ("B", 0.21), ("C", 0.31), ("D", 0.41)]),
        );

        assert_eq!(changes.len(), 3);
        // Most likely outcome's change first, least likely one dropped.
        assert!(changes[0].starts_with("D ↑"));
        assert!(changes[1].starts_with("C ↑"));
        assert!(changes[2].starts_with("B ↑"));
    }

    #[test]
    fn test_dropped_change_still_updates_stored_price() {
        let tracker = Tracker::new();
        tracker.diff_prices(
            Station::London,
            &detail(&[("A", 0.10), ("B", 0.20), ("C", 0.30), ("D", 0.40)]),
        );
        tracker.diff_prices(
            Station::London,
            &detail(&[("A", 0.11), ("B", 0.21), ("C", 0.31), ("D", 0.41)]),
        );

        // A's 0.11 was recorded even though its line was capped away.
        let changes = tracker.diff_prices(
            Station::London,
            &detail(&[("A", 0.11), ("B", 0.21), ("C", 0.31), ("D", 0.41)]),
        );
        assert!(changes.is_empty());
    }

    #[test]
    fn test_stations_do_not_share_prices() {
        let tracker = Tracker::new();
        tracker.diff_prices(Station::London, &detail(&[("Above 25°C", 0.62)]));

        // Same outcome name on the other station is a first read, not a change.
        let changes = tracker.diff_prices(Station::Nyc, &detail(&[("Above 25°C", 0.70)]));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_slug_rotation_clears_prices_and_resolution() {
        let tracker = Tracker::new();
        tracker.update_slug(Station::London, Some("london-aug-7".to_string()));
        tracker.diff_prices(Station::London, &detail(&[("Above 25°C", 0.62)]));
        tracker.detect_resolution(
            Station::London,
            &detail_with(&[("Above 25°C", 1.0)], Some("Above 25°C")),
            today(),
        );

        tracker.update_slug(Station::London, Some("london-aug-8".to_string()));

        // New market, same outcome name: first read again, no change line.
        let changes = tracker.diff_prices(Station::London, &detail(&[("Above 25°C", 0.40)]));
        assert!(changes.is_empty());

        // Resolution can fire again for the new slug...
        let announcement = tracker.detect_resolution(
            Station::London,
            &detail_with(&[("20-25°C", 1.0)], Some("20-25°C")),
            today(),
        );
        assert!(announcement.is_some());
        // ...and the history kept both days.
        assert_eq!(tracker.recent_winners(Station::London).len(), 2);
    }

    #[test]
    fn test_reinstalling_same_slug_keeps_prices() {
        let tracker = Tracker::new();
        tracker.update_slug(Station::London, Some("london-aug-7".to_string()));
        tracker.diff_prices(Station::London, &detail(&[("Above 25°C", 0.62)]));

        tracker.update_slug(Station::London, Some("london-aug-7".to_string()));

        let changes = tracker.diff_prices(Station::London, &detail(&[("Above 25°C", 0.70)]));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_resolution_announced_once() {
        let tracker = Tracker::new();
        let resolved = detail_with(&[("Above 25°C", 1.0)], Some("Above 25°C"));

        let first = tracker.detect_resolution(Station::Nyc, &resolved, today());
        assert_eq!(
            first.as_deref(),
            Some("✅ [NYC] 2026-08-07: Above 25°C (highest temp recorded)")
        );

        // Immediate second poll with the same resolved detail emits nothing.
        assert!(tracker.detect_resolution(Station::Nyc, &resolved, today()).is_none());
        assert_eq!(tracker.recent_winners(Station::Nyc).len(), 1);
    }

    #[test]
    fn test_unresolved_detail_produces_nothing() {
        let tracker = Tracker::new();
        let unresolved = detail(&[("Above 25°C", 0.62)]);
        assert!(tracker
            .detect_resolution(Station::London, &unresolved, today())
            .is_none());
        assert!(tracker.recent_winners(Station::London).is_empty());
    }

    #[test]
    fn test_recent_winners_evict_oldest_past_cap() {
        let tracker = Tracker::new();

        for day in 1..=15u32 {
            tracker.update_slug(Station::London, Some(format!("london-aug-{}", day)));
            let resolved = detail_with(&[("Above 25°C", 1.0)], Some(&format!("winner-{}", day)));
            let date = NaiveDate::from_ymd_opt(2026, 8, day).unwrap();
            assert!(tracker.detect_resolution(Station::London, &resolved, date).is_some());
        }

        let winners = tracker.recent_winners(Station::London);
        assert_eq!(winners.len(), RECENT_WINNERS_CAP);
        // The 15th resolution evicted day 1; day 2 is now the oldest entry.
        assert_eq!(winners[0].winner, "winner-2");
        assert_eq!(winners[13].winner, "winner-15");
    }

    #[test]
    fn test_tracking_toggle() {
        let tracker = Tracker::new();
        assert!(!tracker.is_tracking(Station::London));

        tracker.set_tracking(Station::London, true);
        tracker.set_tracking(Station::London, false);
        assert!(!tracker.is_tracking(Station::London));
        assert!(!tracker.is_tracking(Station::Nyc));
    }

    #[test]
    fn test_top_outcomes_formatting() {
        let outcomes = vec![
            Outcome {
                name: "20-25°C".to_string(),
                price: 0.30,
            },
            Outcome {
                name: "Above 25°C".to_string(),
                price: 0.62,
            },
            Outcome {
                name: "Below 20°C".to_string(),
                price: 0.08,
            },
            Outcome {
                name: "Exactly 20°C".to_string(),
                price: 0.01,
            },
        ];

        let top = top_outcomes(&outcomes);
        assert_eq!(
            top,
            vec![
                "Above 25°C • 62% (0.62¢)".to_string(),
                "20-25°C • 30% (0.30¢)".to_string(),
                "Below 20°C • 8% (0.08¢)".to_string(),
            ]
        );
    }
}
