use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::data::types::{MarketSummary, Station};

/// Which question predicate identifies a station's daily market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRule {
    /// Question carries the metric phrase ("highest temperature").
    Keyword,
    /// Question carries the reference date's day number and month name.
    Date,
}

const METRIC_PHRASE: &str = "highest temperature";

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Pick the market slug for a station out of the full market list.
///
/// Candidates must mention the station and satisfy the active match rule;
/// the latest end date wins (stable sort, so ties keep list order). Returns
/// None when nothing matches. Best-effort by design: the heuristic has no
/// correctness guarantee against retitled markets.
pub fn resolve_slug(
    station: Station,
    markets: &[MarketSummary],
    as_of: NaiveDate,
    rule: MatchRule,
) -> Option<String> {
    let mut candidates: Vec<&MarketSummary> = markets
        .iter()
        .filter(|m| {
            let question = m.question.to_lowercase();
            question.contains(station.keyword()) && matches_rule(&question, as_of, rule)
        })
        .collect();

    candidates.sort_by(|a, b| b.end_date.cmp(&a.end_date));
    candidates.first().map(|m| m.slug.clone())
}

fn matches_rule(question: &str, as_of: NaiveDate, rule: MatchRule) -> bool {
    match rule {
        MatchRule::Keyword => question.contains(METRIC_PHRASE),
        MatchRule::Date => {
            let month = MONTH_NAMES[as_of.month0() as usize];
            question.contains(month) && question.contains(&as_of.day().to_string())
        }
    }
}
