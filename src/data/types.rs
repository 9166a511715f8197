use chrono::{DateTime, Utc};

/// A tracked city whose daily temperature market is monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Station {
    London,
    Nyc,
}

impl Station {
    pub const ALL: [Station; 2] = [Station::London, Station::Nyc];

    /// Lowercase keyword expected in the market question.
    pub fn keyword(&self) -> &'static str {
        match self {
            Station::London => "london",
            Station::Nyc => "nyc",
        }
    }

    /// Bracketed label used in alert messages.
    pub fn label(&self) -> &'static str {
        match self {
            Station::London => "LONDON",
            Station::Nyc => "NYC",
        }
    }

    /// Prose name used in command replies.
    pub fn name(&self) -> &'static str {
        match self {
            Station::London => "London",
            Station::Nyc => "NYC",
        }
    }

    pub fn parse(s: &str) -> Option<Station> {
        match s.to_lowercase().as_str() {
            "london" => Some(Station::London),
            "nyc" => Some(Station::Nyc),
            _ => None,
        }
    }
}

/// One row of the market list endpoint.
#[derive(Debug, Clone)]
pub struct MarketSummary {
    pub slug: String,
    pub question: String,
    pub end_date: DateTime<Utc>,
}

/// One possible answer within a market, with its implied-probability price.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub name: String,
    pub price: f64,
}

/// Full market detail fetched per slug.
#[derive(Debug, Clone)]
pub struct MarketDetail {
    #[allow(dead_code)]
    pub slug: String,
    pub end_date: DateTime<Utc>,
    pub outcomes: Vec<Outcome>,
    pub resolved_outcome: Option<String>,
}
