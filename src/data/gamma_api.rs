use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::data::types::{MarketDetail, MarketSummary, Outcome};

/// Client for the Polymarket Gamma API.
pub struct GammaApiClient {
    client: Client,
    base_url: String,
}

/// Failure classes a fetch can produce. Callers decide per-context whether
/// to notify the user or log and skip the cycle.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Parse(String),
    #[error("no market found")]
    NoMarket,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    slug: Option<String>,
    question: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarketDetail {
    slug: Option<String>,
    end_date: Option<String>,
    outcomes: Option<Vec<GammaOutcome>>,
    resolved_outcome: Option<GammaResolvedOutcome>,
}

#[derive(Debug, Deserialize)]
struct GammaOutcome {
    name: String,
    price: f64,
}

#[derive(Debug, Deserialize)]
struct GammaResolvedOutcome {
    name: String,
}

impl GammaApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Fetch the full active market list.
    pub async fn fetch_markets(&self) -> Result<Vec<MarketSummary>, ApiError> {
        let url = format!("{}/markets", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::Network(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let rows: Vec<GammaMarket> = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(rows.into_iter().filter_map(convert_summary).collect())
    }

    /// Fetch one market's detail by slug.
    pub async fn fetch_market(&self, slug: &str) -> Result<MarketDetail, ApiError> {
        let url = format!("{}/market/{}", self.base_url, slug);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::NoMarket);
        }
        if !response.status().is_success() {
            return Err(ApiError::Network(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let raw: GammaMarketDetail = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        convert_detail(raw, slug)
    }
}

fn convert_summary(raw: GammaMarket) -> Option<MarketSummary> {
    let slug = raw.slug?;
    let question = raw.question?;
    let end_date = raw.end_date.as_deref().and_then(parse_end_date)?;
    Some(MarketSummary {
        slug,
        question,
        end_date,
    })
}

fn convert_detail(raw: GammaMarketDetail, slug: &str) -> Result<MarketDetail, ApiError> {
    // A detail response without an outcomes array means the slug does not
    // point at a live market.
    let outcomes = raw.outcomes.ok_or(ApiError::NoMarket)?;

    let end_date = raw
        .end_date
        .as_deref()
        .and_then(parse_end_date)
        .ok_or_else(|| ApiError::Parse(format!("market {} missing endDate", slug)))?;

    Ok(MarketDetail {
        slug: raw.slug.unwrap_or_else(|| slug.to_string()),
        end_date,
        outcomes: outcomes
            .into_iter()
            .map(|o| Outcome {
                name: o.name,
                price: o.price,
            })
            .collect(),
        resolved_outcome: raw.resolved_outcome.map(|r| r.name),
    })
}

fn parse_end_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
