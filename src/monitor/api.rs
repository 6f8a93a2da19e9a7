//! Metrics API client
//!
//! Fetches point-in-time volatility snapshots (and optionally a turnover
//! lookup) from the external market-data API. All query parameters are
//! pass-through; the API does its own ranking server-side.
//!
//! Wire format:
//! - volatility endpoint: `{"count": N, "data": [{symbol, change: {pct,
//!   direction}, price: {prev_close, close}, turnover?}]}` or `{"error": ...}`
//! - volume endpoint: `{"count": N, "data": [{symbol, turnover}]}`
//!
//! Any network error, non-success status, or `error` envelope surfaces as a
//! transient fetch error. The scheduler logs it and retries next cycle.

use super::types::{Direction, VolatilitySnapshot};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Pass-through query parameters shared by both metric endpoints.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub timeframe: String,
    pub threshold: f64,
    /// "up", "down", or "both".
    pub direction: String,
    pub sort: String,
    pub limit: u32,
    pub offset: u32,
}

impl QueryParams {
    pub fn as_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("timeframe", self.timeframe.clone()),
            ("threshold", self.threshold.to_string()),
            ("direction", self.direction.clone()),
            ("sort", self.sort.clone()),
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ]
    }
}

/// Response envelope used by both endpoints.
#[derive(Debug, Deserialize)]
struct MetricsEnvelope<T> {
    #[serde(default)]
    count: usize,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VolatilityRow {
    symbol: String,
    change: ChangeInfo,
    price: PriceInfo,
    turnover: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChangeInfo {
    pct: f64,
    direction: Direction,
}

#[derive(Debug, Deserialize)]
struct PriceInfo {
    prev_close: f64,
    close: f64,
}

#[derive(Debug, Deserialize)]
struct TurnoverRow {
    symbol: String,
    turnover: f64,
}

/// HTTP client for the volatility and volume endpoints.
pub struct MetricsClient {
    http: reqwest::Client,
    volatility_url: String,
    volume_url: Option<String>,
}

impl MetricsClient {
    /// Create a client with a bounded request timeout.
    ///
    /// The timeout applies per request so a hung upstream cannot block
    /// the polling loop indefinitely.
    pub fn new(
        volatility_url: String,
        volume_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            volatility_url,
            volume_url,
        })
    }

    pub fn has_volume_endpoint(&self) -> bool {
        self.volume_url.is_some()
    }

    /// Fetch one point-in-time snapshot of assets ranked by the upstream API.
    ///
    /// # Returns
    /// * `Ok(snapshots)` - Finite list, in the API's sort order
    /// * `Err(...)` - Transient fetch failure (network, status, or API error)
    pub async fn fetch_volatility(
        &self,
        params: &QueryParams,
    ) -> Result<Vec<VolatilitySnapshot>, Box<dyn std::error::Error + Send + Sync>> {
        let response = self
            .http
            .get(&self.volatility_url)
            .query(&params.as_query())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("volatility endpoint returned {}", response.status()).into());
        }

        let envelope: MetricsEnvelope<VolatilityRow> = response.json().await?;

        if let Some(err) = envelope.error {
            return Err(format!("volatility endpoint error: {}", err).into());
        }

        log::info!("📈 Volatility endpoint returned {} records", envelope.count);

        Ok(envelope
            .data
            .into_iter()
            .map(|row| VolatilitySnapshot {
                symbol: row.symbol,
                change_pct: row.change.pct,
                direction: row.change.direction,
                timeframe: params.timeframe.clone(),
                prev_close: row.price.prev_close,
                close: row.price.close,
                turnover: row.turnover,
            })
            .collect())
    }

    /// Fetch the turnover lookup keyed by asset symbol.
    ///
    /// Errors if no volume endpoint is configured; callers gate on
    /// [`MetricsClient::has_volume_endpoint`].
    pub async fn fetch_turnover(
        &self,
        params: &QueryParams,
    ) -> Result<HashMap<String, f64>, Box<dyn std::error::Error + Send + Sync>> {
        let url = self
            .volume_url
            .as_ref()
            .ok_or("no volume endpoint configured")?;

        let response = self.http.get(url).query(&params.as_query()).send().await?;

        if !response.status().is_success() {
            return Err(format!("volume endpoint returned {}", response.status()).into());
        }

        let envelope: MetricsEnvelope<TurnoverRow> = response.json().await?;

        if let Some(err) = envelope.error {
            return Err(format!("volume endpoint error: {}", err).into());
        }

        log::debug!("💹 Volume endpoint returned {} records", envelope.count);

        Ok(envelope
            .data
            .into_iter()
            .map(|row| (row.symbol, row.turnover))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_serialization() {
        let params = QueryParams {
            timeframe: "4h".to_string(),
            threshold: 5.0,
            direction: "up".to_string(),
            sort: "volatility_desc".to_string(),
            limit: 100,
            offset: 5,
        };

        let query = params.as_query();
        assert_eq!(query.len(), 6);
        assert!(query.contains(&("timeframe", "4h".to_string())));
        assert!(query.contains(&("threshold", "5".to_string())));
        assert!(query.contains(&("limit", "100".to_string())));
    }

    #[test]
    fn test_envelope_parsing() {
        let body = r#"{
            "count": 1,
            "data": [{
                "symbol": "FOO",
                "change": {"pct": 12.5, "direction": "up"},
                "price": {"prev_close": 1.0, "close": 1.125},
                "turnover": 250000.0
            }]
        }"#;

        let envelope: MetricsEnvelope<VolatilityRow> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.count, 1);
        assert!(envelope.error.is_none());

        let row = &envelope.data[0];
        assert_eq!(row.symbol, "FOO");
        assert_eq!(row.change.pct, 12.5);
        assert_eq!(row.change.direction, Direction::Up);
        assert_eq!(row.turnover, Some(250000.0));
    }

    #[test]
    fn test_error_envelope_parsing() {
        let body = r#"{"error": "rate limited"}"#;

        let envelope: MetricsEnvelope<VolatilityRow> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.error.as_deref(), Some("rate limited"));
        assert!(envelope.data.is_empty());
    }

    #[test]
    fn test_turnover_row_parsing() {
        let body = r#"{"count": 2, "data": [
            {"symbol": "FOO", "turnover": 100.0},
            {"symbol": "BAR", "turnover": 200.0}
        ]}"#;

        let envelope: MetricsEnvelope<TurnoverRow> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.len(), 2);
        assert_eq!(envelope.data[1].symbol, "BAR");
        assert_eq!(envelope.data[1].turnover, 200.0);
    }
}
