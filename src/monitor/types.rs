//! Core data types shared across the monitor pipeline

use serde::{Deserialize, Serialize};

/// Direction of a price move over the observed timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// One asset's price move as reported by the volatility endpoint.
///
/// Produced fresh each poll cycle and never persisted. Only the
/// notification ledger keeps state between cycles.
#[derive(Debug, Clone)]
pub struct VolatilitySnapshot {
    pub symbol: String,
    /// Signed percent change (positive for up moves, negative for down).
    pub change_pct: f64,
    pub direction: Direction,
    /// Observed timeframe, e.g. "1h", "4h", "1d".
    pub timeframe: String,
    pub prev_close: f64,
    pub close: f64,
    /// Trading volume in quote-currency terms, when the endpoint reports it.
    pub turnover: Option<f64>,
}
