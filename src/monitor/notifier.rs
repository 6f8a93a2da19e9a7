//! Discord webhook notifier
//!
//! Formats the capped, dedup-checked candidate list into a single embed and
//! POSTs it to the configured webhook. Delivery is best-effort: the outcome
//! is reported as an explicit [`Delivery`] value so the scheduler can decide
//! whether to commit ledger records, never as a swallowed error.

use super::types::{Direction, VolatilitySnapshot};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Outcome of one webhook delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Delivered,
    Failed(String),
}

/// Context rendered into the embed title, description, and footer.
#[derive(Debug, Clone)]
pub struct AlertContext {
    pub timeframe: String,
    pub threshold: f64,
    /// Configured scan direction: "up", "down", or "both".
    pub direction: String,
    /// Candidates that matched but were cut by the per-cycle cap.
    pub overflow: usize,
    /// Candidates skipped because they were notified recently.
    pub suppressed: usize,
}

/// Delivery seam between the scheduler and the outside world.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one batch. Must not panic on failure; report it instead.
    async fn send(&self, candidates: &[VolatilitySnapshot], ctx: &AlertContext) -> Delivery;
}

pub struct DiscordNotifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(
        webhook_url: String,
        timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { http, webhook_url })
    }
}

/// Build the webhook payload: one embed, one inline field per candidate.
pub fn build_payload(candidates: &[VolatilitySnapshot], ctx: &AlertContext) -> serde_json::Value {
    let (title_word, color) = match ctx.direction.as_str() {
        "up" => ("surge", 0x00ff00),
        "down" => ("drop", 0xff0000),
        _ => ("move", 0x0099ff),
    };

    let mut description = format!(
        "{} assets moved {}%+ on the {} timeframe",
        candidates.len(),
        ctx.threshold,
        ctx.timeframe
    );
    if ctx.suppressed > 0 {
        description.push_str(&format!(
            " ({} skipped as recently notified)",
            ctx.suppressed
        ));
    }

    let mut fields: Vec<serde_json::Value> = candidates
        .iter()
        .map(|c| {
            let (marker, sign) = match c.direction {
                Direction::Up => ("📈", "+"),
                Direction::Down => ("📉", ""),
            };

            json!({
                "name": format!("{} {}", marker, c.symbol),
                "value": format!(
                    "**{}{:.2}%**\n`{:.6}` → `{:.6}`",
                    sign, c.change_pct, c.prev_close, c.close
                ),
                "inline": true,
            })
        })
        .collect();

    if ctx.overflow > 0 {
        fields.push(json!({
            "name": "More",
            "value": format!("{} additional assets matched the criteria...", ctx.overflow),
            "inline": false,
        }));
    }

    json!({
        "embeds": [{
            "title": format!("🚀 Price {} alert", title_word),
            "description": description,
            "color": color,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "fields": fields,
            "footer": {
                "text": format!(
                    "threshold: {}% | timeframe: {} | direction: {}",
                    ctx.threshold, ctx.timeframe, ctx.direction
                ),
            },
        }]
    })
}

#[async_trait]
impl AlertSink for DiscordNotifier {
    async fn send(&self, candidates: &[VolatilitySnapshot], ctx: &AlertContext) -> Delivery {
        let payload = build_payload(candidates, ctx);

        match self.http.post(&self.webhook_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                log::info!("📨 Webhook delivered: {} assets", candidates.len());
                Delivery::Delivered
            }
            Ok(response) => Delivery::Failed(format!("webhook returned {}", response.status())),
            Err(e) => Delivery::Failed(e.to_string()),
        }
    }
}
