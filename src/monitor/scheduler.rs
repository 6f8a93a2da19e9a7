//! Scheduler loop
//!
//! Drives the fetch, filter, dedup, notify, record pipeline at a fixed
//! interval. One cycle runs to completion before the next tick fires; the
//! loop never overlaps cycles and never exits on transient failures.
//!
//! Ordering within a cycle is notify-then-record: ledger rows are written
//! only after the webhook confirmed delivery. A crash between send and
//! record can produce a duplicate alert, which is the accepted trade-off
//! against permanently silencing an asset that was never delivered.

use super::api::{MetricsClient, QueryParams};
use super::config::MonitorConfig;
use super::filter::{select_candidates, FilterParams};
use super::ledger::{NotificationKey, NotificationLedger, NotificationRecord};
use super::notifier::{AlertContext, AlertSink, Delivery};
use super::types::VolatilitySnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

/// Per-cycle counters, logged at info level after each tick.
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub fetched: usize,
    pub candidates: usize,
    pub suppressed: usize,
    pub notified: usize,
    pub delivery_failed: bool,
}

/// One monitoring pipeline: client, filter policy, ledger, and alert sink.
pub struct Monitor {
    client: MetricsClient,
    ledger: NotificationLedger,
    sink: Arc<dyn AlertSink>,
    query: QueryParams,
    filter: FilterParams,
    direction: String,
}

impl Monitor {
    pub fn new(
        client: MetricsClient,
        ledger: NotificationLedger,
        sink: Arc<dyn AlertSink>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            client,
            ledger,
            sink,
            query: config.query_params(),
            filter: config.filter_params(),
            direction: config.direction.clone(),
        }
    }

    /// Execute one full cycle against the live endpoints.
    pub async fn run_cycle(&self) -> Result<CycleSummary, Box<dyn std::error::Error + Send + Sync>> {
        let snapshots = self.client.fetch_volatility(&self.query).await?;

        let turnover = if self.filter.volume_threshold > 0.0 && self.client.has_volume_endpoint() {
            match self.client.fetch_turnover(&self.query).await {
                Ok(map) => Some(map),
                Err(e) => {
                    // An empty lookup is authoritative, so a failed fetch
                    // fails the whole gate closed for this cycle.
                    log::warn!("⚠️  Turnover fetch failed: {}", e);
                    Some(HashMap::new())
                }
            }
        } else {
            None
        };

        let now = chrono::Utc::now().timestamp();
        self.process(snapshots, turnover.as_ref(), now).await
    }

    /// Filter, dedup-check, notify, and record one cycle's snapshots.
    ///
    /// Split from [`Monitor::run_cycle`] so the policy can be exercised in
    /// tests without live endpoints.
    pub async fn process(
        &self,
        snapshots: Vec<VolatilitySnapshot>,
        turnover: Option<&HashMap<String, f64>>,
        now: i64,
    ) -> Result<CycleSummary, Box<dyn std::error::Error + Send + Sync>> {
        let mut summary = CycleSummary {
            fetched: snapshots.len(),
            ..Default::default()
        };

        let outcome = select_candidates(snapshots, turnover, &self.filter);
        summary.candidates = outcome.candidates.len();
        let overflow = outcome.matched - outcome.candidates.len();

        let mut eligible: Vec<(VolatilitySnapshot, NotificationKey)> = Vec::new();
        for snap in outcome.candidates {
            let key = NotificationKey::new(&snap.symbol, snap.direction, &snap.timeframe, snap.change_pct);

            match self.ledger.should_notify(&key, now).await {
                Ok(true) => eligible.push((snap, key)),
                Ok(false) => {
                    summary.suppressed += 1;
                    log::debug!("🔕 {} suppressed within renotify buffer", key.as_storage_key());
                }
                Err(e) => {
                    // Fail closed: without a readable ledger we risk spam,
                    // so the asset sits out this cycle.
                    summary.suppressed += 1;
                    log::error!("❌ Ledger check failed for {}: {}", key.as_storage_key(), e);
                }
            }
        }

        if eligible.is_empty() {
            log::info!("ℹ️  No eligible assets this cycle");
            return Ok(summary);
        }

        let ctx = AlertContext {
            timeframe: self.query.timeframe.clone(),
            threshold: self.filter.threshold,
            direction: self.direction.clone(),
            overflow,
            suppressed: summary.suppressed,
        };

        let batch: Vec<VolatilitySnapshot> = eligible.iter().map(|(s, _)| s.clone()).collect();

        match self.sink.send(&batch, &ctx).await {
            Delivery::Delivered => {
                for (snap, key) in &eligible {
                    let record = NotificationRecord {
                        key: key.clone(),
                        change_pct: snap.change_pct,
                        notified_at: now,
                    };

                    if let Err(e) = self.ledger.record(&record).await {
                        log::error!(
                            "❌ Failed to record notification for {}: {}",
                            key.as_storage_key(),
                            e
                        );
                    }
                }
                summary.notified = eligible.len();
            }
            Delivery::Failed(reason) => {
                // No records written; the same assets stay eligible next cycle.
                summary.delivery_failed = true;
                log::warn!("⚠️  Webhook delivery failed: {}", reason);
            }
        }

        Ok(summary)
    }
}

/// Run the monitor until the shutdown signal flips.
///
/// Each tick runs one cycle end-to-end; a failed cycle is logged and the
/// loop waits for the next tick. Exits between cycles on shutdown so no
/// partial ledger writes are left behind.
pub async fn monitor_loop(
    monitor: Monitor,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    log::info!(
        "⏰ Starting monitor loop (interval: {}s)",
        poll_interval.as_secs()
    );

    let mut timer = interval(poll_interval);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                match monitor.run_cycle().await {
                    Ok(summary) => {
                        log::info!(
                            "✅ Cycle complete: fetched={} candidates={} suppressed={} notified={}{}",
                            summary.fetched,
                            summary.candidates,
                            summary.suppressed,
                            summary.notified,
                            if summary.delivery_failed { " (delivery failed)" } else { "" },
                        );
                    }
                    Err(e) => {
                        log::error!("❌ Cycle failed, retrying next tick: {}", e);
                    }
                }
            }
            _ = shutdown.changed() => {
                log::info!("🛑 Shutdown signal received, stopping monitor loop");
                break;
            }
        }
    }
}
