//! # Volatility alert monitor
//!
//! Polls an external market-data API for price-volatility metrics, filters
//! the results against configurable thresholds, and posts deduplicated
//! alerts to a Discord webhook.
//!
//! Pipeline per cycle: fetch → filter → dedup-check → notify → record.
//! The only durable state is the notification ledger (SQLite), which
//! carries the dedup history across restarts.
//!
//! ## Module Organization
//!
//! - `types` - Core data structures (VolatilitySnapshot, Direction)
//! - `api` - Metrics API client (volatility + volume endpoints)
//! - `filter` - Threshold, volume-gate, and cap rules
//! - `ledger` - Durable dedup store and renotify policy
//! - `notifier` - Discord webhook delivery
//! - `scheduler` - The polling loop
//! - `config` - Environment-driven configuration

pub mod api;
pub mod config;
pub mod filter;
pub mod ledger;
pub mod notifier;
pub mod scheduler;
pub mod types;

// Re-export commonly used types
pub use api::{MetricsClient, QueryParams};
pub use config::{ConfigError, MonitorConfig};
pub use filter::{select_candidates, FilterOutcome, FilterParams};
pub use ledger::{
    MemoryStore, NotificationKey, NotificationLedger, NotificationRecord, NotificationStore,
    SqliteStore,
};
pub use notifier::{AlertContext, AlertSink, Delivery, DiscordNotifier};
pub use scheduler::{monitor_loop, CycleSummary, Monitor};
pub use types::{Direction, VolatilitySnapshot};
