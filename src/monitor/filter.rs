//! Filter Engine
//!
//! Turns a raw snapshot list into a capped candidate list. Threshold and
//! ordering are applied here rather than trusted from the upstream API, so
//! the behavior is testable without a live ranking.
//!
//! Rules, in order:
//! 1. Drop snapshots below the change threshold (absolute value).
//! 2. Sort by move magnitude, descending (stable).
//! 3. If a volume threshold is set, drop snapshots whose turnover is below
//!    it or unknown. Unknown turnover fails closed, not open.
//! 4. Truncate to the per-cycle notification cap.

use super::types::VolatilitySnapshot;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct FilterParams {
    /// Minimum |change_pct| for a snapshot to qualify.
    pub threshold: f64,
    /// Minimum turnover; 0 disables the volume gate entirely.
    pub volume_threshold: f64,
    /// Per-cycle cap on candidates.
    pub max_notifications: usize,
}

/// Result of one filter pass.
#[derive(Debug)]
pub struct FilterOutcome {
    /// At most `max_notifications` snapshots, strongest moves first.
    pub candidates: Vec<VolatilitySnapshot>,
    /// How many snapshots matched before the cap was applied.
    pub matched: usize,
}

/// Apply threshold, volume-gate, and cap rules to one cycle's snapshots.
///
/// When a `turnover` lookup is present it is the only source consulted;
/// a symbol missing from it is treated as filtered out whenever the
/// volume gate is active. Without a lookup, the snapshot's own turnover
/// field decides, with unknown values likewise filtered out.
pub fn select_candidates(
    snapshots: Vec<VolatilitySnapshot>,
    turnover: Option<&HashMap<String, f64>>,
    params: &FilterParams,
) -> FilterOutcome {
    let mut candidates: Vec<VolatilitySnapshot> = snapshots
        .into_iter()
        .filter(|s| s.change_pct.abs() >= params.threshold)
        .collect();

    candidates.sort_by(|a, b| {
        b.change_pct
            .abs()
            .partial_cmp(&a.change_pct.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if params.volume_threshold > 0.0 {
        candidates.retain(|s| {
            // A provided lookup is authoritative: a symbol it does not
            // cover is excluded. The snapshot's own turnover field only
            // counts when no lookup was requested.
            let turnover = match turnover {
                Some(map) => map.get(&s.symbol).copied(),
                None => s.turnover,
            };

            matches!(turnover, Some(v) if v >= params.volume_threshold)
        });
    }

    let matched = candidates.len();
    candidates.truncate(params.max_notifications);

    FilterOutcome {
        candidates,
        matched,
    }
}
