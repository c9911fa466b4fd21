// =============================================================================
// Indicator History Store — Long-run trust tracking per indicator name
// =============================================================================
//
// Pure in-memory accumulator (lifetime = process/session). Each confirmed or
// rejected outcome nudges the named indicator's Laplace-smoothed success rate,
// which maps into a bounded trust multiplier the aggregator applies on every
// evaluation. New indicators start neutral (1.0); extreme performers are
// clamped so no single indicator can run away with the weighting.
// =============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;

/// Lower bound of the trust multiplier.
pub const TRUST_FLOOR: f64 = 0.7;
/// Upper bound of the trust multiplier.
pub const TRUST_CEIL: f64 = 1.3;

/// Accumulated record for one indicator name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndicatorHistoryEntry {
    pub success_count: u64,
    pub failure_count: u64,
    pub last_outcome: Option<bool>,
}

impl IndicatorHistoryEntry {
    /// Laplace-smoothed trust multiplier in `[TRUST_FLOOR, TRUST_CEIL]`.
    pub fn trust_factor(&self) -> f64 {
        let s = self.success_count as f64;
        let f = self.failure_count as f64;
        TRUST_FLOOR + 0.6 * ((s + 1.0) / (s + f + 2.0))
    }
}

/// Thread-safe success/failure tracker keyed by indicator name.
///
/// Entries are created lazily on first observation and never deleted.
#[derive(Debug, Default)]
pub struct IndicatorHistoryStore {
    entries: RwLock<HashMap<String, IndicatorHistoryEntry>>,
}

impl IndicatorHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one settled outcome for the named indicator.
    pub fn record_outcome(&self, name: &str, success: bool) {
        let mut entries = self.entries.write();
        let entry = entries.entry(name.to_string()).or_default();
        if success {
            entry.success_count += 1;
        } else {
            entry.failure_count += 1;
        }
        entry.last_outcome = Some(success);
    }

    /// Trust multiplier for the named indicator. Unknown names are neutral.
    pub fn trust_factor(&self, name: &str) -> f64 {
        self.entries
            .read()
            .get(name)
            .map(IndicatorHistoryEntry::trust_factor)
            .unwrap_or(1.0)
    }

    /// Snapshot of every tracked entry, for the API trust table.
    pub fn entries(&self) -> HashMap<String, IndicatorHistoryEntry> {
        self.entries.read().clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
