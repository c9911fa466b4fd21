// =============================================================================
// Decision — The outward-facing result of one evaluation pass
// =============================================================================
//
// Every evaluation produces exactly one Decision, WAIT included, so the
// audit trail shows why the engine stayed out of the market as clearly as why
// it entered. Buy/Sell decisions are immediately handed to the confirmation
// subsystem; the next evaluation supersedes the previous Decision.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::{EntryPoint, IndicatorReading};

/// One complete, auditable evaluation result.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    /// Unique identifier, shared with the pending signal it spawns.
    pub id: Uuid,

    /// BUY, SELL, or WAIT.
    pub entry_point: EntryPoint,

    /// Confidence in `0..=100`. WAIT decisions carry bounded near-miss
    /// confidence; input starvation is the only zero-confidence case.
    pub confidence: f64,

    /// Hard validity limit for the decision.
    pub expiration_time: DateTime<Utc>,

    /// Validity window in whole seconds, for display and logging.
    pub expires_in_secs: u64,

    /// The readings this decision was computed from.
    pub indicators: Vec<IndicatorReading>,

    /// Human-readable explanation; has no effect on the decision itself.
    pub narrative: String,

    pub created_at: DateTime<Utc>,
}

impl Decision {
    /// Whether this decision needs confirmation before it is actionable.
    pub fn is_actionable_candidate(&self) -> bool {
        matches!(self.entry_point, EntryPoint::Buy | EntryPoint::Sell)
    }
}
