// =============================================================================
// Pending Signal — Simple one-candle confirmation
// =============================================================================
//
// The fast path of the confirmation engine. A pending signal watches exactly
// one candle, the first one closed after its creation, and settles on it:
// a candle in the signal's direction confirms with a body-sized confidence
// boost, a candle against it rejects with a flat penalty, a negligible body
// leaves it pending until the deadline strikes.
// =============================================================================

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::decision::Decision;
use crate::types::{Candle, CandleDirection, EntryPoint, Signal, Timeframe};

// -----------------------------------------------------------------------------
// Constants
// -----------------------------------------------------------------------------

/// Confidence multiplier cap on confirmation.
pub const CONFIRM_BOOST_CAP: f64 = 1.25;

/// Body ratio to boost conversion: boost = 1 + BODY_BOOST_SCALE * body_ratio.
pub const BODY_BOOST_SCALE: f64 = 50.0;

/// Confidence multiplier applied on rejection.
pub const REJECT_PENALTY: f64 = 0.65;

/// Deadline horizon, measured in candle periods.
pub const DEADLINE_CANDLES: i64 = 2;

// -----------------------------------------------------------------------------
// Types
// -----------------------------------------------------------------------------

/// How one candle settled, or failed to settle, a pending signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimpleVerdict {
    /// Direction matched; carries the adjusted confidence.
    Confirm(f64),
    /// Direction opposed; carries the penalized confidence.
    Reject(f64),
    /// Neutral candle, still inside the deadline.
    StillPending,
    /// Deadline passed without a directional candle.
    Expire,
}

/// A BUY/SELL decision awaiting its confirmation candle.
#[derive(Debug, Clone)]
pub struct PendingSignal {
    pub id: Uuid,
    pub direction: EntryPoint,
    pub original_confidence: f64,
    /// Absolute index of the latest candle at creation time.
    pub created_at_candle_index: u64,
    pub confirmation_deadline: DateTime<Utc>,
    pub requires_sequential: bool,
    /// Validity window the decision shipped with, for later rescaling.
    pub base_expiration_secs: u64,
    /// Indicator names backing the decision, for history write-back.
    pub contributors: Vec<String>,
}

impl PendingSignal {
    /// Build a pending signal from an actionable decision.
    ///
    /// Callers must only pass BUY/SELL decisions; a WAIT decision has no
    /// direction to confirm and is never registered.
    pub fn from_decision(
        decision: &Decision,
        latest_candle_index: u64,
        timeframe: Timeframe,
        requires_sequential: bool,
    ) -> Self {
        // Only the side that won carries the outcome; indicators that
        // disagreed are not punished for a decision they argued against.
        let aligned = match decision.entry_point {
            EntryPoint::Buy => Signal::Buy,
            EntryPoint::Sell => Signal::Sell,
            EntryPoint::Wait => Signal::Neutral,
        };
        let contributors = decision
            .indicators
            .iter()
            .filter(|r| r.found && r.signal == aligned)
            .map(|r| r.name.clone())
            .collect();
        Self {
            id: decision.id,
            direction: decision.entry_point,
            original_confidence: decision.confidence,
            created_at_candle_index: latest_candle_index,
            confirmation_deadline: decision.created_at
                + Duration::seconds(DEADLINE_CANDLES * timeframe.secs() as i64),
            requires_sequential,
            base_expiration_secs: decision.expires_in_secs,
            contributors,
        }
    }

    /// The absolute index of the candle that settles this signal.
    pub fn confirmation_candle_index(&self) -> u64 {
        self.created_at_candle_index + 1
    }

    /// Judge the confirmation candle against this signal's direction.
    pub fn judge(&self, candle: &Candle) -> SimpleVerdict {
        if candle.timestamp > self.confirmation_deadline {
            return SimpleVerdict::Expire;
        }
        let expected = match self.direction.expected_direction() {
            Some(dir) => dir,
            None => return SimpleVerdict::Expire,
        };
        match candle.direction() {
            CandleDirection::Neutral => SimpleVerdict::StillPending,
            dir if dir == expected => {
                let boost = (1.0 + BODY_BOOST_SCALE * candle.body_ratio()).min(CONFIRM_BOOST_CAP);
                SimpleVerdict::Confirm((self.original_confidence * boost).min(100.0))
            }
            _ => SimpleVerdict::Reject(self.original_confidence * REJECT_PENALTY),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
