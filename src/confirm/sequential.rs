// =============================================================================
// Sequential Candle Validator — Multi-candle validation for shaky signals
// =============================================================================
//
// Low-confidence and fast-timeframe signals are not settled by a single
// candle. They must accumulate a consecutive run of candles in their
// direction: matching candles advance the counter and record body strength,
// an opposing candle resets the counter to zero (the signal survives, and the
// deadline is extended exactly once), neutral candles pass through untouched.
// Completing the run validates the signal with a strength-scaled confidence
// lift and a widened expiration window.
// =============================================================================

use chrono::Duration;

use crate::types::{Candle, CandleDirection, Timeframe};

use super::pending::PendingSignal;

// -----------------------------------------------------------------------------
// Constants
// -----------------------------------------------------------------------------

/// Validated confidence ceiling.
pub const VALIDATED_CONFIDENCE_CAP: f64 = 95.0;

/// Confidence added per unit of sequence strength.
pub const STRENGTH_CONFIDENCE_SCALE: f64 = 15.0;

/// Expiration growth per unit of sequence strength.
pub const STRENGTH_EXPIRATION_SCALE: f64 = 0.5;

/// Body ratio that counts as a full-strength candle.
pub const FULL_STRENGTH_BODY_RATIO: f64 = 0.008;

/// Deadline extension granted on the first reset, in candle periods.
const EXTENSION_CANDLES: i64 = 2;

// -----------------------------------------------------------------------------
// Types
// -----------------------------------------------------------------------------

/// What one observed candle did to the validation run.
#[derive(Debug, Clone, PartialEq)]
pub enum SequentialStep {
    /// Counter advanced; not yet complete.
    Progress { validated: u32, required: u32 },
    /// Opposing candle; counter reset, `extended` reports whether the
    /// one-shot deadline extension was granted on this reset.
    Reset { extended: bool },
    /// Neutral candle; nothing changed.
    Ignored,
    /// Run complete.
    Validated {
        final_confidence: f64,
        adjusted_expiration_secs: u64,
    },
    /// Deadline passed before the run completed.
    Expired,
}

/// A pending signal on the sequential validation path.
#[derive(Debug, Clone)]
pub struct SequentialSignal {
    pub base: PendingSignal,
    pub required_candles: u32,
    pub validated_candles: u32,
    pub last_candle_index_seen: u64,
    /// All non-neutral candles observed, including resets.
    pub candles_observed: u32,
    pub body_strengths: Vec<f64>,
    pub deadline_extended: bool,
    timeframe: Timeframe,
}

/// Consecutive matching candles required before validation.
pub fn required_candles(confidence: f64, timeframe: Timeframe) -> u32 {
    let base: i64 = if confidence >= 80.0 {
        2
    } else if confidence >= 65.0 {
        3
    } else {
        4
    };
    let adjusted = if timeframe.is_fast() {
        base + 1
    } else if timeframe.is_slow() {
        base - 1
    } else {
        base
    };
    adjusted.clamp(2, 5) as u32
}

impl SequentialSignal {
    pub fn new(base: PendingSignal, timeframe: Timeframe) -> Self {
        let required = required_candles(base.original_confidence, timeframe);
        let last_seen = base.created_at_candle_index;
        Self {
            base,
            required_candles: required,
            validated_candles: 0,
            last_candle_index_seen: last_seen,
            candles_observed: 0,
            body_strengths: Vec::new(),
            deadline_extended: false,
            timeframe,
        }
    }

    /// Average body strength discounted by the run's consistency (matching
    /// candles over all directional candles observed).
    pub fn sequence_strength(&self) -> f64 {
        if self.body_strengths.is_empty() || self.candles_observed == 0 {
            return 0.0;
        }
        let avg = self.body_strengths.iter().sum::<f64>() / self.body_strengths.len() as f64;
        let consistency = self.validated_candles as f64 / self.candles_observed as f64;
        avg * consistency
    }

    /// Feed one newly closed candle into the run.
    ///
    /// Candles at or before `last_candle_index_seen` are ignored so re-delivery
    /// after log pruning cannot double-count.
    pub fn observe(&mut self, candle: &Candle) -> SequentialStep {
        if candle.index <= self.last_candle_index_seen {
            return SequentialStep::Ignored;
        }
        self.last_candle_index_seen = candle.index;

        if candle.timestamp > self.base.confirmation_deadline {
            return SequentialStep::Expired;
        }

        let expected = match self.base.direction.expected_direction() {
            Some(dir) => dir,
            None => return SequentialStep::Expired,
        };

        match candle.direction() {
            CandleDirection::Neutral => SequentialStep::Ignored,
            dir if dir == expected => {
                self.candles_observed += 1;
                self.validated_candles += 1;
                self.body_strengths
                    .push((candle.body_ratio() / FULL_STRENGTH_BODY_RATIO).min(1.0));

                if self.validated_candles >= self.required_candles {
                    let strength = self.sequence_strength();
                    let final_confidence = (self.base.original_confidence
                        + STRENGTH_CONFIDENCE_SCALE * strength)
                        .min(VALIDATED_CONFIDENCE_CAP);
                    let adjusted = (self.base.base_expiration_secs as f64
                        * (1.0 + STRENGTH_EXPIRATION_SCALE * strength))
                        .floor() as u64;
                    SequentialStep::Validated {
                        final_confidence,
                        adjusted_expiration_secs: adjusted,
                    }
                } else {
                    SequentialStep::Progress {
                        validated: self.validated_candles,
                        required: self.required_candles,
                    }
                }
            }
            _ => {
                self.candles_observed += 1;
                self.validated_candles = 0;
                let extended = if self.deadline_extended {
                    false
                } else {
                    self.deadline_extended = true;
                    self.base.confirmation_deadline +=
                        Duration::seconds(EXTENSION_CANDLES * self.timeframe.secs() as i64);
                    true
                };
                SequentialStep::Reset { extended }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
