// =============================================================================
// Expiration Calculator — Risk-compounded decision validity windows
// =============================================================================
//
// A decision's validity starts from a timeframe-keyed base and shrinks for
// every risk factor present. Each factor is an independent multiplier <= 1.0,
// so adding one never lengthens the window. The result is floored to whole
// seconds with a hard minimum of 1 s — a confirmation check is never scheduled
// in the past.
// =============================================================================

use crate::types::{MarketType, Timeframe};

/// OTC books reverse faster; their decisions expire sooner.
const OTC_FACTOR: f64 = 0.85;

/// High-conviction entries get a slightly tighter window — the edge decays.
const HIGH_CONFIDENCE_FACTOR: f64 = 0.90;
const HIGH_CONFIDENCE_LEVEL: f64 = 85.0;

/// Volatile windows shorten validity.
const HIGH_VOLATILITY_FACTOR: f64 = 0.90;
const HIGH_VOLATILITY_LEVEL: f64 = 65.0;

/// Large candle bodies mean fast price discovery; shorten validity.
const LARGE_BODY_FACTOR: f64 = 0.90;

/// Everything the calculator needs; pure data in, seconds out.
#[derive(Debug, Clone, Copy)]
pub struct ExpirationInputs {
    pub timeframe: Timeframe,
    pub market_type: MarketType,
    pub confidence: f64,
    pub volatility_level: f64,
    pub large_bodies: bool,
}

/// Compute the validity window in whole seconds (>= 1).
pub fn expiration_secs(inputs: ExpirationInputs) -> u64 {
    let base = match inputs.timeframe {
        Timeframe::S30 => 30.0,
        _ => 60.0,
    };

    let mut duration = base;
    if inputs.market_type == MarketType::Otc {
        duration *= OTC_FACTOR;
    }
    if inputs.confidence > HIGH_CONFIDENCE_LEVEL {
        duration *= HIGH_CONFIDENCE_FACTOR;
    }
    if inputs.volatility_level > HIGH_VOLATILITY_LEVEL {
        duration *= HIGH_VOLATILITY_FACTOR;
    }
    if inputs.large_bodies {
        duration *= LARGE_BODY_FACTOR;
    }

    (duration.floor() as u64).max(1)
}

// =============================================================================
// Tests
// =============================================================================
