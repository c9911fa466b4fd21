// =============================================================================
// Market Quality Estimators — Noise and volatility from raw inputs
// =============================================================================
//
// Two scalar metrics shape every downstream stage:
//
//   * `market_noise`     — how much the indicator set disagrees with itself,
//                          biased upward on OTC books.
//   * `candle_volatility`— how violently the recent candle window moves, and
//                          whether that movement trends or whips.
//
// Both are pure functions of their inputs so the whole pipeline stays
// deterministic and testable.
// =============================================================================

use serde::Serialize;

use crate::types::{Candle, CandleDirection, IndicatorReading, MarketType, Signal};

/// Noise added to every OTC evaluation.
const OTC_NOISE_BIAS: f64 = 15.0;

/// Relative candle range at which the volatility level saturates at 100.
const RANGE_SATURATION: f64 = 0.02;

/// Direction-flip share above which the window counts as whipsaw.
const WHIPSAW_FLIP_RATIO: f64 = 0.5;

/// Volatility level below which the window counts as calm.
const CALM_LEVEL: f64 = 25.0;

/// Average body ratio above which candles count as "large bodies" for the
/// expiration calculator.
const LARGE_BODY_RATIO: f64 = 0.004;

/// Shape of the recent market movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolatilityKind {
    Trend,
    Whipsaw,
    Calm,
}

/// Volatility level plus its character.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VolatilityProfile {
    /// `0..=100`.
    pub level: f64,
    pub kind: VolatilityKind,
}

impl VolatilityProfile {
    pub fn calm() -> Self {
        Self {
            level: 0.0,
            kind: VolatilityKind::Calm,
        }
    }
}

/// Disagreement among the found indicators, `0..=100`.
///
/// A window where every found indicator points the same way is quiet; an even
/// buy/sell split is maximally noisy. Strength dispersion adds a smaller
/// second term, and OTC books carry a fixed upward bias.
pub fn market_noise(readings: &[IndicatorReading], market_type: MarketType) -> f64 {
    let found: Vec<&IndicatorReading> = readings.iter().filter(|r| r.found).collect();
    if found.is_empty() {
        // No information at all: treat as moderately noisy rather than quiet.
        return match market_type {
            MarketType::Regular => 50.0,
            MarketType::Otc => 50.0 + OTC_NOISE_BIAS,
        }
        .min(100.0);
    }

    let buys = found.iter().filter(|r| r.signal == Signal::Buy).count() as f64;
    let sells = found.iter().filter(|r| r.signal == Signal::Sell).count() as f64;
    let directional = buys + sells;

    // 0 when one-sided, 1 when perfectly split.
    let disagreement = if directional > 0.0 {
        1.0 - (buys - sells).abs() / directional
    } else {
        1.0
    };

    // Dispersion of reported strengths around their mean, normalized to 0..1.
    let mean = found.iter().map(|r| r.strength).sum::<f64>() / found.len() as f64;
    let variance =
        found.iter().map(|r| (r.strength - mean).powi(2)).sum::<f64>() / found.len() as f64;
    let dispersion = (variance.sqrt() / 50.0).min(1.0);

    let mut noise = disagreement * 70.0 + dispersion * 30.0;
    if market_type == MarketType::Otc {
        noise += OTC_NOISE_BIAS;
    }
    noise.clamp(0.0, 100.0)
}

/// Volatility profile of the recent candle window.
///
/// Level comes from the average relative high-low range; the kind from how
/// often consecutive candles flip direction. Deterministic for a given window.
pub fn candle_volatility(candles: &[Candle]) -> VolatilityProfile {
    if candles.len() < 2 {
        return VolatilityProfile::calm();
    }

    let mut range_sum = 0.0;
    for c in candles {
        if c.open.abs() > f64::EPSILON {
            range_sum += (c.high - c.low).abs() / c.open;
        }
    }
    let avg_range = range_sum / candles.len() as f64;
    let level = (avg_range / RANGE_SATURATION * 100.0).clamp(0.0, 100.0);

    // Count direction flips between consecutive non-neutral candles.
    let directions: Vec<CandleDirection> = candles
        .iter()
        .map(Candle::direction)
        .filter(|d| *d != CandleDirection::Neutral)
        .collect();
    let mut flips = 0usize;
    for pair in directions.windows(2) {
        if pair[0] != pair[1] {
            flips += 1;
        }
    }
    let flip_ratio = if directions.len() > 1 {
        flips as f64 / (directions.len() - 1) as f64
    } else {
        0.0
    };

    let kind = if level < CALM_LEVEL {
        VolatilityKind::Calm
    } else if flip_ratio > WHIPSAW_FLIP_RATIO {
        VolatilityKind::Whipsaw
    } else {
        VolatilityKind::Trend
    };

    VolatilityProfile { level, kind }
}

/// Whether the recent window shows unusually large candle bodies.
///
/// Feeds the expiration calculator's large-body discount.
pub fn has_large_bodies(candles: &[Candle]) -> bool {
    if candles.is_empty() {
        return false;
    }
    let avg_body = candles.iter().map(Candle::body_ratio).sum::<f64>() / candles.len() as f64;
    avg_body > LARGE_BODY_RATIO
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndicatorKind;
    use chrono::Utc;

    fn reading(signal: Signal, strength: f64) -> IndicatorReading {
        IndicatorReading::new("test", IndicatorKind::Trendline, signal, strength)
    }

    fn candle(index: u64, open: f64, close: f64, spread: f64) -> Candle {
        Candle {
            open,
            high: open.max(close) + spread,
            low: open.min(close) - spread,
            close,
            timestamp: Utc::now(),
            index,
        }
    }

    #[test]
    fn unanimous_indicators_are_quiet() {
        let readings = vec![reading(Signal::Buy, 80.0), reading(Signal::Buy, 80.0)];
        let noise = market_noise(&readings, MarketType::Regular);
        assert!(noise < 10.0, "unanimous noise was {noise}");
    }

    #[test]
    fn split_indicators_are_noisy() {
        let readings = vec![reading(Signal::Buy, 80.0), reading(Signal::Sell, 80.0)];
        let noise = market_noise(&readings, MarketType::Regular);
        assert!(noise > 60.0, "split noise was {noise}");
    }

    #[test]
    fn otc_biases_noise_upward() {
        let readings = vec![reading(Signal::Buy, 80.0), reading(Signal::Sell, 80.0)];
        let regular = market_noise(&readings, MarketType::Regular);
        let otc = market_noise(&readings, MarketType::Otc);
        assert!(otc > regular);
        assert!(otc <= 100.0);
    }

    #[test]
    fn noise_is_deterministic() {
        let readings = vec![reading(Signal::Buy, 62.5), reading(Signal::Sell, 41.0)];
        let a = market_noise(&readings, MarketType::Otc);
        let b = market_noise(&readings, MarketType::Otc);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_window_is_calm() {
        let profile = candle_volatility(&[]);
        assert_eq!(profile.kind, VolatilityKind::Calm);
        assert_eq!(profile.level, 0.0);
    }

    #[test]
    fn wide_ranges_raise_the_level() {
        // 1% range per candle on a 1.0 price => level well above calm.
        let candles: Vec<Candle> = (0..10)
            .map(|i| candle(i, 1.0, 1.005, 0.005))
            .collect();
        let profile = candle_volatility(&candles);
        assert!(profile.level > CALM_LEVEL, "level was {}", profile.level);
    }

    #[test]
    fn alternating_candles_classify_as_whipsaw() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    candle(i, 1.0, 1.008, 0.004)
                } else {
                    candle(i, 1.008, 1.0, 0.004)
                }
            })
            .collect();
        let profile = candle_volatility(&candles);
        assert_eq!(profile.kind, VolatilityKind::Whipsaw);
    }

    #[test]
    fn one_way_candles_classify_as_trend() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| {
                let base = 1.0 + i as f64 * 0.008;
                candle(i, base, base + 0.008, 0.004)
            })
            .collect();
        let profile = candle_volatility(&candles);
        assert_eq!(profile.kind, VolatilityKind::Trend);
    }

    #[test]
    fn large_bodies_detected() {
        let big: Vec<Candle> = (0..5).map(|i| candle(i, 1.0, 1.01, 0.001)).collect();
        let small: Vec<Candle> = (0..5).map(|i| candle(i, 1.0, 1.0005, 0.001)).collect();
        assert!(has_large_bodies(&big));
        assert!(!has_large_bodies(&small));
        assert!(!has_large_bodies(&[]));
    }
}
