// =============================================================================
// Entry Gate — Adaptive threshold + differential dominance test
// =============================================================================
//
// A stateless pure decision stage. Noisier, more volatile, or OTC conditions
// raise both the absolute threshold and the ratio by which the dominant side
// must beat the other, so marginal majorities never trigger trades. Extreme
// volatility overrides everything with a forced WAIT.
//
// Rule order (first match wins):
//   1. volatility > 80            => WAIT, capped confidence
//   2. buy clears threshold + differential dominance  => BUY
//   3. symmetric                  => SELL
//   4. otherwise                  => WAIT with bounded near-miss confidence
// =============================================================================

use serde::Serialize;
use tracing::debug;

use crate::market_quality::{VolatilityKind, VolatilityProfile};
use crate::scoring::aggregator::AggregateScores;
use crate::types::{EntryPoint, MarketContext, MarketType, PrecisionLevel, Signal};

/// Hard WAIT override above this volatility level.
const EXTREME_VOLATILITY: f64 = 80.0;

/// Maximum confidence any decision can report.
const CONFIDENCE_CAP: f64 = 98.0;

/// Fraction of confidence removed at volatility level 100.
const VOLATILITY_CONFIDENCE_PENALTY: f64 = 0.25;

/// Near-miss WAIT confidence bounds.
const WAIT_CONFIDENCE_MIN: f64 = 30.0;
const WAIT_CONFIDENCE_MAX: f64 = 60.0;

/// The gate's verdict plus the thresholds it applied, for the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct GateDecision {
    pub entry_point: EntryPoint,
    pub confidence: f64,
    pub narrative: String,
    /// Threshold the dominant side had to clear.
    pub threshold: f64,
    /// Ratio by which the dominant side had to beat the other.
    pub differential_factor: f64,
}

pub struct EntryGate;

impl EntryGate {
    /// Evaluate normalized scores into a ternary decision.
    pub fn decide(
        scores: &AggregateScores,
        noise: f64,
        volatility: &VolatilityProfile,
        ctx: &MarketContext,
    ) -> GateDecision {
        let threshold = Self::confidence_threshold(noise, volatility.level, ctx);
        let differential_factor = Self::differential_factor(volatility.level, ctx);

        // ── Input starvation: nothing found, nothing to say ─────────────
        if scores.total_weight <= 0.0 {
            return GateDecision {
                entry_point: EntryPoint::Wait,
                confidence: 0.0,
                narrative: "no indicators found".to_string(),
                threshold,
                differential_factor,
            };
        }

        let nb = scores.normalized_buy;
        let ns = scores.normalized_sell;

        // ── 1. Extreme volatility override ──────────────────────────────
        if volatility.level > EXTREME_VOLATILITY {
            let confidence = (40.0 + volatility.level / 2.0).min(75.0);
            return GateDecision {
                entry_point: EntryPoint::Wait,
                confidence,
                narrative: Self::narrative(EntryPoint::Wait, scores, noise, volatility, ctx),
                threshold,
                differential_factor,
            };
        }

        let penalty = 1.0 - VOLATILITY_CONFIDENCE_PENALTY * volatility.level / 100.0;

        // ── 2. Buy dominance ────────────────────────────────────────────
        let entry_point = if nb > threshold && nb > ns * differential_factor {
            EntryPoint::Buy
        } else if ns > threshold && ns > nb * differential_factor {
            // ── 3. Sell dominance ───────────────────────────────────────
            EntryPoint::Sell
        } else {
            // ── 4. Near miss ────────────────────────────────────────────
            EntryPoint::Wait
        };

        let confidence = match entry_point {
            EntryPoint::Buy => (nb * 100.0 * penalty).min(CONFIDENCE_CAP),
            EntryPoint::Sell => (ns * 100.0 * penalty).min(CONFIDENCE_CAP),
            EntryPoint::Wait => {
                // Bounded, non-zero: how close did the stronger side come?
                let stronger = nb.max(ns);
                let closeness = (stronger / threshold).min(1.0);
                (WAIT_CONFIDENCE_MIN + 30.0 * closeness)
                    .clamp(WAIT_CONFIDENCE_MIN, WAIT_CONFIDENCE_MAX)
            }
        };

        debug!(
            entry = %entry_point,
            buy = format!("{nb:.3}"),
            sell = format!("{ns:.3}"),
            threshold = format!("{threshold:.3}"),
            differential = format!("{differential_factor:.2}"),
            confidence = format!("{confidence:.1}"),
            "entry gate evaluated"
        );

        GateDecision {
            entry_point,
            confidence,
            narrative: Self::narrative(entry_point, scores, noise, volatility, ctx),
            threshold,
            differential_factor,
        }
    }

    /// Adaptive absolute threshold. Every adjustment is monotonically
    /// increasing in its input.
    fn confidence_threshold(noise: f64, volatility: f64, ctx: &MarketContext) -> f64 {
        let base = match ctx.precision {
            PrecisionLevel::Low => 0.50,
            PrecisionLevel::Normal => 0.55,
            PrecisionLevel::High => 0.62,
        };
        let noise_adjustment = noise / 100.0 * 0.10;
        let volatility_adjustment = volatility / 100.0 * 0.08;
        let market_adjustment = match ctx.market_type {
            MarketType::Regular => 0.0,
            MarketType::Otc => 0.05,
        };
        base + noise_adjustment + volatility_adjustment + market_adjustment
    }

    /// Minimum ratio of dominant over weaker side.
    fn differential_factor(volatility: f64, ctx: &MarketContext) -> f64 {
        let mut factor = 1.15 + 0.20 * volatility / 100.0;
        if ctx.market_type == MarketType::Otc {
            factor += 0.10;
        }
        factor
    }

    /// Compose the explanation string: strongest market-condition note,
    /// strongest contributor, confluence note, warning note — each optional,
    /// in that fixed order.
    fn narrative(
        entry_point: EntryPoint,
        scores: &AggregateScores,
        noise: f64,
        volatility: &VolatilityProfile,
        ctx: &MarketContext,
    ) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(4);

        // Market-condition note: pick the most severe that applies.
        if volatility.level > EXTREME_VOLATILITY {
            parts.push("extreme volatility override".to_string());
        } else if noise > 70.0 {
            parts.push("heavy indicator disagreement".to_string());
        } else if volatility.kind == VolatilityKind::Whipsaw {
            parts.push("whipsaw conditions".to_string());
        } else if volatility.kind == VolatilityKind::Calm {
            parts.push("calm market".to_string());
        }

        if let Some(strongest) = scores.strongest_contributor() {
            parts.push(format!("led by {}", strongest.name));
        }

        // Confluence: found indicators agreeing with the chosen side.
        let agreeing_side = match entry_point {
            EntryPoint::Buy => Some(Signal::Buy),
            EntryPoint::Sell => Some(Signal::Sell),
            EntryPoint::Wait => None,
        };
        if let Some(side) = agreeing_side {
            let agreeing = scores.contributors_for(side).len();
            if agreeing >= 2 {
                parts.push(format!("{agreeing} indicators in confluence"));
            }
        }

        // Warning note: pick the most severe that applies.
        if scores.counterweight_injected {
            parts.push("one-sided OTC flow counterweighted".to_string());
        } else if volatility.level > 65.0 {
            parts.push("volatility suppressing confidence".to_string());
        } else if ctx.market_type == MarketType::Otc {
            parts.push("OTC reliability discount applied".to_string());
        }

        parts.join(" | ")
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::IndicatorHistoryStore;
    use crate::scoring::aggregator::WeightedAggregator;
    use crate::types::{IndicatorKind, IndicatorReading, Timeframe};
    use std::sync::Arc;

    fn ctx(market_type: MarketType, precision: PrecisionLevel) -> MarketContext {
        MarketContext {
            timeframe: Timeframe::M1,
            market_type,
            precision,
        }
    }

    fn vol(level: f64, kind: VolatilityKind) -> VolatilityProfile {
        VolatilityProfile { level, kind }
    }

    fn aggregate(
        readings: &[IndicatorReading],
        context: &MarketContext,
        volatility: &VolatilityProfile,
    ) -> AggregateScores {
        WeightedAggregator::new(Arc::new(IndicatorHistoryStore::new()))
            .aggregate(readings, context, volatility)
    }

    #[test]
    fn trendline_fibonacci_confluence_buys_above_55() {
        // Scenario: trendlines + fibonacci agree on buy, regular 1m market,
        // normal precision — expect BUY with confidence > 55.
        let readings = vec![
            IndicatorReading::new("trendlines", IndicatorKind::Trendline, Signal::Buy, 85.0),
            IndicatorReading::new("fibonacci", IndicatorKind::Fibonacci, Signal::Buy, 75.0),
        ];
        let context = ctx(MarketType::Regular, PrecisionLevel::Normal);
        let volatility = vol(20.0, VolatilityKind::Calm);
        let scores = aggregate(&readings, &context, &volatility);
        let noise = crate::market_quality::market_noise(&readings, context.market_type);

        let decision = EntryGate::decide(&scores, noise, &volatility, &context);
        assert_eq!(decision.entry_point, EntryPoint::Buy);
        assert!(
            decision.confidence > 55.0,
            "confidence was {}",
            decision.confidence
        );
    }

    #[test]
    fn tied_scores_wait() {
        // Identical weighted evidence on both sides can never clear the
        // differential test.
        let readings = vec![
            IndicatorReading::new("trend_up", IndicatorKind::Trendline, Signal::Buy, 80.0),
            IndicatorReading::new("trend_down", IndicatorKind::Trendline, Signal::Sell, 80.0),
        ];
        let context = ctx(MarketType::Regular, PrecisionLevel::Normal);
        let volatility = vol(20.0, VolatilityKind::Calm);
        let scores = aggregate(&readings, &context, &volatility);
        assert!((scores.normalized_buy - scores.normalized_sell).abs() < 1e-12);

        let decision = EntryGate::decide(&scores, 50.0, &volatility, &context);
        assert_eq!(decision.entry_point, EntryPoint::Wait);
    }

    #[test]
    fn extreme_volatility_forces_wait() {
        // Strong buy evidence must not escape the >80 override.
        let readings = vec![
            IndicatorReading::new("trendlines", IndicatorKind::Trendline, Signal::Buy, 100.0),
            IndicatorReading::new("fibonacci", IndicatorKind::Fibonacci, Signal::Buy, 100.0),
            IndicatorReading::new("sr", IndicatorKind::SupportResistance, Signal::Buy, 100.0),
        ];
        let context = ctx(MarketType::Regular, PrecisionLevel::Low);
        let volatility = vol(85.0, VolatilityKind::Whipsaw);
        let scores = aggregate(&readings, &context, &volatility);

        let decision = EntryGate::decide(&scores, 10.0, &volatility, &context);
        assert_eq!(decision.entry_point, EntryPoint::Wait);
        assert!(decision.confidence <= 75.0);
        // min(75, 40 + 85/2) = 75 exactly at level 85? 40+42.5=82.5 -> capped.
        assert!((decision.confidence - 75.0).abs() < 1e-9);
    }

    #[test]
    fn input_starvation_waits_with_zero_confidence() {
        let context = ctx(MarketType::Regular, PrecisionLevel::Normal);
        let volatility = vol(20.0, VolatilityKind::Calm);
        let scores = aggregate(&[], &context, &volatility);

        let decision = EntryGate::decide(&scores, 50.0, &volatility, &context);
        assert_eq!(decision.entry_point, EntryPoint::Wait);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.narrative, "no indicators found");
    }

    #[test]
    fn near_miss_wait_carries_bounded_confidence() {
        // Weak single indicator: below threshold, but the WAIT still reports
        // how close it came, inside [30, 60].
        let readings = vec![IndicatorReading::new(
            "volume",
            IndicatorKind::Volume,
            Signal::Buy,
            35.0,
        )];
        let context = ctx(MarketType::Regular, PrecisionLevel::High);
        let volatility = vol(30.0, VolatilityKind::Calm);
        let scores = aggregate(&readings, &context, &volatility);

        let decision = EntryGate::decide(&scores, 40.0, &volatility, &context);
        assert_eq!(decision.entry_point, EntryPoint::Wait);
        assert!(decision.confidence >= 30.0 && decision.confidence <= 60.0);
        assert!(decision.confidence > 0.0);
    }

    #[test]
    fn thresholds_rise_with_noise_volatility_and_otc() {
        let quiet = ctx(MarketType::Regular, PrecisionLevel::Normal);
        let base = EntryGate::confidence_threshold(0.0, 0.0, &quiet);
        assert!(EntryGate::confidence_threshold(80.0, 0.0, &quiet) > base);
        assert!(EntryGate::confidence_threshold(0.0, 80.0, &quiet) > base);
        let otc = ctx(MarketType::Otc, PrecisionLevel::Normal);
        assert!(EntryGate::confidence_threshold(0.0, 0.0, &otc) > base);

        let diff_base = EntryGate::differential_factor(0.0, &quiet);
        assert!(EntryGate::differential_factor(80.0, &quiet) > diff_base);
        assert!(EntryGate::differential_factor(0.0, &otc) > diff_base);
    }

    #[test]
    fn confidence_never_exceeds_cap() {
        // Stack every boost imaginable; confidence stays <= 98.
        let history = Arc::new(IndicatorHistoryStore::new());
        for _ in 0..50 {
            history.record_outcome("trendlines", true);
            history.record_outcome("sr", true);
        }
        let agg = WeightedAggregator::new(history);
        let readings = vec![
            IndicatorReading::new("trendlines", IndicatorKind::Trendline, Signal::Buy, 100.0),
            IndicatorReading::new("sr", IndicatorKind::SupportResistance, Signal::Buy, 100.0),
        ];
        let context = ctx(MarketType::Regular, PrecisionLevel::Low);
        let volatility = vol(0.0, VolatilityKind::Trend);
        let scores = agg.aggregate(&readings, &context, &volatility);

        let decision = EntryGate::decide(&scores, 0.0, &volatility, &context);
        assert_eq!(decision.entry_point, EntryPoint::Buy);
        assert!(decision.confidence <= 98.0);
    }

    #[test]
    fn narrative_orders_condition_leader_confluence_warning() {
        let readings = vec![
            IndicatorReading::new("trendlines", IndicatorKind::Trendline, Signal::Buy, 85.0),
            IndicatorReading::new("fibonacci", IndicatorKind::Fibonacci, Signal::Buy, 75.0),
        ];
        let context = ctx(MarketType::Otc, PrecisionLevel::Low);
        let volatility = vol(10.0, VolatilityKind::Calm);
        let scores = aggregate(&readings, &context, &volatility);
        let decision = EntryGate::decide(&scores, 20.0, &volatility, &context);

        let narrative = decision.narrative;
        let calm_pos = narrative.find("calm market").expect("condition note");
        let led_pos = narrative.find("led by").expect("leader note");
        assert!(calm_pos < led_pos, "condition must precede leader: {narrative}");
    }
}
