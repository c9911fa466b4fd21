// =============================================================================
// Weighted Decision Aggregator — Context-sensitive indicator ensemble
// =============================================================================
//
// Combines one batch of indicator readings into normalized buy/sell scores.
// Each found indicator carries a weight built from four factors:
//
//   weight = base_weight(kind) × market_type_factor × volatility_factor
//            × history_trust_factor(name)
//
// A fifth factor — the high-strength confidence boost — multiplies the score
// contribution only, not the accumulated weight, which is how a one-sided,
// high-strength batch can normalize slightly above 1.0 (bounded ≈1.3).
//
// Neutral indicators contribute weight without score, diluting confidence.
// Malformed readings are skipped with a data-quality warning; a batch is never
// aborted part-way.
// =============================================================================

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::history::IndicatorHistoryStore;
use crate::market_quality::VolatilityProfile;
use crate::types::{IndicatorKind, IndicatorReading, MarketContext, MarketType, Signal};

/// Strength above which the confidence boost kicks in.
const CONFIDENCE_BOOST_STRENGTH: f64 = 80.0;
/// Score multiplier for high-strength readings.
const CONFIDENCE_BOOST: f64 = 1.15;

/// OTC discount on trend-following families.
const OTC_TREND_DISCOUNT: f64 = 0.85;
/// OTC boost on support/resistance.
const OTC_LEVEL_BOOST: f64 = 1.15;

/// Volatility level above which per-kind attenuation begins.
const VOLATILITY_ATTENUATION_START: f64 = 50.0;
/// Hard floor on the volatility factor.
const VOLATILITY_FACTOR_FLOOR: f64 = 0.4;

/// Volatility level above which both raw scores are scaled down.
const SOFT_SUPPRESSION_START: f64 = 65.0;

/// One side must exceed the other by this ratio before the OTC counterweight
/// is injected.
const OTC_DOMINANCE_RATIO: f64 = 2.5;
/// Name of the injected counterweight, tracked in the history store like any
/// real indicator so its influence can be tuned over time.
pub const OTC_COUNTERWEIGHT_NAME: &str = "otc_counterbalance";

/// The contribution of a single reading to the final scores.
#[derive(Debug, Clone, Serialize)]
pub struct IndicatorContribution {
    pub name: String,
    pub kind: IndicatorKind,
    pub signal: Signal,
    pub strength: f64,
    pub weight: f64,
    /// Signed score added: positive toward buy, negative toward sell.
    pub contribution: f64,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateScores {
    pub normalized_buy: f64,
    pub normalized_sell: f64,
    pub total_weight: f64,
    pub contributions: Vec<IndicatorContribution>,
    /// Whether the OTC manipulation counterweight fired on this pass.
    pub counterweight_injected: bool,
    /// Readings dropped for failing validation.
    pub skipped: usize,
}

impl AggregateScores {
    /// Names of the found indicators that agreed with the given side.
    pub fn contributors_for(&self, signal: Signal) -> Vec<String> {
        self.contributions
            .iter()
            .filter(|c| c.signal == signal && c.kind != IndicatorKind::Synthetic)
            .map(|c| c.name.clone())
            .collect()
    }

    /// The non-synthetic contributor with the largest absolute contribution.
    pub fn strongest_contributor(&self) -> Option<&IndicatorContribution> {
        self.contributions
            .iter()
            .filter(|c| c.kind != IndicatorKind::Synthetic)
            .max_by(|a, b| {
                a.contribution
                    .abs()
                    .total_cmp(&b.contribution.abs())
            })
    }
}

/// The aggregation engine. Cheap to construct; holds only the shared history
/// store it reads trust factors from.
pub struct WeightedAggregator {
    history: Arc<IndicatorHistoryStore>,
}

impl WeightedAggregator {
    pub fn new(history: Arc<IndicatorHistoryStore>) -> Self {
        Self { history }
    }

    /// Aggregate one batch of readings under the given context and volatility.
    pub fn aggregate(
        &self,
        readings: &[IndicatorReading],
        ctx: &MarketContext,
        volatility: &VolatilityProfile,
    ) -> AggregateScores {
        let mut buy_score = 0.0_f64;
        let mut sell_score = 0.0_f64;
        let mut total_weight = 0.0_f64;
        let mut contributions = Vec::with_capacity(readings.len());
        let mut skipped = 0usize;

        for reading in readings {
            if !reading.found {
                continue;
            }
            if !Self::is_well_formed(reading) {
                warn!(
                    name = %reading.name,
                    strength = reading.strength,
                    "malformed indicator reading skipped"
                );
                skipped += 1;
                continue;
            }

            let weight = self.weight_for(reading, ctx, volatility);
            let boost = if reading.strength > CONFIDENCE_BOOST_STRENGTH {
                CONFIDENCE_BOOST
            } else {
                1.0
            };
            let magnitude = (reading.strength / 100.0) * weight * boost;

            let signed = match reading.signal {
                Signal::Buy => {
                    buy_score += magnitude;
                    magnitude
                }
                Signal::Sell => {
                    sell_score += magnitude;
                    -magnitude
                }
                Signal::Neutral => 0.0,
            };
            // Every found indicator dilutes confidence, neutral ones included.
            total_weight += weight;

            contributions.push(IndicatorContribution {
                name: reading.name.clone(),
                kind: reading.kind,
                signal: reading.signal,
                strength: reading.strength,
                weight,
                contribution: signed,
            });
        }

        // ── OTC manipulation heuristic ──────────────────────────────────
        // Extreme one-sided OTC batches are frequently manipulated; inject a
        // counterweight on the weaker side instead of trusting the sweep.
        let mut counterweight_injected = false;
        if ctx.market_type == MarketType::Otc {
            let (dominant, weaker) = if buy_score >= sell_score {
                (buy_score, sell_score)
            } else {
                (sell_score, buy_score)
            };
            if dominant > 0.0 && dominant > weaker * OTC_DOMINANCE_RATIO {
                let trust = self.history.trust_factor(OTC_COUNTERWEIGHT_NAME);
                let weight = IndicatorKind::Synthetic.base_weight() * trust;
                let strength =
                    (dominant / total_weight.max(f64::EPSILON) * 100.0 * 0.5).clamp(20.0, 60.0);
                let magnitude = (strength / 100.0) * weight;

                let against_buy = buy_score >= sell_score;
                if against_buy {
                    sell_score += magnitude;
                } else {
                    buy_score += magnitude;
                }
                total_weight += weight;
                counterweight_injected = true;

                contributions.push(IndicatorContribution {
                    name: OTC_COUNTERWEIGHT_NAME.to_string(),
                    kind: IndicatorKind::Synthetic,
                    signal: if against_buy { Signal::Sell } else { Signal::Buy },
                    strength,
                    weight,
                    contribution: if against_buy { -magnitude } else { magnitude },
                });

                debug!(
                    strength = format!("{strength:.1}"),
                    trust = format!("{trust:.2}"),
                    "OTC counterweight injected against one-sided batch"
                );
            }
        }

        // ── Soft volatility suppression ─────────────────────────────────
        // High volatility invalidates the directional read itself, so both
        // sides shrink rather than one side winning by default.
        if volatility.level > SOFT_SUPPRESSION_START {
            let factor = 1.0 - (volatility.level - SOFT_SUPPRESSION_START) / 100.0;
            buy_score *= factor;
            sell_score *= factor;
        }

        let (normalized_buy, normalized_sell) = if total_weight > 0.0 {
            (buy_score / total_weight, sell_score / total_weight)
        } else {
            (0.0, 0.0)
        };

        AggregateScores {
            normalized_buy,
            normalized_sell,
            total_weight,
            contributions,
            counterweight_injected,
            skipped,
        }
    }

    fn is_well_formed(reading: &IndicatorReading) -> bool {
        !reading.name.is_empty()
            && reading.strength.is_finite()
            && (0.0..=100.0).contains(&reading.strength)
    }

    fn weight_for(
        &self,
        reading: &IndicatorReading,
        ctx: &MarketContext,
        volatility: &VolatilityProfile,
    ) -> f64 {
        let base = reading.kind.base_weight();

        let market_factor = match ctx.market_type {
            MarketType::Regular => 1.0,
            MarketType::Otc => {
                if reading.kind.is_trend_following() {
                    OTC_TREND_DISCOUNT
                } else if reading.kind == IndicatorKind::SupportResistance {
                    OTC_LEVEL_BOOST
                } else {
                    1.0
                }
            }
        };

        let volatility_factor = if volatility.level > VOLATILITY_ATTENUATION_START {
            let excess = volatility.level - VOLATILITY_ATTENUATION_START;
            let slope = if reading.kind.is_pattern_based() {
                // Pattern signals degrade fastest under whipsaw.
                0.010
            } else if reading.kind.is_level_based() {
                // Fibonacci / support-resistance degrade at half the rate.
                0.005
            } else {
                0.0067
            };
            (1.0 - excess * slope).max(VOLATILITY_FACTOR_FLOOR)
        } else {
            1.0
        };

        let trust = self.history.trust_factor(&reading.name);

        base * market_factor * volatility_factor * trust
    }
}

// =============================================================================
// Tests
// =============================================================================
