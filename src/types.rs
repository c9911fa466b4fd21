// =============================================================================
// Shared types used across the Prism signal engine
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction reported by a single indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Final ternary decision produced by the entry gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPoint {
    Buy,
    Sell,
    Wait,
}

impl EntryPoint {
    /// The candle direction that would confirm this entry, if any.
    pub fn expected_direction(&self) -> Option<CandleDirection> {
        match self {
            Self::Buy => Some(CandleDirection::Up),
            Self::Sell => Some(CandleDirection::Down),
            Self::Wait => None,
        }
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Wait => write!(f, "WAIT"),
        }
    }
}

/// Whether the instrument trades on a regular feed or an OTC book.
///
/// OTC markets are treated as more manipulable: thresholds rise, trend
/// indicators are discounted and decision validity shrinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketType {
    Regular,
    Otc,
}

impl Default for MarketType {
    fn default() -> Self {
        Self::Regular
    }
}

impl std::fmt::Display for MarketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regular => write!(f, "Regular"),
            Self::Otc => write!(f, "OTC"),
        }
    }
}

/// User-selected strictness for the entry gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecisionLevel {
    Low,
    Normal,
    High,
}

impl Default for PrecisionLevel {
    fn default() -> Self {
        Self::Normal
    }
}

/// Candle timeframe driving the tick period, deadlines and expirations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    S30,
    M1,
    M2,
    M5,
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::M1
    }
}

impl Timeframe {
    pub fn secs(&self) -> u64 {
        match self {
            Self::S30 => 30,
            Self::M1 => 60,
            Self::M2 => 120,
            Self::M5 => 300,
        }
    }

    /// Fast timeframes need sequential validation regardless of confidence.
    pub fn is_fast(&self) -> bool {
        matches!(self, Self::S30)
    }

    /// Slow timeframes earn a shorter sequential run.
    pub fn is_slow(&self) -> bool {
        self.secs() >= 300
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S30 => write!(f, "30s"),
            Self::M1 => write!(f, "1m"),
            Self::M2 => write!(f, "2m"),
            Self::M5 => write!(f, "5m"),
        }
    }
}

/// The indicator families the aggregator knows how to weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    Trendline,
    Fibonacci,
    CandlePattern,
    ElliottWave,
    DowTheory,
    SupportResistance,
    Momentum,
    Volume,
    /// Internally injected readings (e.g. the OTC counterweight).
    Synthetic,
}

impl IndicatorKind {
    /// Static base weight before any contextual factor is applied.
    pub fn base_weight(&self) -> f64 {
        match self {
            Self::Trendline => 1.2,
            Self::Fibonacci => 0.9,
            Self::CandlePattern => 1.0,
            Self::ElliottWave => 0.8,
            Self::DowTheory => 0.85,
            Self::SupportResistance => 1.1,
            Self::Momentum => 0.7,
            Self::Volume => 0.6,
            Self::Synthetic => 0.8,
        }
    }

    /// Trend-following families are discounted on OTC books.
    pub fn is_trend_following(&self) -> bool {
        matches!(
            self,
            Self::Trendline | Self::ElliottWave | Self::DowTheory | Self::Momentum
        )
    }

    /// Pattern-shaped families degrade fastest under whipsaw volatility.
    pub fn is_pattern_based(&self) -> bool {
        matches!(self, Self::Momentum | Self::CandlePattern)
    }

    /// Level-based families degrade slowest under volatility.
    pub fn is_level_based(&self) -> bool {
        matches!(self, Self::Fibonacci | Self::SupportResistance)
    }
}

/// A single indicator result handed to the aggregator.
///
/// Produced per analysis pass by the detectors behind an `IndicatorSource`;
/// immutable once created and consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub name: String,
    pub kind: IndicatorKind,
    pub signal: Signal,
    /// Reported strength in `0..=100`.
    pub strength: f64,
    /// Whether the detector actually found its pattern on this pass.
    pub found: bool,
}

impl IndicatorReading {
    pub fn new(
        name: impl Into<String>,
        kind: IndicatorKind,
        signal: Signal,
        strength: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            signal,
            strength,
            found: true,
        }
    }

    /// A reading the detector ran but found nothing for.
    pub fn not_found(name: impl Into<String>, kind: IndicatorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            signal: Signal::Neutral,
            strength: 0.0,
            found: false,
        }
    }
}

/// Per-evaluation market context. Read-only; never persisted by the core.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MarketContext {
    pub timeframe: Timeframe,
    pub market_type: MarketType,
    pub precision: PrecisionLevel,
}

/// One closed OHLC candle. Append-only with a monotonically increasing
/// absolute `index`; consumers hold indices, never references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub timestamp: DateTime<Utc>,
    pub index: u64,
}

/// Coarse close-vs-open classification of a candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleDirection {
    Up,
    Down,
    Neutral,
}

/// Body size below this fraction of the open counts as a neutral candle.
pub const NEUTRAL_BODY_RATIO: f64 = 0.0001;

impl Candle {
    /// Absolute body size relative to the open price.
    pub fn body_ratio(&self) -> f64 {
        if self.open.abs() < f64::EPSILON {
            return 0.0;
        }
        (self.close - self.open).abs() / self.open
    }

    /// Classify the candle as up, down, or neutral (negligible body).
    pub fn direction(&self) -> CandleDirection {
        if self.body_ratio() < NEUTRAL_BODY_RATIO {
            CandleDirection::Neutral
        } else if self.close > self.open {
            CandleDirection::Up
        } else {
            CandleDirection::Down
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, close: f64) -> Candle {
        Candle {
            open,
            high: open.max(close) + 0.1,
            low: open.min(close) - 0.1,
            close,
            timestamp: Utc::now(),
            index: 0,
        }
    }

    #[test]
    fn candle_direction_classification() {
        assert_eq!(candle(100.0, 101.0).direction(), CandleDirection::Up);
        assert_eq!(candle(100.0, 99.0).direction(), CandleDirection::Down);
        // Body below the neutral threshold.
        assert_eq!(candle(100.0, 100.001).direction(), CandleDirection::Neutral);
    }

    #[test]
    fn body_ratio_guards_zero_open() {
        let c = candle(0.0, 1.0);
        assert_eq!(c.body_ratio(), 0.0);
    }

    #[test]
    fn expected_direction_per_entry_point() {
        assert_eq!(
            EntryPoint::Buy.expected_direction(),
            Some(CandleDirection::Up)
        );
        assert_eq!(
            EntryPoint::Sell.expected_direction(),
            Some(CandleDirection::Down)
        );
        assert_eq!(EntryPoint::Wait.expected_direction(), None);
    }

    #[test]
    fn base_weights_match_scenario_expectations() {
        assert!((IndicatorKind::Trendline.base_weight() - 1.2).abs() < f64::EPSILON);
        assert!((IndicatorKind::Fibonacci.base_weight() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn timeframe_seconds() {
        assert_eq!(Timeframe::S30.secs(), 30);
        assert_eq!(Timeframe::M1.secs(), 60);
        assert!(Timeframe::S30.is_fast());
        assert!(Timeframe::M5.is_slow());
        assert!(!Timeframe::M1.is_slow());
    }
}
