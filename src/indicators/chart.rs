// =============================================================================
// ChartIndicatorSource — indicator families derived from the candle window
// =============================================================================
//
// Derives all eight indicator families directly from the candle log, so a
// running engine produces real, reproducible signals without any external
// detector attached. Each detector is a pure function of the window; a family
// that finds nothing reports `found = false` and drops out of the weighting.
//
// Strengths are heuristic but deterministic; the aggregator treats these
// readings exactly like ones from an image-based detector.
// =============================================================================

use crate::types::{Candle, CandleDirection, IndicatorKind, IndicatorReading, Signal};

use super::source::IndicatorSource;

/// Minimum candles before any family reports.
const MIN_WINDOW: usize = 6;

/// Fraction of the window range counting as "near" a level.
const LEVEL_PROXIMITY: f64 = 0.12;

#[derive(Debug, Default)]
pub struct ChartIndicatorSource;

impl ChartIndicatorSource {
    pub fn new() -> Self {
        Self
    }
}

impl IndicatorSource for ChartIndicatorSource {
    fn next_readings(&mut self, window: &[Candle]) -> Vec<IndicatorReading> {
        if window.len() < MIN_WINDOW {
            return Vec::new();
        }
        vec![
            trendline(window),
            fibonacci(window),
            candle_pattern(window),
            elliott_wave(window),
            dow_theory(window),
            support_resistance(window),
            momentum(window),
            volume_proxy(window),
        ]
    }
}

fn closes(window: &[Candle]) -> Vec<f64> {
    window.iter().map(|c| c.close).collect()
}

fn window_range(window: &[Candle]) -> (f64, f64) {
    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;
    for c in window {
        low = low.min(c.low);
        high = high.max(c.high);
    }
    (low, high)
}

/// Least-squares slope of the close series, normalized by price.
fn trendline(window: &[Candle]) -> IndicatorReading {
    let closes = closes(window);
    let n = closes.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = closes.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in closes.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den < f64::EPSILON || mean_y.abs() < f64::EPSILON {
        return IndicatorReading::not_found("trendlines", IndicatorKind::Trendline);
    }
    let slope = num / den / mean_y; // relative slope per candle

    let strength = (slope.abs() * 60_000.0).min(95.0);
    if strength < 15.0 {
        return IndicatorReading::not_found("trendlines", IndicatorKind::Trendline);
    }
    let signal = if slope > 0.0 { Signal::Buy } else { Signal::Sell };
    IndicatorReading::new("trendlines", IndicatorKind::Trendline, signal, strength)
}

/// Proximity of the last close to a 38.2% / 61.8% retracement of the window.
fn fibonacci(window: &[Candle]) -> IndicatorReading {
    let (low, high) = window_range(window);
    let range = high - low;
    if range < f64::EPSILON {
        return IndicatorReading::not_found("fibonacci", IndicatorKind::Fibonacci);
    }
    let last = window.last().map(|c| c.close).unwrap_or(low);
    let uptrend = window.first().map(|c| c.close < last).unwrap_or(false);

    for ratio in [0.382, 0.5, 0.618] {
        // Retracement levels measured from the trend's leading edge.
        let level = if uptrend { high - range * ratio } else { low + range * ratio };
        let distance = (last - level).abs() / range;
        if distance < LEVEL_PROXIMITY {
            let strength = 50.0 + (1.0 - distance / LEVEL_PROXIMITY) * 35.0;
            let signal = if uptrend { Signal::Buy } else { Signal::Sell };
            return IndicatorReading::new("fibonacci", IndicatorKind::Fibonacci, signal, strength);
        }
    }
    IndicatorReading::not_found("fibonacci", IndicatorKind::Fibonacci)
}

/// Simple last-two-candle shape read: engulfing bodies and long-wick
/// rejections.
fn candle_pattern(window: &[Candle]) -> IndicatorReading {
    let n = window.len();
    let prev = &window[n - 2];
    let last = &window[n - 1];

    let prev_body = (prev.close - prev.open).abs();
    let last_body = (last.close - last.open).abs();

    // Engulfing: the last body swallows the previous, in the opposite color.
    if last_body > prev_body * 1.5
        && last.direction() != prev.direction()
        && last.direction() != CandleDirection::Neutral
    {
        let signal = match last.direction() {
            CandleDirection::Up => Signal::Buy,
            CandleDirection::Down => Signal::Sell,
            CandleDirection::Neutral => Signal::Neutral,
        };
        let strength = (55.0 + (last_body / prev_body.max(f64::EPSILON)) * 8.0).min(90.0);
        return IndicatorReading::new("candle_patterns", IndicatorKind::CandlePattern, signal, strength);
    }

    // Long-wick rejection: lower shadow dominating the candle => buy bounce.
    let range = (last.high - last.low).max(f64::EPSILON);
    let lower_shadow = last.open.min(last.close) - last.low;
    let upper_shadow = last.high - last.open.max(last.close);
    if lower_shadow > range * 0.6 {
        return IndicatorReading::new(
            "candle_patterns",
            IndicatorKind::CandlePattern,
            Signal::Buy,
            60.0 + (lower_shadow / range - 0.6) * 50.0,
        );
    }
    if upper_shadow > range * 0.6 {
        return IndicatorReading::new(
            "candle_patterns",
            IndicatorKind::CandlePattern,
            Signal::Sell,
            60.0 + (upper_shadow / range - 0.6) * 50.0,
        );
    }

    IndicatorReading::not_found("candle_patterns", IndicatorKind::CandlePattern)
}

/// Rough wave count: many consecutive same-direction candles read as a late
/// impulse — a weak reversal call.
fn elliott_wave(window: &[Candle]) -> IndicatorReading {
    let mut run = 0usize;
    let mut run_dir = CandleDirection::Neutral;
    for c in window.iter().rev() {
        let d = c.direction();
        if d == CandleDirection::Neutral {
            continue;
        }
        if run == 0 {
            run_dir = d;
            run = 1;
        } else if d == run_dir {
            run += 1;
        } else {
            break;
        }
    }

    if run >= 5 {
        // Extended run: fade it.
        let signal = match run_dir {
            CandleDirection::Up => Signal::Sell,
            CandleDirection::Down => Signal::Buy,
            CandleDirection::Neutral => Signal::Neutral,
        };
        let strength = (40.0 + run as f64 * 5.0).min(75.0);
        return IndicatorReading::new("elliott_waves", IndicatorKind::ElliottWave, signal, strength);
    }
    IndicatorReading::not_found("elliott_waves", IndicatorKind::ElliottWave)
}

/// Higher-highs/higher-lows across the two window halves.
fn dow_theory(window: &[Candle]) -> IndicatorReading {
    let mid = window.len() / 2;
    let (first, second) = window.split_at(mid);
    let (first_low, first_high) = window_range(first);
    let (second_low, second_high) = window_range(second);

    if second_high > first_high && second_low > first_low {
        let lift = ((second_low - first_low) / first_low.max(f64::EPSILON)) * 40_000.0;
        return IndicatorReading::new(
            "dow_theory",
            IndicatorKind::DowTheory,
            Signal::Buy,
            (50.0 + lift).min(85.0),
        );
    }
    if second_high < first_high && second_low < first_low {
        let drop = ((first_high - second_high) / first_high.max(f64::EPSILON)) * 40_000.0;
        return IndicatorReading::new(
            "dow_theory",
            IndicatorKind::DowTheory,
            Signal::Sell,
            (50.0 + drop).min(85.0),
        );
    }
    IndicatorReading::not_found("dow_theory", IndicatorKind::DowTheory)
}

/// Position of the last close inside the window range: bounces off the floor
/// buy, rejections at the ceiling sell.
fn support_resistance(window: &[Candle]) -> IndicatorReading {
    let (low, high) = window_range(window);
    let range = high - low;
    if range < f64::EPSILON {
        return IndicatorReading::not_found("support_resistance", IndicatorKind::SupportResistance);
    }
    let last = window.last().map(|c| c.close).unwrap_or(low);
    let position = (last - low) / range;

    if position < LEVEL_PROXIMITY {
        let strength = 55.0 + (1.0 - position / LEVEL_PROXIMITY) * 30.0;
        return IndicatorReading::new(
            "support_resistance",
            IndicatorKind::SupportResistance,
            Signal::Buy,
            strength,
        );
    }
    if position > 1.0 - LEVEL_PROXIMITY {
        let strength = 55.0 + ((position - (1.0 - LEVEL_PROXIMITY)) / LEVEL_PROXIMITY) * 30.0;
        return IndicatorReading::new(
            "support_resistance",
            IndicatorKind::SupportResistance,
            Signal::Sell,
            strength,
        );
    }
    IndicatorReading::not_found("support_resistance", IndicatorKind::SupportResistance)
}

/// Rate of change over the last third of the window.
fn momentum(window: &[Candle]) -> IndicatorReading {
    let lookback = (window.len() / 3).max(2);
    let n = window.len();
    let then = window[n - lookback].close;
    let now = window[n - 1].close;
    if then.abs() < f64::EPSILON {
        return IndicatorReading::not_found("momentum", IndicatorKind::Momentum);
    }
    let roc = (now - then) / then;
    let strength = (roc.abs() * 30_000.0).min(90.0);
    if strength < 20.0 {
        return IndicatorReading::not_found("momentum", IndicatorKind::Momentum);
    }
    let signal = if roc > 0.0 { Signal::Buy } else { Signal::Sell };
    IndicatorReading::new("momentum", IndicatorKind::Momentum, signal, strength)
}

/// Activity proxy from candle ranges (OHLC feeds carry no volume): expanding
/// ranges confirm the current direction, contracting ranges stay neutral.
fn volume_proxy(window: &[Candle]) -> IndicatorReading {
    let mid = window.len() / 2;
    let avg_range = |candles: &[Candle]| {
        candles.iter().map(|c| (c.high - c.low).abs()).sum::<f64>() / candles.len().max(1) as f64
    };
    let early = avg_range(&window[..mid]);
    let late = avg_range(&window[mid..]);
    if early < f64::EPSILON {
        return IndicatorReading::not_found("volume", IndicatorKind::Volume);
    }
    let expansion = late / early;
    if expansion > 1.3 {
        let last_dir = window.last().map(|c| c.direction());
        let signal = match last_dir {
            Some(CandleDirection::Up) => Signal::Buy,
            Some(CandleDirection::Down) => Signal::Sell,
            _ => Signal::Neutral,
        };
        let strength = (40.0 + (expansion - 1.3) * 60.0).min(80.0);
        return IndicatorReading::new("volume", IndicatorKind::Volume, signal, strength);
    }
    IndicatorReading::not_found("volume", IndicatorKind::Volume)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(open: f64, close: f64) -> Candle {
        Candle {
            open,
            high: open.max(close) + 0.0002,
            low: open.min(close) - 0.0002,
            close,
            timestamp: Utc::now(),
            index: 0,
        }
    }

    fn rising_window(len: usize) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                let base = 1.0 + i as f64 * 0.001;
                candle(base, base + 0.001)
            })
            .collect()
    }

    fn falling_window(len: usize) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                let base = 1.1 - i as f64 * 0.001;
                candle(base, base - 0.001)
            })
            .collect()
    }

    #[test]
    fn short_window_yields_no_readings() {
        let mut source = ChartIndicatorSource::new();
        assert!(source.next_readings(&rising_window(3)).is_empty());
    }

    #[test]
    fn full_window_yields_all_families() {
        let mut source = ChartIndicatorSource::new();
        let readings = source.next_readings(&rising_window(20));
        assert_eq!(readings.len(), 8);
        let kinds: Vec<IndicatorKind> = readings.iter().map(|r| r.kind).collect();
        assert!(kinds.contains(&IndicatorKind::Trendline));
        assert!(kinds.contains(&IndicatorKind::Volume));
    }

    #[test]
    fn rising_window_trends_buy() {
        let r = trendline(&rising_window(20));
        assert!(r.found);
        assert_eq!(r.signal, Signal::Buy);
        assert!(r.strength > 15.0);
    }

    #[test]
    fn falling_window_trends_sell() {
        let r = trendline(&falling_window(20));
        assert!(r.found);
        assert_eq!(r.signal, Signal::Sell);
    }

    #[test]
    fn dow_theory_reads_higher_highs() {
        let r = dow_theory(&rising_window(20));
        assert!(r.found);
        assert_eq!(r.signal, Signal::Buy);
    }

    #[test]
    fn support_bounce_reads_buy() {
        // Drift down to the floor of the range, then let the close sit there.
        let mut window = falling_window(15);
        let last = window.last().unwrap().close;
        window.push(candle(last, last - 0.0001));
        let r = support_resistance(&window);
        assert!(r.found);
        assert_eq!(r.signal, Signal::Buy);
    }

    #[test]
    fn extended_run_fades_via_elliott() {
        let r = elliott_wave(&rising_window(20));
        assert!(r.found);
        assert_eq!(r.signal, Signal::Sell);
        assert!(r.strength <= 75.0);
    }

    #[test]
    fn readings_are_deterministic() {
        let mut a = ChartIndicatorSource::new();
        let mut b = ChartIndicatorSource::new();
        let window = rising_window(20);
        let ra = a.next_readings(&window);
        let rb = b.next_readings(&window);
        for (x, y) in ra.iter().zip(rb.iter()) {
            assert_eq!(x.name, y.name);
            assert_eq!(x.signal, y.signal);
            assert_eq!(x.strength, y.strength);
            assert_eq!(x.found, y.found);
        }
    }

    #[test]
    fn all_strengths_within_range() {
        let mut source = ChartIndicatorSource::new();
        for window in [rising_window(20), falling_window(20)] {
            for r in source.next_readings(&window) {
                assert!((0.0..=100.0).contains(&r.strength), "{}: {}", r.name, r.strength);
            }
        }
    }
}
