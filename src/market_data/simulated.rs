// =============================================================================
// Simulated Candle Source -- deterministic synthetic walk for demo sessions
// =============================================================================
//
// Produces one closed candle per call from a seeded xorshift generator, so a
// given seed replays an identical session: identical candles, identical
// decisions, identical confirmations. The walk alternates between drifting
// and mean-reverting stretches to exercise both the trend and whipsaw paths
// of the volatility estimator.
// =============================================================================

use chrono::Utc;

use crate::types::Candle;

pub struct SimulatedCandleSource {
    state: u64,
    price: f64,
    /// Slowly rotating drift; resampled every `DRIFT_PERIOD` candles.
    drift: f64,
    produced: u64,
}

/// Candles between drift resamples.
const DRIFT_PERIOD: u64 = 12;

/// Per-candle move scale relative to price.
const MOVE_SCALE: f64 = 0.0012;

impl SimulatedCandleSource {
    pub fn new(seed: u64, start_price: f64) -> Self {
        Self {
            // xorshift must not start at zero.
            state: if seed == 0 { 1 } else { seed },
            price: start_price,
            drift: 0.0,
            produced: 0,
        }
    }

    /// Next value in [0, 1).
    fn next_unit(&mut self) -> f64 {
        // xorshift64
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate the next closed candle.
    pub fn next_candle(&mut self) -> Candle {
        if self.produced % DRIFT_PERIOD == 0 {
            // Resample drift in [-1, 1], biased slightly toward reversal.
            self.drift = (self.next_unit() * 2.0 - 1.0) - self.drift * 0.3;
        }
        self.produced += 1;

        let open = self.price;
        let shock = (self.next_unit() * 2.0 - 1.0) * MOVE_SCALE;
        let body = (self.drift * 0.5 * MOVE_SCALE + shock) * open;
        let close = open + body;

        let wick_up = self.next_unit() * MOVE_SCALE * 0.5 * open;
        let wick_down = self.next_unit() * MOVE_SCALE * 0.5 * open;
        let high = open.max(close) + wick_up;
        let low = open.min(close) - wick_down;

        self.price = close;

        Candle {
            open,
            high,
            low,
            close,
            timestamp: Utc::now(),
            // The candle log assigns the authoritative index on append.
            index: 0,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_seed_replays_identical_prices() {
        let mut a = SimulatedCandleSource::new(42, 1.0850);
        let mut b = SimulatedCandleSource::new(42, 1.0850);
        for _ in 0..50 {
            let ca = a.next_candle();
            let cb = b.next_candle();
            assert_eq!(ca.open, cb.open);
            assert_eq!(ca.close, cb.close);
            assert_eq!(ca.high, cb.high);
            assert_eq!(ca.low, cb.low);
        }
    }

    #[test]
    fn different_seed_diverges() {
        let mut a = SimulatedCandleSource::new(42, 1.0850);
        let mut b = SimulatedCandleSource::new(43, 1.0850);
        let diverged = (0..20).any(|_| a.next_candle().close != b.next_candle().close);
        assert!(diverged);
    }

    #[test]
    fn adjacent_seeds_are_distinct_generators() {
        // Pairs differing only in the low bit must not share a session.
        for seed in [2u64, 100, 4096] {
            let mut even = SimulatedCandleSource::new(seed, 1.0850);
            let mut odd = SimulatedCandleSource::new(seed + 1, 1.0850);
            let diverged = (0..20).any(|_| even.next_candle().close != odd.next_candle().close);
            assert!(diverged, "seeds {seed} and {} replayed identically", seed + 1);
        }
    }

    #[test]
    fn zero_seed_is_usable() {
        let mut source = SimulatedCandleSource::new(0, 1.0);
        let first = source.next_candle();
        let second = source.next_candle();
        // The generator must actually move off its start state.
        assert!(first.close != second.close || first.high != second.high);
    }

    #[test]
    fn candles_are_well_formed() {
        let mut source = SimulatedCandleSource::new(7, 1.0);
        for _ in 0..200 {
            let c = source.next_candle();
            assert!(c.high >= c.open.max(c.close));
            assert!(c.low <= c.open.min(c.close));
            assert!(c.open > 0.0 && c.close > 0.0);
        }
    }

    #[test]
    fn candles_chain_open_to_close() {
        let mut source = SimulatedCandleSource::new(9, 1.0);
        let first = source.next_candle();
        let second = source.next_candle();
        assert_eq!(second.open, first.close);
    }
}
