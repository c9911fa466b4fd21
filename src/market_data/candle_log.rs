// =============================================================================
// CandleLog -- bounded candle window addressed by absolute index
// =============================================================================
//
// Append-only log of closed candles, trimmed to a fixed window. Consumers
// (the confirmation subsystems) hold *absolute* candle indices, never
// references, so pruning old candles can remap storage freely without leaving
// anything dangling: lookups below the retained window simply return `None`,
// and pruning never changes the result of a lookup that is still in range.
// =============================================================================

use std::collections::VecDeque;

use crate::types::Candle;

pub struct CandleLog {
    candles: VecDeque<Candle>,
    /// Absolute index of the front of `candles`.
    first_index: u64,
    /// Absolute index the next appended candle will receive.
    next_index: u64,
    max_candles: usize,
}

impl CandleLog {
    /// Create an empty log retaining at most `max_candles` entries.
    pub fn new(max_candles: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(max_candles + 1),
            first_index: 0,
            next_index: 0,
            max_candles: max_candles.max(1),
        }
    }

    /// Append a closed candle, assigning it the next absolute index, and
    /// prune the window in the same operation so readers never observe an
    /// over-long log.
    ///
    /// Returns the index the candle was stored under.
    pub fn append(&mut self, mut candle: Candle) -> u64 {
        let index = self.next_index;
        candle.index = index;
        self.candles.push_back(candle);
        self.next_index += 1;

        while self.candles.len() > self.max_candles {
            self.candles.pop_front();
            self.first_index += 1;
        }

        index
    }

    /// Look up a candle by absolute index. Pruned or future indices yield
    /// `None`.
    pub fn get(&self, index: u64) -> Option<&Candle> {
        if index < self.first_index {
            return None;
        }
        let offset = (index - self.first_index) as usize;
        self.candles.get(offset)
    }

    /// Absolute index of the most recent candle, if any.
    pub fn latest_index(&self) -> Option<u64> {
        self.next_index.checked_sub(1).filter(|_| !self.candles.is_empty())
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// The retained window oldest-first, for the estimators.
    pub fn window(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }

    /// The most recent `count` candles oldest-first.
    pub fn recent(&self, count: usize) -> Vec<Candle> {
        let start = self.candles.len().saturating_sub(count);
        self.candles.iter().skip(start).cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(close: f64) -> Candle {
        Candle {
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            timestamp: Utc::now(),
            index: 0, // assigned by the log
        }
    }

    #[test]
    fn append_assigns_monotonic_indices() {
        let mut log = CandleLog::new(10);
        assert_eq!(log.append(candle(100.0)), 0);
        assert_eq!(log.append(candle(101.0)), 1);
        assert_eq!(log.append(candle(102.0)), 2);
        assert_eq!(log.latest_index(), Some(2));
        assert_eq!(log.get(1).unwrap().close, 101.0);
    }

    #[test]
    fn window_trims_oldest() {
        let mut log = CandleLog::new(3);
        for i in 0..5 {
            log.append(candle(100.0 + i as f64));
        }
        assert_eq!(log.len(), 3);
        // Indices 0 and 1 were pruned.
        assert!(log.get(0).is_none());
        assert!(log.get(1).is_none());
        assert_eq!(log.get(2).unwrap().close, 102.0);
        assert_eq!(log.get(4).unwrap().close, 104.0);
    }

    #[test]
    fn pruning_preserves_absolute_lookup() {
        // The same absolute index resolves to the same candle before and
        // after pruning, as long as it stays inside the window.
        let mut big = CandleLog::new(100);
        let mut small = CandleLog::new(5);
        for i in 0..20 {
            big.append(candle(100.0 + i as f64));
            small.append(candle(100.0 + i as f64));
        }
        for index in 15..20u64 {
            let a = big.get(index).unwrap();
            let b = small.get(index).unwrap();
            assert_eq!(a.close, b.close, "index {index} diverged after pruning");
            assert_eq!(a.index, b.index);
        }
    }

    #[test]
    fn future_indices_are_none() {
        let mut log = CandleLog::new(10);
        log.append(candle(100.0));
        assert!(log.get(5).is_none());
    }

    #[test]
    fn empty_log_has_no_latest() {
        let log = CandleLog::new(10);
        assert_eq!(log.latest_index(), None);
        assert!(log.latest().is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn recent_returns_oldest_first_tail() {
        let mut log = CandleLog::new(10);
        for i in 0..6 {
            log.append(candle(100.0 + i as f64));
        }
        let tail = log.recent(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].close, 103.0);
        assert_eq!(tail[2].close, 105.0);
        // Asking for more than exists returns the full window.
        assert_eq!(log.recent(100).len(), 6);
    }
}
