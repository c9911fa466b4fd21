// =============================================================================
// IndicatorSource — pluggable producer of indicator readings
// =============================================================================

use crate::types::{Candle, IndicatorReading};

/// A producer of indicator readings for one evaluation pass.
///
/// Implementations may be image-based detectors, exchange-computed studies, or
/// the built-in chart source; the core only requires that each pass yields a
/// batch of `IndicatorReading`s derived from the supplied candle window.
pub trait IndicatorSource: Send {
    /// Produce one batch of readings from the current candle window
    /// (oldest-first). An empty batch is valid and yields a WAIT decision.
    fn next_readings(&mut self, window: &[Candle]) -> Vec<IndicatorReading>;
}
