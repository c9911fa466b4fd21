// =============================================================================
// Market Data Module
// =============================================================================
//
// Candle ingest and storage:
// - Bounded candle log addressed by absolute index
// - Live kline-style WebSocket feed
// - Deterministic simulated candle source

pub mod candle_log;
pub mod feed;
pub mod simulated;

pub use candle_log::CandleLog;
pub use simulated::SimulatedCandleSource;
