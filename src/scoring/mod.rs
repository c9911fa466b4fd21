// =============================================================================
// Scoring Module
// =============================================================================
//
// The decision pipeline for one evaluation pass:
// - Weighted aggregation of indicator readings into normalized buy/sell scores
// - Adaptive entry gate (threshold + differential dominance test)
// - Expiration calculator for the resulting decision window

pub mod aggregator;
pub mod entry_gate;
pub mod expiration;

pub use aggregator::{AggregateScores, IndicatorContribution, WeightedAggregator};
pub use entry_gate::{EntryGate, GateDecision};
pub use expiration::{expiration_secs, ExpirationInputs};
