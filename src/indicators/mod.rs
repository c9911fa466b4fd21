// =============================================================================
// Indicators Module
// =============================================================================
//
// The pluggable boundary between the detectors that *produce* indicator
// readings and the core that consumes them. The aggregator never assumes
// which source a reading came from.

pub mod chart;
pub mod source;

pub use chart::ChartIndicatorSource;
pub use source::IndicatorSource;
