// =============================================================================
// Runtime Configuration — Hot-reloadable engine settings with atomic save
// =============================================================================
//
// Every tunable parameter of the Prism engine lives here so that a session can
// be reconfigured without a rebuild. Persistence uses an atomic tmp + rename
// pattern to prevent corruption on crash. All fields carry `#[serde(default)]`
// so that adding new fields never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{MarketContext, MarketType, PrecisionLevel, Timeframe};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbol() -> String {
    "EURUSD".to_string()
}

fn default_candle_window() -> usize {
    25
}

fn default_max_pending_signals() -> usize {
    32
}

fn default_sim_seed() -> u64 {
    0x9e37_79b9
}

fn default_sim_start_price() -> f64 {
    1.0850
}

// =============================================================================
// CandleFeedKind
// =============================================================================

/// Which candle source drives the engine's candle tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleFeedKind {
    /// Deterministic synthetic candles (demo / test runs).
    Simulated,
    /// Live kline-style WebSocket feed at `feed_url`.
    Live,
}

impl Default for CandleFeedKind {
    fn default() -> Self {
        Self::Simulated
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Top-level runtime configuration for the Prism engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // --- Instrument & evaluation context ------------------------------------
    /// Instrument label used in logs and the API snapshot.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Candle timeframe — also the candle tick period.
    #[serde(default)]
    pub timeframe: Timeframe,

    /// Regular or OTC book.
    #[serde(default)]
    pub market_type: MarketType,

    /// Entry gate strictness.
    #[serde(default)]
    pub precision: PrecisionLevel,

    // --- Candle log & pending-signal bounds ---------------------------------
    /// Number of closed candles kept in the bounded log.
    #[serde(default = "default_candle_window")]
    pub candle_window: usize,

    /// Absolute cap on outstanding pending signals; oldest evicted beyond it.
    #[serde(default = "default_max_pending_signals")]
    pub max_pending_signals: usize,

    // --- Candle feed --------------------------------------------------------
    /// Simulated or live candle source.
    #[serde(default)]
    pub candle_feed: CandleFeedKind,

    /// WebSocket URL for the live feed (ignored for simulated).
    #[serde(default)]
    pub feed_url: Option<String>,

    /// Seed for the simulated candle walk; identical seeds replay identical
    /// sessions.
    #[serde(default = "default_sim_seed")]
    pub sim_seed: u64,

    /// Starting price for the simulated walk.
    #[serde(default = "default_sim_start_price")]
    pub sim_start_price: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            timeframe: Timeframe::M1,
            market_type: MarketType::Regular,
            precision: PrecisionLevel::Normal,
            candle_window: default_candle_window(),
            max_pending_signals: default_max_pending_signals(),
            candle_feed: CandleFeedKind::Simulated,
            feed_url: None,
            sim_seed: default_sim_seed(),
            sim_start_price: default_sim_start_price(),
        }
    }
}

impl EngineConfig {
    /// The per-evaluation context handed to the scoring pipeline.
    pub fn market_context(&self) -> MarketContext {
        MarketContext {
            timeframe: self.timeframe,
            market_type: self.market_type,
            precision: self.precision,
        }
    }

    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            timeframe = %config.timeframe,
            market_type = %config.market_type,
            "engine config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    ///
    /// This prevents corruption if the process crashes mid-write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise engine config")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.symbol, "EURUSD");
        assert_eq!(cfg.timeframe, Timeframe::M1);
        assert_eq!(cfg.market_type, MarketType::Regular);
        assert_eq!(cfg.candle_window, 25);
        assert_eq!(cfg.max_pending_signals, 32);
        assert_eq!(cfg.candle_feed, CandleFeedKind::Simulated);
        assert!(cfg.feed_url.is_none());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.timeframe, Timeframe::M1);
        assert_eq!(cfg.precision, PrecisionLevel::Normal);
        assert_eq!(cfg.candle_window, 25);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "timeframe": "S30", "market_type": "Otc", "symbol": "GBPUSD-OTC" }"#;
        let cfg: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.timeframe, Timeframe::S30);
        assert_eq!(cfg.market_type, MarketType::Otc);
        assert_eq!(cfg.symbol, "GBPUSD-OTC");
        assert_eq!(cfg.max_pending_signals, 32);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.symbol, cfg2.symbol);
        assert_eq!(cfg.timeframe, cfg2.timeframe);
        assert_eq!(cfg.candle_window, cfg2.candle_window);
    }

    #[test]
    fn market_context_mirrors_config() {
        let mut cfg = EngineConfig::default();
        cfg.timeframe = Timeframe::S30;
        cfg.market_type = MarketType::Otc;
        cfg.precision = PrecisionLevel::High;
        let ctx = cfg.market_context();
        assert_eq!(ctx.timeframe, Timeframe::S30);
        assert_eq!(ctx.market_type, MarketType::Otc);
        assert_eq!(ctx.precision, PrecisionLevel::High);
    }
}
