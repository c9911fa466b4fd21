// =============================================================================
// Prism Signal Engine — Main Entry Point
// =============================================================================
//
// Boots the candle feed, the confirmation engine, and the REST/WS API, then
// runs until Ctrl-C. Configuration comes from prism_config.json with PRISM_*
// environment overrides on top.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod confirm;
mod decision;
mod engine;
mod history;
mod indicators;
mod market_data;
mod market_quality;
mod runtime_config;
mod scoring;
mod types;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::engine::SignalEngine;
use crate::runtime_config::{CandleFeedKind, EngineConfig};
use crate::types::{MarketType, Timeframe};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║            Prism Signal Engine — Starting Up            ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = EngineConfig::load("prism_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        EngineConfig::default()
    });
    apply_env_overrides(&mut config);

    info!(
        symbol = %config.symbol,
        timeframe = %config.timeframe,
        market_type = %config.market_type,
        feed = ?config.candle_feed,
        "engine configuration"
    );

    // ── 2. Shared state & engine loops ───────────────────────────────────
    let state = AppState::new(config);
    let handle = SignalEngine::start(state.clone(), engine::default_indicator_source());

    // ── 3. API server ────────────────────────────────────────────────────
    let bind_addr = std::env::var("PRISM_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let app = api::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "API server failed");
        }
    });

    // ── 4. Run until Ctrl-C ──────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    handle.stop().await;
    server.abort();
    info!("goodbye");
    Ok(())
}

/// Apply `PRISM_*` environment overrides on top of the loaded config.
fn apply_env_overrides(config: &mut EngineConfig) {
    if let Ok(symbol) = std::env::var("PRISM_SYMBOL") {
        if !symbol.trim().is_empty() {
            config.symbol = symbol.trim().to_uppercase();
        }
    }
    if let Ok(tf) = std::env::var("PRISM_TIMEFRAME") {
        match tf.trim() {
            "30s" => config.timeframe = Timeframe::S30,
            "1m" => config.timeframe = Timeframe::M1,
            "2m" => config.timeframe = Timeframe::M2,
            "5m" => config.timeframe = Timeframe::M5,
            other => warn!(value = %other, "unrecognised PRISM_TIMEFRAME ignored"),
        }
    }
    if let Ok(mt) = std::env::var("PRISM_MARKET_TYPE") {
        match mt.trim().to_lowercase().as_str() {
            "regular" => config.market_type = MarketType::Regular,
            "otc" => config.market_type = MarketType::Otc,
            other => warn!(value = %other, "unrecognised PRISM_MARKET_TYPE ignored"),
        }
    }
    if let Ok(url) = std::env::var("PRISM_FEED_URL") {
        if !url.trim().is_empty() {
            config.feed_url = Some(url.trim().to_string());
            config.candle_feed = CandleFeedKind::Live;
        }
    }
}
