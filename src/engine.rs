// =============================================================================
// SignalEngine — Candle tick and evaluation loops
// =============================================================================
//
// Two cooperating tokio tasks around the shared AppState:
//
//   candle loop     feed -> append to log -> settle pending signals ->
//                   trust write-back -> hand the window to the evaluator
//   evaluation loop indicator readings -> noise/volatility -> aggregate ->
//                   entry gate -> expiration -> Decision -> register pending
//
// The feed itself is a third task (simulated walk or live WebSocket) writing
// into an mpsc channel. A watch channel stops everything; pending signals are
// discarded on stop without emitting outcomes.
// =============================================================================

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::decision::Decision;
use crate::indicators::IndicatorSource;
use crate::market_data::feed::run_candle_feed;
use crate::market_data::SimulatedCandleSource;
use crate::market_quality::{candle_volatility, has_large_bodies, market_noise};
use crate::runtime_config::CandleFeedKind;
use crate::scoring::{expiration_secs, EntryGate, ExpirationInputs, WeightedAggregator};
use crate::types::{Candle, IndicatorReading, MarketContext};

/// Candle buffer between the feed task and the candle loop.
const FEED_CHANNEL_CAPACITY: usize = 64;

/// Delay before reconnecting a dropped live feed.
const FEED_RETRY_SECS: u64 = 5;

pub struct SignalEngine;

pub struct EngineHandle {
    stop_tx: watch::Sender<bool>,
    feed_task: JoinHandle<()>,
    candle_task: JoinHandle<()>,
    eval_task: JoinHandle<()>,
    state: Arc<AppState>,
}

impl EngineHandle {
    /// Stop both loops and discard all pending signals.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        self.feed_task.abort();
        let _ = self.feed_task.await;
        let _ = self.candle_task.await;
        let _ = self.eval_task.await;
        self.state.confirmation.write().clear();
        self.state.bump_version();
        info!("engine stopped");
    }
}

impl SignalEngine {
    /// Spawn the feed, candle, and evaluation tasks.
    pub fn start(
        state: Arc<AppState>,
        mut source: Box<dyn IndicatorSource + Send>,
    ) -> EngineHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (candle_tx, mut candle_rx) = mpsc::channel::<Candle>(FEED_CHANNEL_CAPACITY);
        let (window_tx, mut window_rx) = mpsc::channel::<Vec<Candle>>(FEED_CHANNEL_CAPACITY);

        let feed_task = tokio::spawn(run_feed(state.clone(), candle_tx));

        // ---- candle loop -----------------------------------------------
        let candle_state = state.clone();
        let mut candle_stop = stop_rx.clone();
        let candle_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = candle_stop.changed() => {
                        if *candle_stop.borrow() {
                            break;
                        }
                    }
                    candle = candle_rx.recv() => {
                        let Some(candle) = candle else { break };
                        on_candle(&candle_state, candle, &window_tx).await;
                    }
                }
            }
        });

        // ---- evaluation loop -------------------------------------------
        let eval_state = state.clone();
        let mut eval_stop = stop_rx;
        let eval_task = tokio::spawn(async move {
            let aggregator = WeightedAggregator::new(eval_state.history.clone());
            loop {
                tokio::select! {
                    _ = eval_stop.changed() => {
                        if *eval_stop.borrow() {
                            break;
                        }
                    }
                    window = window_rx.recv() => {
                        let Some(window) = window else { break };
                        let readings = source.next_readings(&window);
                        if readings.is_empty() {
                            continue;
                        }
                        on_readings(&eval_state, &aggregator, readings, &window);
                    }
                }
            }
        });

        info!("engine started");
        EngineHandle {
            stop_tx,
            feed_task,
            candle_task,
            eval_task,
            state,
        }
    }
}

// -----------------------------------------------------------------------------
// Candle feed
// -----------------------------------------------------------------------------

async fn run_feed(state: Arc<AppState>, tx: mpsc::Sender<Candle>) {
    let (kind, url, period, seed, start_price) = {
        let config = state.config.read();
        (
            config.candle_feed.clone(),
            config.feed_url.clone(),
            config.timeframe.secs(),
            config.sim_seed,
            config.sim_start_price,
        )
    };

    match kind {
        CandleFeedKind::Simulated => {
            let mut sim = SimulatedCandleSource::new(seed, start_price);
            let mut ticker = tokio::time::interval(Duration::from_secs(period));
            // The first tick fires immediately; skip it so candles arrive at
            // period boundaries.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(sim.next_candle()).await.is_err() {
                    return;
                }
            }
        }
        CandleFeedKind::Live => {
            let Some(url) = url else {
                error!("live candle feed selected but no feed_url configured");
                return;
            };
            loop {
                if let Err(e) = run_candle_feed(&url, tx.clone()).await {
                    warn!(error = %e, "candle feed dropped, reconnecting");
                }
                if tx.is_closed() {
                    return;
                }
                sleep(Duration::from_secs(FEED_RETRY_SECS)).await;
            }
        }
    }
}

// -----------------------------------------------------------------------------
// Per-candle work
// -----------------------------------------------------------------------------

async fn on_candle(state: &Arc<AppState>, candle: Candle, window_tx: &mpsc::Sender<Vec<Candle>>) {
    let window = {
        let mut log = state.candle_log.write();
        log.append(candle);
        log.window()
    };

    // Settle pending signals against the fresh log snapshot.
    let outcomes = {
        let log = state.candle_log.read();
        state.confirmation.write().on_candle(&log)
    };

    for outcome in outcomes {
        if let Some(success) = outcome.status.trust_outcome() {
            for name in &outcome.contributors {
                state.history.record_outcome(name, success);
            }
        }
        state.push_outcome(outcome);
    }

    state.bump_version();

    if window_tx.send(window).await.is_err() {
        warn!("evaluation loop gone, dropping window");
    }
}

// -----------------------------------------------------------------------------
// Per-batch evaluation
// -----------------------------------------------------------------------------

fn on_readings(
    state: &Arc<AppState>,
    aggregator: &WeightedAggregator,
    readings: Vec<IndicatorReading>,
    window: &[Candle],
) {
    let ctx = state.config.read().market_context();
    let decision = evaluate_batch(aggregator, readings, window, &ctx);

    info!(
        entry = %decision.entry_point,
        confidence = format!("{:.1}", decision.confidence),
        expires_in = decision.expires_in_secs,
        "decision: {}",
        decision.narrative
    );

    if decision.is_actionable_candidate() {
        let latest_index = state
            .candle_log
            .read()
            .latest_index()
            .unwrap_or(0);
        state
            .confirmation
            .write()
            .register(&decision, latest_index, ctx.timeframe);
    }

    state.push_decision(decision);
    state.bump_version();
}

/// The full scoring pipeline for one batch of readings. Pure except for the
/// trust reads inside the aggregator.
pub fn evaluate_batch(
    aggregator: &WeightedAggregator,
    readings: Vec<IndicatorReading>,
    window: &[Candle],
    ctx: &MarketContext,
) -> Decision {
    let noise = market_noise(&readings, ctx.market_type);
    let volatility = candle_volatility(window);
    let scores = aggregator.aggregate(&readings, ctx, &volatility);
    let gate = EntryGate::decide(&scores, noise, &volatility, ctx);

    let expires_in_secs = expiration_secs(ExpirationInputs {
        timeframe: ctx.timeframe,
        market_type: ctx.market_type,
        confidence: gate.confidence,
        volatility_level: volatility.level,
        large_bodies: has_large_bodies(window),
    });

    let created_at = Utc::now();
    Decision {
        id: Uuid::new_v4(),
        entry_point: gate.entry_point,
        confidence: gate.confidence,
        expiration_time: created_at + ChronoDuration::seconds(expires_in_secs as i64),
        expires_in_secs,
        indicators: readings,
        narrative: gate.narrative,
        created_at,
    }
}

/// The indicator source used when none is supplied explicitly.
pub fn default_indicator_source() -> Box<dyn IndicatorSource + Send> {
    Box::new(crate::indicators::ChartIndicatorSource::new())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::IndicatorHistoryStore;
    use crate::types::{
        EntryPoint, IndicatorKind, MarketType, PrecisionLevel, Signal, Timeframe,
    };

    fn ctx() -> MarketContext {
        MarketContext {
            timeframe: Timeframe::M1,
            market_type: MarketType::Regular,
            precision: PrecisionLevel::Normal,
        }
    }

    fn calm_window() -> Vec<Candle> {
        (0..20)
            .map(|i| Candle {
                open: 100.0,
                high: 100.1,
                low: 99.9,
                close: 100.05,
                timestamp: Utc::now(),
                index: i,
            })
            .collect()
    }

    fn reading(name: &str, kind: IndicatorKind, signal: Signal, strength: f64) -> IndicatorReading {
        IndicatorReading::new(name, kind, signal, strength)
    }

    #[test]
    fn strong_confluence_produces_actionable_buy() {
        let aggregator = WeightedAggregator::new(Arc::new(IndicatorHistoryStore::new()));
        let readings = vec![
            reading("trendlines", IndicatorKind::Trendline, Signal::Buy, 85.0),
            reading("fibonacci", IndicatorKind::Fibonacci, Signal::Buy, 75.0),
            reading("momentum", IndicatorKind::Momentum, Signal::Buy, 70.0),
        ];
        let decision = evaluate_batch(&aggregator, readings, &calm_window(), &ctx());
        assert_eq!(decision.entry_point, EntryPoint::Buy);
        assert!(decision.confidence > 55.0);
        assert!(decision.expires_in_secs >= 1);
        assert!(decision.is_actionable_candidate());
    }

    #[test]
    fn empty_readings_produce_zero_confidence_wait() {
        let aggregator = WeightedAggregator::new(Arc::new(IndicatorHistoryStore::new()));
        let decision = evaluate_batch(&aggregator, Vec::new(), &calm_window(), &ctx());
        assert_eq!(decision.entry_point, EntryPoint::Wait);
        assert_eq!(decision.confidence, 0.0);
        assert!(!decision.is_actionable_candidate());
    }

    #[test]
    fn expiration_time_matches_window() {
        let aggregator = WeightedAggregator::new(Arc::new(IndicatorHistoryStore::new()));
        let readings = vec![reading(
            "trendlines",
            IndicatorKind::Trendline,
            Signal::Buy,
            85.0,
        )];
        let decision = evaluate_batch(&aggregator, readings, &calm_window(), &ctx());
        let delta = decision.expiration_time - decision.created_at;
        assert_eq!(delta.num_seconds(), decision.expires_in_secs as i64);
    }

    #[test]
    fn decision_carries_its_readings_for_the_audit_trail() {
        let aggregator = WeightedAggregator::new(Arc::new(IndicatorHistoryStore::new()));
        let readings = vec![
            reading("trendlines", IndicatorKind::Trendline, Signal::Buy, 85.0),
            IndicatorReading::not_found("volume", IndicatorKind::Volume),
        ];
        let decision = evaluate_batch(&aggregator, readings, &calm_window(), &ctx());
        assert_eq!(decision.indicators.len(), 2);
    }
}
