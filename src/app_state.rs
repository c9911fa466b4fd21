// =============================================================================
// AppState — Shared state between the engine loops and the API layer
// =============================================================================
//
// Single Arc-shared struct; every mutation bumps `state_version` so the
// WebSocket layer pushes exactly one snapshot per observable change instead
// of streaming payloads on a blind timer.
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::confirm::engine::PendingSummary;
use crate::confirm::{ConfirmationEngine, ConfirmationOutcome};
use crate::decision::Decision;
use crate::history::{IndicatorHistoryEntry, IndicatorHistoryStore};
use crate::market_data::CandleLog;
use crate::runtime_config::EngineConfig;
use crate::types::Candle;

/// Ring size for the decision and outcome audit trails.
const RECENT_CAP: usize = 50;

pub struct AppState {
    pub config: RwLock<EngineConfig>,
    pub candle_log: RwLock<CandleLog>,
    pub history: Arc<IndicatorHistoryStore>,
    pub confirmation: RwLock<ConfirmationEngine>,

    recent_decisions: RwLock<VecDeque<Decision>>,
    recent_outcomes: RwLock<VecDeque<ConfirmationOutcome>>,

    /// Monotonic change counter; the WS push loop watches it move.
    state_version: AtomicU64,

    pub started_at: DateTime<Utc>,
}

/// Full point-in-time view served over REST and WS.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub version: u64,
    pub symbol: String,
    pub timeframe: String,
    pub market_type: String,
    pub uptime_secs: i64,
    pub candles_seen: u64,
    pub latest_candle: Option<Candle>,
    pub pending_signals: Vec<PendingSummary>,
    pub latest_decision: Option<Decision>,
    pub indicator_trust: Vec<TrustRow>,
}

/// One row of the indicator trust table.
#[derive(Debug, Clone, Serialize)]
pub struct TrustRow {
    pub name: String,
    pub success_count: u64,
    pub failure_count: u64,
    pub trust_factor: f64,
    pub last_outcome: Option<bool>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        let candle_log = CandleLog::new(config.candle_window);
        let confirmation = ConfirmationEngine::new(config.max_pending_signals);
        Arc::new(Self {
            config: RwLock::new(config),
            candle_log: RwLock::new(candle_log),
            history: Arc::new(IndicatorHistoryStore::new()),
            confirmation: RwLock::new(confirmation),
            recent_decisions: RwLock::new(VecDeque::with_capacity(RECENT_CAP)),
            recent_outcomes: RwLock::new(VecDeque::with_capacity(RECENT_CAP)),
            state_version: AtomicU64::new(0),
            started_at: Utc::now(),
        })
    }

    /// Record an observable change.
    pub fn bump_version(&self) {
        self.state_version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    pub fn push_decision(&self, decision: Decision) {
        let mut ring = self.recent_decisions.write();
        if ring.len() >= RECENT_CAP {
            ring.pop_front();
        }
        ring.push_back(decision);
    }

    pub fn push_outcome(&self, outcome: ConfirmationOutcome) {
        let mut ring = self.recent_outcomes.write();
        if ring.len() >= RECENT_CAP {
            ring.pop_front();
        }
        ring.push_back(outcome);
    }

    pub fn recent_decisions(&self) -> Vec<Decision> {
        self.recent_decisions.read().iter().cloned().collect()
    }

    pub fn recent_outcomes(&self) -> Vec<ConfirmationOutcome> {
        self.recent_outcomes.read().iter().cloned().collect()
    }

    pub fn build_snapshot(&self) -> StateSnapshot {
        let config = self.config.read();
        let log = self.candle_log.read();
        let mut trust: Vec<TrustRow> = self
            .history
            .entries()
            .into_iter()
            .map(|(name, entry)| trust_row(name, &entry))
            .collect();
        trust.sort_by(|a, b| a.name.cmp(&b.name));

        StateSnapshot {
            version: self.version(),
            symbol: config.symbol.clone(),
            timeframe: config.timeframe.to_string(),
            market_type: config.market_type.to_string(),
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            candles_seen: log.latest_index().map(|i| i + 1).unwrap_or(0),
            latest_candle: log.latest().cloned(),
            pending_signals: self.confirmation.read().summaries(),
            latest_decision: self.recent_decisions.read().back().cloned(),
            indicator_trust: trust,
        }
    }
}

fn trust_row(name: String, entry: &IndicatorHistoryEntry) -> TrustRow {
    TrustRow {
        name,
        success_count: entry.success_count,
        failure_count: entry.failure_count,
        trust_factor: entry.trust_factor(),
        last_outcome: entry.last_outcome,
    }
}

// =============================================================================
// Tests
// =============================================================================
