// =============================================================================
// Confirmation Engine — Pending-signal registry and per-candle evaluation
// =============================================================================
//
// Owns every live pending signal on both paths. Registration routes a fresh
// decision to the simple or sequential path; each candle close evaluates the
// whole registry against an immutable log snapshot, collecting transitions
// first and committing them afterwards so a settled signal observed mid-pass
// cannot influence a later one.
// =============================================================================

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decision::Decision;
use crate::market_data::CandleLog;
use crate::types::{EntryPoint, Timeframe};

use super::pending::{PendingSignal, SimpleVerdict};
use super::sequential::{SequentialSignal, SequentialStep};
use super::{ConfirmationOutcome, ConfirmationStatus};

/// Confidence below which a signal takes the sequential path.
pub const SEQUENTIAL_CONFIDENCE_CUTOFF: f64 = 75.0;

/// Point-in-time view of one live pending signal, for the API snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PendingSummary {
    pub id: Uuid,
    pub direction: EntryPoint,
    pub original_confidence: f64,
    pub sequential: bool,
    /// Counter progress; `0 of 1` on the simple path.
    pub validated_candles: u32,
    pub required_candles: u32,
}

pub struct ConfirmationEngine {
    simple: HashMap<Uuid, PendingSignal>,
    sequential: HashMap<Uuid, SequentialSignal>,
    max_pending: usize,
}

impl ConfirmationEngine {
    pub fn new(max_pending: usize) -> Self {
        Self {
            simple: HashMap::new(),
            sequential: HashMap::new(),
            max_pending: max_pending.max(1),
        }
    }

    /// Whether a decision must take the multi-candle sequential path.
    pub fn routes_sequential(confidence: f64, timeframe: Timeframe) -> bool {
        confidence < SEQUENTIAL_CONFIDENCE_CUTOFF || timeframe.is_fast()
    }

    /// Register an actionable decision as a pending signal.
    ///
    /// WAIT decisions are ignored. When the registry is full the oldest
    /// pending signal is evicted without an outcome.
    pub fn register(&mut self, decision: &Decision, latest_candle_index: u64, timeframe: Timeframe) {
        if !decision.is_actionable_candidate() {
            return;
        }

        while self.pending_count() >= self.max_pending {
            self.evict_oldest();
        }

        let sequential = Self::routes_sequential(decision.confidence, timeframe);
        let signal =
            PendingSignal::from_decision(decision, latest_candle_index, timeframe, sequential);
        if sequential {
            let seq = SequentialSignal::new(signal, timeframe);
            debug!(
                id = %decision.id,
                required = seq.required_candles,
                "pending signal registered on sequential path"
            );
            self.sequential.insert(decision.id, seq);
        } else {
            debug!(id = %decision.id, "pending signal registered on simple path");
            self.simple.insert(decision.id, signal);
        }
    }

    /// Evaluate every pending signal against the latest closed candle.
    ///
    /// All transitions are computed against the same log snapshot before any
    /// signal is removed, so evaluation order within a pass cannot matter.
    pub fn on_candle(&mut self, log: &CandleLog) -> Vec<ConfirmationOutcome> {
        let latest = match log.latest() {
            Some(c) => c.clone(),
            None => return Vec::new(),
        };

        let mut settled: Vec<(Uuid, ConfirmationOutcome)> = Vec::new();

        // ---- collect: simple path --------------------------------------
        for (id, signal) in &self.simple {
            let target = signal.confirmation_candle_index();
            let verdict = match log.get(target) {
                Some(candle) => match signal.judge(candle) {
                    // Neutral confirmation candle: it stays pending only
                    // while the clock allows.
                    SimpleVerdict::StillPending
                        if latest.timestamp > signal.confirmation_deadline =>
                    {
                        SimpleVerdict::Expire
                    }
                    v => v,
                },
                // Not closed yet, or pruned out from under us: only the
                // deadline can settle it.
                None if latest.timestamp > signal.confirmation_deadline => SimpleVerdict::Expire,
                None => SimpleVerdict::StillPending,
            };
            let (status, final_confidence) = match verdict {
                SimpleVerdict::Confirm(conf) => (ConfirmationStatus::Confirmed, conf),
                SimpleVerdict::Reject(conf) => (ConfirmationStatus::Rejected, conf),
                SimpleVerdict::Expire => {
                    (ConfirmationStatus::Expired, signal.original_confidence)
                }
                SimpleVerdict::StillPending => continue,
            };
            settled.push((
                *id,
                ConfirmationOutcome {
                    signal_id: *id,
                    direction: signal.direction,
                    status,
                    final_confidence,
                    candle_index: latest.index,
                    adjusted_expiration_secs: None,
                    contributors: signal.contributors.clone(),
                    settled_at: Utc::now(),
                },
            ));
        }

        // ---- collect: sequential path ----------------------------------
        for (id, signal) in self.sequential.iter_mut() {
            match signal.observe(&latest) {
                SequentialStep::Validated {
                    final_confidence,
                    adjusted_expiration_secs,
                } => {
                    settled.push((
                        *id,
                        ConfirmationOutcome {
                            signal_id: *id,
                            direction: signal.base.direction,
                            status: ConfirmationStatus::Validated,
                            final_confidence,
                            candle_index: latest.index,
                            adjusted_expiration_secs: Some(adjusted_expiration_secs),
                            contributors: signal.base.contributors.clone(),
                            settled_at: Utc::now(),
                        },
                    ));
                }
                SequentialStep::Expired => {
                    settled.push((
                        *id,
                        ConfirmationOutcome {
                            signal_id: *id,
                            direction: signal.base.direction,
                            status: ConfirmationStatus::Expired,
                            final_confidence: signal.base.original_confidence,
                            candle_index: latest.index,
                            adjusted_expiration_secs: None,
                            contributors: signal.base.contributors.clone(),
                            settled_at: Utc::now(),
                        },
                    ));
                }
                SequentialStep::Reset { extended } => {
                    debug!(id = %id, extended, "sequential run reset by opposing candle");
                }
                SequentialStep::Progress { validated, required } => {
                    debug!(id = %id, validated, required, "sequential run advanced");
                }
                SequentialStep::Ignored => {}
            }
        }

        // ---- commit ----------------------------------------------------
        let mut outcomes = Vec::with_capacity(settled.len());
        for (id, outcome) in settled {
            self.simple.remove(&id);
            self.sequential.remove(&id);
            info!(
                id = %id,
                status = %outcome.status,
                confidence = outcome.final_confidence,
                "pending signal settled"
            );
            outcomes.push(outcome);
        }
        outcomes
    }

    pub fn pending_count(&self) -> usize {
        self.simple.len() + self.sequential.len()
    }

    /// Drop every pending signal without emitting outcomes.
    pub fn clear(&mut self) {
        let dropped = self.pending_count();
        if dropped > 0 {
            info!(dropped, "discarding pending signals");
        }
        self.simple.clear();
        self.sequential.clear();
    }

    /// Live registry view for the state snapshot.
    pub fn summaries(&self) -> Vec<PendingSummary> {
        let mut out: Vec<PendingSummary> = self
            .simple
            .values()
            .map(|s| PendingSummary {
                id: s.id,
                direction: s.direction,
                original_confidence: s.original_confidence,
                sequential: false,
                validated_candles: 0,
                required_candles: 1,
            })
            .chain(self.sequential.values().map(|s| PendingSummary {
                id: s.base.id,
                direction: s.base.direction,
                original_confidence: s.base.original_confidence,
                sequential: true,
                validated_candles: s.validated_candles,
                required_candles: s.required_candles,
            }))
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    fn evict_oldest(&mut self) {
        let oldest_simple = self
            .simple
            .values()
            .min_by_key(|s| s.created_at_candle_index)
            .map(|s| (s.id, s.created_at_candle_index));
        let oldest_seq = self
            .sequential
            .values()
            .min_by_key(|s| s.base.created_at_candle_index)
            .map(|s| (s.base.id, s.base.created_at_candle_index));

        let victim = match (oldest_simple, oldest_seq) {
            (Some(a), Some(b)) => Some(if a.1 <= b.1 { a } else { b }),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        if let Some((id, created)) = victim {
            warn!(%id, created_at_candle = created, "pending registry full, evicting oldest");
            self.simple.remove(&id);
            self.sequential.remove(&id);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
