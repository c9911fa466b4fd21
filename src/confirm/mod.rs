// =============================================================================
// Confirmation Module
// =============================================================================
//
// Everything between "the gate said BUY/SELL" and "that call is settled".
// A decision becomes a PendingSignal here and leaves as exactly one
// ConfirmationOutcome: confirmed, validated, rejected, or expired. The engine
// owns all pending state; nothing outside this module mutates a signal.

pub mod engine;
pub mod pending;
pub mod sequential;

pub use engine::ConfirmationEngine;
pub use pending::PendingSignal;
pub use sequential::SequentialSignal;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::EntryPoint;

/// Terminal state of a settled signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfirmationStatus {
    /// Simple path: the next candle moved with the signal.
    Confirmed,
    /// Simple path: the next candle moved against the signal.
    Rejected,
    /// Deadline passed without resolution.
    Expired,
    /// Sequential path: the required run of matching candles completed.
    Validated,
}

impl std::fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Validated => write!(f, "VALIDATED"),
        }
    }
}

impl ConfirmationStatus {
    /// Whether this outcome counts as a success for indicator trust tracking.
    /// Expired signals never settle either way.
    pub fn trust_outcome(&self) -> Option<bool> {
        match self {
            Self::Confirmed | Self::Validated => Some(true),
            Self::Rejected => Some(false),
            Self::Expired => None,
        }
    }
}

/// Outbound event emitted once per settled signal.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationOutcome {
    pub signal_id: Uuid,
    pub direction: EntryPoint,
    pub status: ConfirmationStatus,
    /// Confidence after the confirmation adjustment was applied.
    pub final_confidence: f64,
    /// Absolute index of the candle that settled the signal.
    pub candle_index: u64,
    /// Rescaled validity window, only on sequential validation.
    pub adjusted_expiration_secs: Option<u64>,
    /// Indicator names that contributed, for history write-back.
    pub contributors: Vec<String>,
    pub settled_at: DateTime<Utc>,
}
