pub mod amplitude;
pub mod close;
pub mod ledger;
pub mod phase;

pub use amplitude::{
    predict_amplitude, AmplitudePrediction, CloseForecast, EntryStrategy, MovementExpectation,
    PricePositionLabel, Recommendation, RiskLevel, StakeTier,
};
pub use close::{
    predict_close, ClosePrediction, DEFAULT_ENTRY_OFFSET_POINTS, RETRACEMENT_RATIO,
};
pub use ledger::{Confirmation, LedgerEntry, LedgerStats, PredictionLedger};
pub use phase::{classify_phase, select_key, Phase, PhaseKey, PhaseState};

use crate::model::candle::Candle;
use crate::stats::AmplitudeStatistics;

/// Wire confidence reported for phase-2 close predictions, carried over from
/// the engine this replaces.
pub const PHASE2_BASE_CONFIDENCE: f64 = 0.8485;

/// Write-once snapshot derived from one historical dataset: the phase/key
/// classification and the amplitude statistics. Every prediction call takes
/// it by shared reference; it is never mutated after construction, so two
/// instruments can never contaminate each other.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProfile {
    pub phase_state: PhaseState,
    pub stats: AmplitudeStatistics,
    pub history_len: usize,
}

impl EngineProfile {
    pub fn from_history(history: &[Candle]) -> Self {
        Self {
            phase_state: PhaseState::from_history(history),
            stats: AmplitudeStatistics::from_history(history),
            history_len: history.len(),
        }
    }

    /// Confidence reported alongside close predictions: the phase-1 key
    /// backtest hit-rate, or the fixed phase-2 figure.
    pub fn close_confidence(&self) -> f64 {
        match self.phase_state.phase {
            Phase::One => self.phase_state.key_hit_rate.unwrap_or(0.5),
            Phase::Two => PHASE2_BASE_CONFIDENCE,
        }
    }
}
