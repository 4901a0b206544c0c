use tracing::warn;

use crate::engine::phase::{Phase, PhaseKey, PhaseState};
use crate::model::candle::PartialCandle;
use crate::model::direction::{CandleColor, TradePosition};

/// Golden-ratio retracement applied by the phase-2 close formula.
pub const RETRACEMENT_RATIO: f64 = 0.618;

/// Default distance in points between the predicted close and the entry
/// trigger consumed by the execution side.
pub const DEFAULT_ENTRY_OFFSET_POINTS: f64 = 16.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ClosePrediction {
    pub predicted_close: f64,
    pub color: CandleColor,
    pub position: TradePosition,
    /// Predicted close shifted against the direction by the entry offset.
    pub entry_trigger: f64,
    pub phase_used: Phase,
    pub algorithm: String,
}

/// Predicted closing value for the partial candle under the given phase
/// state. Pure: identical inputs always produce identical output.
pub fn predict_close(
    state: &PhaseState,
    partial: &PartialCandle,
    entry_offset: f64,
) -> ClosePrediction {
    let (predicted_close, algorithm) = match state.phase {
        Phase::Two => (phase2_close(partial), "fibonacci-amplitude".to_string()),
        Phase::One => {
            let label = match state.active_key {
                Some(key) => format!("phase1-{}", key.as_str()),
                None => "phase1-default".to_string(),
            };
            (phase1_close(partial, state.active_key), label)
        }
    };

    let color = if predicted_close > partial.open {
        CandleColor::Green
    } else {
        CandleColor::Red
    };
    let position = match color {
        CandleColor::Green => TradePosition::Long,
        CandleColor::Red => TradePosition::Short,
    };
    let entry_trigger = match color {
        CandleColor::Green => predicted_close - entry_offset,
        CandleColor::Red => predicted_close + entry_offset,
    };

    ClosePrediction {
        predicted_close,
        color,
        position,
        entry_trigger,
        phase_used: state.phase,
        algorithm,
    }
}

/// Phase-2 retracement: an open at or below the current midpoint retraces
/// upward toward the high, otherwise downward toward the low.
fn phase2_close(partial: &PartialCandle) -> f64 {
    let midpoint = partial.midpoint();
    let close = if partial.open <= midpoint {
        partial.open + RETRACEMENT_RATIO * (partial.high_so_far - partial.open)
    } else {
        partial.open - RETRACEMENT_RATIO * (partial.open - partial.low_so_far)
    };
    if close.is_finite() {
        close
    } else {
        warn!(
            open = partial.open,
            high = partial.high_so_far,
            low = partial.low_so_far,
            "non-finite phase-2 close, falling back to open"
        );
        partial.open
    }
}

/// Phase-1 keyed linear blends of the partial candle's open/high/low.
fn phase1_close(partial: &PartialCandle, key: Option<PhaseKey>) -> f64 {
    let (open, high, low) = (partial.open, partial.high_so_far, partial.low_so_far);
    let close = match key {
        Some(PhaseKey::SumLast3) => low + (high - low) * 0.6,
        Some(PhaseKey::DecimalPattern) => low + (high - low) * 0.382,
        Some(PhaseKey::LastIntegerDigit) => open + (high - open) * 0.5,
        Some(PhaseKey::FirstDigitParity) | None => (open + high + low) / 3.0,
    };
    if close.is_finite() {
        close
    } else {
        warn!(
            open,
            high, low, "non-finite phase-1 close, falling back to open"
        );
        open
    }
}
