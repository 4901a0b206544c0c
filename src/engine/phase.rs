use tracing::{debug, info};

use crate::model::candle::Candle;

/// Mean open value separating the two numeric regimes.
pub const PHASE_SPLIT_MEAN_OPEN: f64 = 1000.0;

const MIN_CANDLES_FOR_KEY_SEARCH: usize = 10;
const MIN_USABLE_PAIRS: u32 = 5;

/// Numeric-scale regime of the traded instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    One,
    Two,
}

impl Phase {
    pub fn as_number(self) -> u8 {
        match self {
            Phase::One => 1,
            Phase::Two => 2,
        }
    }
}

/// Digit-pattern heuristics applied to a prior open value in phase 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKey {
    SumLast3,
    FirstDigitParity,
    DecimalPattern,
    LastIntegerDigit,
}

impl PhaseKey {
    /// Fixed evaluation order; ties during selection keep the earliest entry.
    pub const ALL: [PhaseKey; 4] = [
        PhaseKey::SumLast3,
        PhaseKey::FirstDigitParity,
        PhaseKey::DecimalPattern,
        PhaseKey::LastIntegerDigit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKey::SumLast3 => "sum_last_3",
            PhaseKey::FirstDigitParity => "first_digit_parity",
            PhaseKey::DecimalPattern => "decimal_pattern",
            PhaseKey::LastIntegerDigit => "last_integer_digit",
        }
    }

    /// Scalar heuristic over the exact decimal form of a prior open value.
    /// `None` when the representation contains characters the key cannot
    /// digest (sign, exponent form), in which case the pair is skipped.
    pub fn apply(self, open: f64) -> Option<f64> {
        match self {
            PhaseKey::SumLast3 => {
                let digits = decimal_repr(open).replace('.', "");
                let tail_start = digits.chars().count().saturating_sub(3);
                let mut sum = 0;
                for c in digits.chars().skip(tail_start) {
                    sum += c.to_digit(10)?;
                }
                Some(f64::from(sum % 2))
            }
            PhaseKey::FirstDigitParity => {
                let digits = decimal_repr(open).replace('.', "");
                let first = digits.chars().next()?;
                Some(f64::from(first.to_digit(10)? % 2))
            }
            PhaseKey::DecimalPattern => {
                let repr = decimal_repr(open);
                let fractional = repr.rsplit('.').next().unwrap_or(repr.as_str());
                let mut sum = 0;
                for c in fractional.chars() {
                    sum += c.to_digit(10)?;
                }
                Some(f64::from(sum % 10) / 10.0)
            }
            PhaseKey::LastIntegerDigit => {
                if !open.is_finite() {
                    return None;
                }
                let integer = format!("{:.0}", open.trunc());
                let last = integer.chars().last()?;
                Some(f64::from(last.to_digit(10)? % 2))
            }
        }
    }
}

/// Shortest round-trip decimal form, always carrying a fractional point for
/// whole values (`10.0`, not `10`). Mirrors the representation the key
/// heuristics were calibrated against.
fn decimal_repr(value: f64) -> String {
    format!("{value:?}")
}

/// Write-once classification derived from one historical dataset. Passed by
/// shared reference into every subsequent prediction call; never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseState {
    pub phase: Phase,
    pub active_key: Option<PhaseKey>,
    /// Backtest hit-rate of the selected key (phase 1 only; 0.5 when the key
    /// was defaulted without evaluation).
    pub key_hit_rate: Option<f64>,
}

impl PhaseState {
    pub fn from_history(history: &[Candle]) -> Self {
        match classify_phase(history) {
            Phase::One => {
                let (key, hit_rate) = select_key(history);
                Self {
                    phase: Phase::One,
                    active_key: Some(key),
                    key_hit_rate: Some(hit_rate),
                }
            }
            Phase::Two => Self {
                phase: Phase::Two,
                active_key: None,
                key_hit_rate: None,
            },
        }
    }
}

/// Empty history defaults to phase 1; a mean open above the split threshold
/// marks a large-magnitude instrument (phase 2).
pub fn classify_phase(history: &[Candle]) -> Phase {
    if history.is_empty() {
        return Phase::One;
    }
    let mean_open = history.iter().map(|c| c.open).sum::<f64>() / history.len() as f64;
    let phase = if mean_open > PHASE_SPLIT_MEAN_OPEN {
        Phase::Two
    } else {
        Phase::One
    };
    debug!(mean_open, phase = phase.as_number(), "classified numeric regime");
    phase
}

/// Backtests every candidate key over the history and keeps the strictly best
/// scorer. Below 10 candles the default key is returned without evaluation.
pub fn select_key(history: &[Candle]) -> (PhaseKey, f64) {
    if history.len() < MIN_CANDLES_FOR_KEY_SEARCH {
        debug!(
            candles = history.len(),
            "insufficient history for key search, using default"
        );
        return (PhaseKey::SumLast3, 0.5);
    }

    let mut best = PhaseKey::SumLast3;
    let mut best_score = 0.0;
    for key in PhaseKey::ALL {
        let score = backtest_key(history, key);
        if score > best_score {
            best_score = score;
            best = key;
        }
    }
    info!(
        key = best.as_str(),
        hit_rate = best_score,
        "selected phase-1 key"
    );
    (best, best_score)
}

/// Hit-rate of color calls made by `key` over consecutive candle pairs. Pairs
/// the key cannot digest are skipped; fewer than 5 usable pairs scores zero.
fn backtest_key(history: &[Candle], key: PhaseKey) -> f64 {
    let mut hits = 0u32;
    let mut total = 0u32;
    for pair in history.windows(2) {
        let (prior, current) = (&pair[0], &pair[1]);
        let Some(value) = key.apply(prior.open) else {
            continue;
        };
        let predicted_green = value > 0.5;
        if predicted_green == current.is_bullish() {
            hits += 1;
        }
        total += 1;
    }
    if total < MIN_USABLE_PAIRS {
        return 0.0;
    }
    f64::from(hits) / f64::from(total)
}
