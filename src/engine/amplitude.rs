use serde::Serialize;
use tracing::warn;

use crate::model::candle::PartialCandle;
use crate::model::direction::{CandleColor, Direction};
use crate::stats::AmplitudeStatistics;

/// Smallest amplitude used for ratio math when the partial range is
/// degenerate (high == low).
const MIN_AMPLITUDE: f64 = 0.01;

/// Blend weights for the time-extrapolation, mean-reversion and
/// prediction-implied amplitude estimates.
const ESTIMATE_WEIGHTS: [f64; 3] = [0.3, 0.3, 0.4];

/// Elapsed fraction past which the high-confidence entry gate opens.
const LATE_ENTRY_FRACTION: f64 = 0.833;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricePositionLabel {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementExpectation {
    Pullback,
    GainStrength,
    Consolidate,
    ReverseColor,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStrategy {
    HighConfidence,
    Defense,
    Wait,
    Hedge,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StakeTier {
    High,
    Normal,
    Low,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Strategic guidance derived from the amplitude outlook. Stake tier and
/// risk level are fixed per matched rule, not computed from a risk model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub movement_expectation: MovementExpectation,
    pub movement_confidence: f64,
    pub will_pullback: bool,
    pub will_gain_strength: bool,
    pub will_consolidate: bool,
    pub will_reverse_color: bool,
    pub entry_strategy: EntryStrategy,
    pub entry_reason: &'static str,
    pub confidence_modifier: i32,
    pub suggested_stake_tier: StakeTier,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmplitudePrediction {
    pub predicted_amplitude: f64,
    pub current_amplitude: f64,
    /// [40, 95]; grows linearly with elapsed time.
    pub confidence: f64,
    pub expansion_probability: f64,
    pub will_expand: bool,
    pub growth_potential: f64,
    pub price_position: f64,
    pub price_position_label: PricePositionLabel,
    pub predicted_price_position: f64,
    pub percentile_position: u32,
    pub recommendation: Recommendation,
}

/// The close-prediction side's output for the same observation moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseForecast {
    pub predicted_close: f64,
    pub direction: Direction,
}

/// Predicted final amplitude plus strategic recommendation. Pure function of
/// its arguments; the statistics are read-only shared state.
pub fn predict_amplitude(
    stats: &AmplitudeStatistics,
    partial: &PartialCandle,
    current_price: f64,
    forecast: CloseForecast,
) -> AmplitudePrediction {
    let raw_amplitude = partial.amplitude();
    let degenerate = raw_amplitude <= 0.0;
    let current_amplitude = if degenerate { MIN_AMPLITUDE } else { raw_amplitude };

    let time_estimate = current_amplitude * growth_factor(partial.elapsed_fraction);
    let mean_estimate = mean_reversion_estimate(stats.mean, current_amplitude, time_estimate);
    let close_estimate =
        prediction_implied_estimate(partial, forecast.predicted_close, current_amplitude);

    let mut predicted_amplitude = ESTIMATE_WEIGHTS[0] * time_estimate
        + ESTIMATE_WEIGHTS[1] * mean_estimate
        + ESTIMATE_WEIGHTS[2] * close_estimate;
    if !predicted_amplitude.is_finite() {
        warn!(
            time_estimate,
            mean_estimate, close_estimate, "non-finite amplitude blend, holding current amplitude"
        );
        predicted_amplitude = current_amplitude;
    }

    let confidence = (40.0 + partial.elapsed_fraction * 60.0).min(95.0);

    let price_position = position_in_range(current_price, partial, current_amplitude, degenerate);
    let predicted_price_position =
        position_in_range(forecast.predicted_close, partial, current_amplitude, degenerate);

    let breakout = forecast.predicted_close > partial.high_so_far
        || forecast.predicted_close < partial.low_so_far;
    let expansion_probability = expansion_probability(
        current_amplitude,
        predicted_amplitude,
        partial.elapsed_fraction,
        price_position,
        breakout,
    );

    let price_position_label = if price_position > 0.7 {
        PricePositionLabel::Top
    } else if price_position < 0.3 {
        PricePositionLabel::Bottom
    } else {
        PricePositionLabel::Middle
    };

    let recommendation = recommend(
        partial,
        current_price,
        forecast,
        current_amplitude,
        expansion_probability,
        price_position,
        predicted_price_position,
    );

    AmplitudePrediction {
        predicted_amplitude,
        current_amplitude,
        confidence,
        expansion_probability,
        will_expand: expansion_probability > 0.6,
        growth_potential: (predicted_amplitude - current_amplitude) / current_amplitude,
        price_position,
        price_position_label,
        predicted_price_position,
        percentile_position: stats.percentile_position(predicted_amplitude),
        recommendation,
    }
}

/// Remaining-time multiplier for the current amplitude.
fn growth_factor(elapsed_fraction: f64) -> f64 {
    if elapsed_fraction < 0.33 {
        1.8
    } else if elapsed_fraction < 0.67 {
        1.4
    } else if elapsed_fraction < 0.83 {
        1.2
    } else {
        1.15
    }
}

/// Pull toward the historical mean amplitude, damped at both extremes.
fn mean_reversion_estimate(mean: f64, current_amplitude: f64, time_estimate: f64) -> f64 {
    if mean <= 0.0 {
        return time_estimate;
    }
    let ratio = current_amplitude / mean;
    if ratio > 1.5 {
        current_amplitude * 1.05
    } else if ratio < 0.5 {
        mean * 0.8
    } else {
        mean
    }
}

/// Amplitude implied by where the predicted close falls relative to the
/// current range.
fn prediction_implied_estimate(
    partial: &PartialCandle,
    predicted_close: f64,
    current_amplitude: f64,
) -> f64 {
    if predicted_close > partial.high_so_far {
        (predicted_close - partial.low_so_far) * 1.1
    } else if predicted_close < partial.low_so_far {
        (partial.high_so_far - predicted_close) * 1.1
    } else {
        current_amplitude * 1.05
    }
}

/// Position of `price` within the partial range, 0 at the low and 1 at the
/// high; 0.5 when the range is degenerate.
fn position_in_range(
    price: f64,
    partial: &PartialCandle,
    current_amplitude: f64,
    degenerate: bool,
) -> f64 {
    if degenerate {
        0.5
    } else {
        (price - partial.low_so_far) / current_amplitude
    }
}

/// Weighted blend of four expansion drivers, each clamped to [0, 1] before
/// weighting, result clamped to [0, 1].
fn expansion_probability(
    current_amplitude: f64,
    predicted_amplitude: f64,
    elapsed_fraction: f64,
    price_position: f64,
    breakout: bool,
) -> f64 {
    let growth = ((predicted_amplitude - current_amplitude) / current_amplitude).clamp(0.0, 1.0);
    let symmetry = (1.0 - (price_position - 0.5).abs() * 2.0).clamp(0.0, 1.0);
    let time = if elapsed_fraction > 0.83 {
        0.85
    } else if elapsed_fraction > 0.67 {
        0.65
    } else {
        0.45
    };
    let prediction = if breakout { 0.9 } else { 0.5 };

    (growth * 0.25 + symmetry * 0.20 + time * 0.30 + prediction * 0.25).clamp(0.0, 1.0)
}

#[allow(clippy::too_many_arguments)]
fn recommend(
    partial: &PartialCandle,
    current_price: f64,
    forecast: CloseForecast,
    current_amplitude: f64,
    expansion_probability: f64,
    price_position: f64,
    predicted_price_position: f64,
) -> Recommendation {
    let distance_ratio = (forecast.predicted_close - current_price).abs() / current_amplitude;

    let will_pullback = (price_position > 0.75 && predicted_price_position < 0.6)
        || (price_position < 0.25 && predicted_price_position > 0.4);
    let will_gain_strength = expansion_probability > 0.7 && distance_ratio > 0.3;
    let will_consolidate = expansion_probability < 0.4 && distance_ratio < 0.2;

    let current_color = if current_price > partial.midpoint() {
        CandleColor::Green
    } else {
        CandleColor::Red
    };
    let will_reverse_color =
        current_color != forecast.direction.color() && expansion_probability > 0.6;

    // First match wins; later rules are only reached when earlier ones miss.
    let (movement_expectation, movement_confidence) = if will_pullback {
        (MovementExpectation::Pullback, 0.75)
    } else if will_gain_strength {
        (MovementExpectation::GainStrength, 0.80)
    } else if will_consolidate {
        (MovementExpectation::Consolidate, 0.70)
    } else if will_reverse_color {
        (MovementExpectation::ReverseColor, 0.65)
    } else {
        (MovementExpectation::Neutral, 0.50)
    };

    let (entry_strategy, entry_reason, confidence_modifier, suggested_stake_tier, risk_level) =
        select_entry_strategy(
            movement_expectation,
            movement_confidence,
            expansion_probability,
            partial.elapsed_fraction,
        );

    Recommendation {
        movement_expectation,
        movement_confidence,
        will_pullback,
        will_gain_strength,
        will_consolidate,
        will_reverse_color,
        entry_strategy,
        entry_reason,
        confidence_modifier,
        suggested_stake_tier,
        risk_level,
    }
}

/// Ordered guard chain; evaluation order is part of the contract.
fn select_entry_strategy(
    expectation: MovementExpectation,
    movement_confidence: f64,
    expansion_probability: f64,
    elapsed_fraction: f64,
) -> (EntryStrategy, &'static str, i32, StakeTier, RiskLevel) {
    if expectation == MovementExpectation::GainStrength
        && expansion_probability > 0.75
        && movement_confidence > 0.75
        && elapsed_fraction > LATE_ENTRY_FRACTION
    {
        return (
            EntryStrategy::HighConfidence,
            "strong continuation expected in the final stretch",
            25,
            StakeTier::High,
            RiskLevel::Medium,
        );
    }
    if matches!(
        expectation,
        MovementExpectation::Pullback | MovementExpectation::ReverseColor
    ) {
        return (
            EntryStrategy::Defense,
            "pullback or color reversal expected, defensive entry",
            -20,
            StakeTier::Low,
            RiskLevel::High,
        );
    }
    if expectation == MovementExpectation::Consolidate {
        return (
            EntryStrategy::Wait,
            "range is likely to consolidate, stay flat",
            -30,
            StakeTier::None,
            RiskLevel::High,
        );
    }
    if expansion_probability > 0.5 && expansion_probability < 0.75 {
        return (
            EntryStrategy::Hedge,
            "moderate expansion odds, hedge the entry",
            0,
            StakeTier::Normal,
            RiskLevel::Medium,
        );
    }
    (
        EntryStrategy::Neutral,
        "no clear edge, follow the base prediction",
        0,
        StakeTier::Normal,
        RiskLevel::Medium,
    )
}
