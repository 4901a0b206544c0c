use intrabar_engine::engine::amplitude::{predict_amplitude, CloseForecast};
use intrabar_engine::engine::close::{predict_close, DEFAULT_ENTRY_OFFSET_POINTS};
use intrabar_engine::engine::EngineProfile;
use intrabar_engine::model::candle::{Candle, PartialCandle};
use intrabar_engine::model::direction::Direction;

fn history(base_open: f64) -> Vec<Candle> {
    (0..20)
        .map(|i| {
            let drift = (i % 4) as f64 * 0.25;
            Candle {
                open: base_open + drift,
                high: base_open + drift + 2.0,
                low: base_open + drift - 1.5,
                close: base_open + drift + if i % 2 == 0 { 1.0 } else { -0.5 },
                timestamp: i * 900,
            }
        })
        .collect()
}

#[test]
fn profile_construction_is_reproducible() {
    let candles = history(9_400.0);
    let first = EngineProfile::from_history(&candles);
    let second = EngineProfile::from_history(&candles);
    assert_eq!(first, second);
}

#[test]
fn repeated_close_predictions_are_identical() {
    let profile = EngineProfile::from_history(&history(9_400.0));
    let partial = PartialCandle::new(9_401.0, 9_404.0, 9_399.5, 0.6);

    let baseline = predict_close(&profile.phase_state, &partial, DEFAULT_ENTRY_OFFSET_POINTS);
    for _ in 0..10 {
        let next = predict_close(&profile.phase_state, &partial, DEFAULT_ENTRY_OFFSET_POINTS);
        assert_eq!(baseline, next);
    }
}

#[test]
fn repeated_amplitude_predictions_are_identical() {
    let profile = EngineProfile::from_history(&history(9_400.0));
    let partial = PartialCandle::new(9_401.0, 9_404.0, 9_399.5, 0.6);
    let forecast = CloseForecast {
        predicted_close: 9_403.2,
        direction: Direction::Up,
    };

    let baseline = predict_amplitude(&profile.stats, &partial, 9_402.0, forecast);
    for _ in 0..10 {
        let next = predict_amplitude(&profile.stats, &partial, 9_402.0, forecast);
        assert_eq!(baseline, next);
    }
}

#[test]
fn instruments_never_contaminate_each_other() {
    // Two logical instances with very different regimes.
    let small = EngineProfile::from_history(&history(0.9));
    let large = EngineProfile::from_history(&history(9_400.0));

    let small_partial = PartialCandle::new(0.9, 1.1, 0.8, 0.4);
    let large_partial = PartialCandle::new(9_401.0, 9_404.0, 9_399.5, 0.4);

    let small_before = predict_close(&small.phase_state, &small_partial, 16.0);
    let large_before = predict_close(&large.phase_state, &large_partial, 16.0);

    // Interleave a burst of calls against the other instance.
    for _ in 0..25 {
        let _ = predict_close(&large.phase_state, &large_partial, 16.0);
        let _ = predict_amplitude(
            &large.stats,
            &large_partial,
            9_402.0,
            CloseForecast {
                predicted_close: 9_403.2,
                direction: Direction::Up,
            },
        );
    }

    let small_after = predict_close(&small.phase_state, &small_partial, 16.0);
    let large_after = predict_close(&large.phase_state, &large_partial, 16.0);

    assert_eq!(small_before, small_after);
    assert_eq!(large_before, large_after);
}
