use intrabar_engine::engine::close::predict_close;
use intrabar_engine::engine::ledger::PredictionLedger;
use intrabar_engine::engine::phase::{Phase, PhaseState};
use intrabar_engine::model::candle::PartialCandle;
use intrabar_engine::model::direction::CandleColor;

fn phase2_state() -> PhaseState {
    PhaseState {
        phase: Phase::Two,
        active_key: None,
        key_hit_rate: None,
    }
}

fn approx(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "expected {b}, got {a}");
}

#[test]
fn confirm_compares_against_the_recorded_open() {
    let ledger = PredictionLedger::new();
    let partial = PartialCandle::new(10.0, 20.0, 0.0, 0.5);
    // Green prediction at 16.18.
    let prediction = predict_close(&phase2_state(), &partial, 16.0);
    ledger.record(&prediction, &partial).unwrap();

    let confirmation = ledger
        .confirm_latest(17.0)
        .unwrap()
        .expect("one entry recorded");

    approx(confirmation.realized_close, 17.0);
    approx(confirmation.absolute_error, 17.0 - 16.18);
    approx(confirmation.percent_error, (17.0 - 16.18) / 17.0 * 100.0);
    assert_eq!(confirmation.realized_color, CandleColor::Green);
    assert_eq!(confirmation.predicted_color, CandleColor::Green);
    assert!(confirmation.color_hit);
    approx(confirmation.accuracy_percent, 100.0);
}

#[test]
fn running_accuracy_tracks_hits_and_misses() {
    let ledger = PredictionLedger::new();
    let partial = PartialCandle::new(10.0, 20.0, 0.0, 0.5);
    let prediction = predict_close(&phase2_state(), &partial, 16.0);
    ledger.record(&prediction, &partial).unwrap();

    // Realized above the open: green, hit.
    let first = ledger.confirm_latest(18.0).unwrap().unwrap();
    assert!(first.color_hit);
    approx(first.accuracy_percent, 100.0);

    // Realized below the open: red, miss against the same latest entry.
    let second = ledger.confirm_latest(9.0).unwrap().unwrap();
    assert!(!second.color_hit);
    assert_eq!(second.realized_color, CandleColor::Red);
    approx(second.accuracy_percent, 50.0);

    let stats = ledger.stats().unwrap();
    assert_eq!(stats.confirmed, 2);
    assert_eq!(stats.hits, 1);
}

#[test]
fn confirm_without_predictions_is_none() {
    let ledger = PredictionLedger::new();
    assert!(ledger.confirm_latest(10.0).unwrap().is_none());
}

#[test]
fn entries_accumulate_with_distinct_ids() {
    let ledger = PredictionLedger::new();
    let partial = PartialCandle::new(10.0, 20.0, 0.0, 0.5);
    let prediction = predict_close(&phase2_state(), &partial, 16.0);

    let a = ledger.record(&prediction, &partial).unwrap();
    let b = ledger.record(&prediction, &partial).unwrap();
    assert_ne!(a, b);
    assert_eq!(ledger.len().unwrap(), 2);
    assert!(!ledger.is_empty().unwrap());
}

#[test]
fn clear_returns_to_the_pre_initialization_state() {
    let ledger = PredictionLedger::new();
    let partial = PartialCandle::new(10.0, 20.0, 0.0, 0.5);
    let prediction = predict_close(&phase2_state(), &partial, 16.0);
    ledger.record(&prediction, &partial).unwrap();
    ledger.confirm_latest(18.0).unwrap();

    ledger.clear().unwrap();
    assert!(ledger.is_empty().unwrap());
    let stats = ledger.stats().unwrap();
    assert_eq!(stats.confirmed, 0);
    assert_eq!(stats.hits, 0);
    approx(stats.accuracy_percent(), 0.0);
}
