use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::{
    predict_amplitude, predict_close, AmplitudePrediction, CloseForecast, Confirmation,
    EngineProfile, PredictionLedger,
};
use crate::error::EngineError;
use crate::model::candle::{Candle, PartialCandle};
use crate::model::direction::Direction;
use crate::model::timeframe::Timeframe;

/// One instrument's write-once profile plus its audit ledger.
pub struct InstrumentEngine {
    pub profile: EngineProfile,
    pub ledger: PredictionLedger,
}

/// Registry of per-instrument engine instances. A profile is inserted on the
/// first /predict for an instrument and only read afterwards; /reset is the
/// single operation that removes it.
pub struct EngineRegistry {
    engine_cfg: EngineConfig,
    instances: RwLock<HashMap<String, Arc<InstrumentEngine>>>,
}

impl EngineRegistry {
    pub fn new(engine_cfg: EngineConfig) -> Self {
        Self {
            engine_cfg,
            instances: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, instrument: &str) -> Result<Arc<InstrumentEngine>, ApiError> {
        let guard = self
            .instances
            .read()
            .map_err(|_| ApiError::Internal("instance registry lock poisoned".to_string()))?;
        guard
            .get(instrument)
            .cloned()
            .ok_or_else(|| EngineError::NotInitialized(instrument.to_string()).into())
    }

    fn get_or_init(
        &self,
        instrument: &str,
        history: &[Candle],
    ) -> Result<Arc<InstrumentEngine>, ApiError> {
        if let Ok(existing) = self.get(instrument) {
            return Ok(existing);
        }
        let mut guard = self
            .instances
            .write()
            .map_err(|_| ApiError::Internal("instance registry lock poisoned".to_string()))?;
        let entry = guard.entry(instrument.to_string()).or_insert_with(|| {
            info!(
                instrument,
                candles = history.len(),
                "initializing engine profile"
            );
            Arc::new(InstrumentEngine {
                profile: EngineProfile::from_history(history),
                ledger: PredictionLedger::new(),
            })
        });
        Ok(entry.clone())
    }

    fn remove(&self, instrument: Option<&str>) -> Result<usize, ApiError> {
        let mut guard = self
            .instances
            .write()
            .map_err(|_| ApiError::Internal("instance registry lock poisoned".to_string()))?;
        match instrument {
            Some(key) => Ok(usize::from(guard.remove(key).is_some())),
            None => {
                let cleared = guard.len();
                guard.clear();
                Ok(cleared)
            }
        }
    }

    fn count(&self) -> Result<usize, ApiError> {
        let guard = self
            .instances
            .read()
            .map_err(|_| ApiError::Internal("instance registry lock poisoned".to_string()))?;
        Ok(guard.len())
    }
}

#[derive(Clone)]
pub struct AppState {
    registry: Arc<EngineRegistry>,
}

impl AppState {
    pub fn new(engine_cfg: EngineConfig) -> Self {
        Self {
            registry: Arc::new(EngineRegistry::new(engine_cfg)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Engine(EngineError::Validation { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::UnsupportedTimeframe(_)) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::NotInitialized(_)) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct CandleDto {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDto {
    pub open: Option<f64>,
    pub high_so_far: Option<f64>,
    pub low_so_far: Option<f64>,
    pub elapsed_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub instrument: Option<String>,
    pub timeframe: Option<String>,
    pub history: Option<Vec<CandleDto>>,
    pub partial: Option<PartialDto>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_close: f64,
    pub direction: &'static str,
    pub phase: u8,
    pub strategy: String,
    pub confidence: f64,
    pub entry_trigger: f64,
    pub prediction_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AmplitudeRequest {
    pub instrument: Option<String>,
    /// Defaults to M15 when absent.
    pub timeframe: Option<String>,
    pub open: Option<f64>,
    pub high_so_far: Option<f64>,
    pub low_so_far: Option<f64>,
    pub current_price: Option<f64>,
    pub elapsed_seconds: Option<f64>,
    pub predicted_close: Option<f64>,
    pub predicted_direction: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub instrument: Option<String>,
    pub realized_close: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub confirmed: bool,
    pub result: Option<Confirmation>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub instrument: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub mode: &'static str,
    pub initialized_instruments: usize,
}

#[derive(Debug, Serialize)]
pub struct InstanceResponse {
    pub instrument: String,
    pub initialized: bool,
    pub phase: Option<u8>,
    pub active_key: Option<&'static str>,
    pub key_hit_rate: Option<f64>,
    pub history_len: Option<usize>,
    pub predictions_recorded: usize,
    pub confirmed: u32,
    pub hits: u32,
    pub accuracy_percent: f64,
}

fn require_finite(value: Option<f64>, field: &str) -> Result<f64, EngineError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(EngineError::validation(field)),
    }
}

fn require_instrument(value: Option<String>) -> Result<String, EngineError> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(EngineError::validation("instrument")),
    }
}

fn parse_timeframe(value: Option<&str>) -> Result<Timeframe, EngineError> {
    value.ok_or_else(|| EngineError::validation("timeframe"))?.parse()
}

fn convert_history(dtos: Vec<CandleDto>) -> Result<Vec<Candle>, EngineError> {
    let mut history = Vec::with_capacity(dtos.len());
    for (i, dto) in dtos.into_iter().enumerate() {
        history.push(Candle {
            open: require_finite(dto.open, &format!("history[{i}].open"))?,
            high: require_finite(dto.high, &format!("history[{i}].high"))?,
            low: require_finite(dto.low, &format!("history[{i}].low"))?,
            close: require_finite(dto.close, &format!("history[{i}].close"))?,
            timestamp: dto.timestamp.unwrap_or_default(),
        });
    }
    Ok(history)
}

impl PartialDto {
    fn into_partial(self, timeframe: Timeframe) -> Result<PartialCandle, EngineError> {
        let open = require_finite(self.open, "partial.open")?;
        let high = require_finite(self.high_so_far, "partial.high_so_far")?;
        let low = require_finite(self.low_so_far, "partial.low_so_far")?;
        let elapsed = require_finite(self.elapsed_seconds, "partial.elapsed_seconds")?;
        Ok(PartialCandle::new(
            open,
            high,
            low,
            timeframe.elapsed_fraction(elapsed),
        ))
    }
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok",
        mode: "stateless",
        initialized_instruments: state.registry.count()?,
    }))
}

async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let instrument = require_instrument(req.instrument)?;
    let timeframe = parse_timeframe(req.timeframe.as_deref())?;
    let history = convert_history(req.history.ok_or_else(|| EngineError::validation("history"))?)?;
    let partial = req
        .partial
        .ok_or_else(|| EngineError::validation("partial"))?
        .into_partial(timeframe)?;

    let engine = state.registry.get_or_init(&instrument, &history)?;
    let prediction = predict_close(
        &engine.profile.phase_state,
        &partial,
        state.registry.engine_cfg.entry_offset_points,
    );
    let prediction_id = engine
        .ledger
        .record(&prediction, &partial)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(
        instrument = %instrument,
        timeframe = %timeframe,
        predicted_close = prediction.predicted_close,
        algorithm = %prediction.algorithm,
        "close prediction served"
    );

    Ok(Json(PredictResponse {
        predicted_close: prediction.predicted_close,
        direction: Direction::from(prediction.color).as_str(),
        phase: prediction.phase_used.as_number(),
        strategy: prediction.algorithm,
        confidence: engine.profile.close_confidence(),
        entry_trigger: prediction.entry_trigger,
        prediction_id,
    }))
}

async fn amplitude(
    State(state): State<AppState>,
    Json(req): Json<AmplitudeRequest>,
) -> Result<Json<AmplitudePrediction>, ApiError> {
    let instrument = require_instrument(req.instrument)?;
    let timeframe = match req.timeframe.as_deref() {
        Some(s) => s.parse::<Timeframe>()?,
        None => Timeframe::M15,
    };
    let open = require_finite(req.open, "open")?;
    let high = require_finite(req.high_so_far, "high_so_far")?;
    let low = require_finite(req.low_so_far, "low_so_far")?;
    let current_price = require_finite(req.current_price, "current_price")?;
    let elapsed = require_finite(req.elapsed_seconds, "elapsed_seconds")?;
    let predicted_close = require_finite(req.predicted_close, "predicted_close")?;
    let direction = req
        .predicted_direction
        .as_deref()
        .and_then(Direction::parse)
        .ok_or_else(|| EngineError::validation("predicted_direction"))?;

    let engine = state.registry.get(&instrument)?;
    let partial = PartialCandle::new(open, high, low, timeframe.elapsed_fraction(elapsed));
    let prediction = predict_amplitude(
        &engine.profile.stats,
        &partial,
        current_price,
        CloseForecast {
            predicted_close,
            direction,
        },
    );
    Ok(Json(prediction))
}

async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let instrument = require_instrument(req.instrument)?;
    let realized_close = require_finite(req.realized_close, "realized_close")?;
    let engine = state.registry.get(&instrument)?;
    let result = engine
        .ledger
        .confirm_latest(realized_close)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(ConfirmResponse {
        confirmed: result.is_some(),
        result,
    }))
}

async fn reset(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    let cleared = state.registry.remove(req.instrument.as_deref())?;
    info!(cleared, "engine reset");
    Ok(Json(ResetResponse {
        success: true,
        cleared,
    }))
}

async fn instance(
    State(state): State<AppState>,
    Path(instrument): Path<String>,
) -> Result<Json<InstanceResponse>, ApiError> {
    match state.registry.get(&instrument) {
        Ok(engine) => {
            let stats = engine
                .ledger
                .stats()
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            let recorded = engine
                .ledger
                .len()
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok(Json(InstanceResponse {
                instrument,
                initialized: true,
                phase: Some(engine.profile.phase_state.phase.as_number()),
                active_key: engine.profile.phase_state.active_key.map(|k| k.as_str()),
                key_hit_rate: engine.profile.phase_state.key_hit_rate,
                history_len: Some(engine.profile.history_len),
                predictions_recorded: recorded,
                confirmed: stats.confirmed,
                hits: stats.hits,
                accuracy_percent: stats.accuracy_percent(),
            }))
        }
        Err(ApiError::Engine(EngineError::NotInitialized(_))) => Ok(Json(InstanceResponse {
            instrument,
            initialized: false,
            phase: None,
            active_key: None,
            key_hit_rate: None,
            history_len: None,
            predictions_recorded: 0,
            confirmed: 0,
            hits: 0,
            accuracy_percent: 0.0,
        })),
        Err(other) => Err(other),
    }
}

pub fn router(engine_cfg: EngineConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/amplitude", post(amplitude))
        .route("/confirm", post(confirm))
        .route("/reset", post(reset))
        .route("/instances/{instrument}", get(instance))
        .with_state(AppState::new(engine_cfg))
}

/// Start the prediction HTTP server.
pub async fn serve(bind: String, engine_cfg: EngineConfig) -> anyhow::Result<()> {
    let app = router(engine_cfg);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("prediction server listening on {}", bind);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> PredictRequest {
        let history = (0..12)
            .map(|i| CandleDto {
                open: Some(9_400.0 + i as f64),
                high: Some(9_410.0 + i as f64),
                low: Some(9_395.0 + i as f64),
                close: Some(9_405.0 + i as f64),
                timestamp: Some(i as u64 * 900),
            })
            .collect();
        PredictRequest {
            instrument: Some("R_100".to_string()),
            timeframe: Some("M15".to_string()),
            history: Some(history),
            partial: Some(PartialDto {
                open: Some(9_412.0),
                high_so_far: Some(9_420.0),
                low_so_far: Some(9_408.0),
                elapsed_seconds: Some(450.0),
            }),
        }
    }

    #[test]
    fn predict_initializes_instance_and_repeats_identically() {
        let state = AppState::new(EngineConfig::default());

        let first = tokio_test::block_on(predict(State(state.clone()), Json(sample_request())))
            .expect("first prediction")
            .0;
        let second = tokio_test::block_on(predict(State(state.clone()), Json(sample_request())))
            .expect("second prediction")
            .0;

        assert_eq!(first.predicted_close, second.predicted_close);
        assert_eq!(first.direction, second.direction);
        assert_eq!(first.phase, 2);
        assert_eq!(first.strategy, "fibonacci-amplitude");
        assert!((first.confidence - 0.8485).abs() < 1e-12);
        assert_eq!(state.registry.count().unwrap(), 1);
    }

    #[test]
    fn phase1_confidence_reports_the_key_hit_rate() {
        let state = AppState::new(EngineConfig::default());

        let mut req = sample_request();
        // Small-magnitude opens of 12.5 make first_digit_parity the only
        // green caller, and an all-green history scores it 1.0.
        req.history = Some(
            (0..11)
                .map(|i| CandleDto {
                    open: Some(12.5),
                    high: Some(13.5),
                    low: Some(12.0),
                    close: Some(13.0),
                    timestamp: Some(i as u64 * 900),
                })
                .collect(),
        );

        let resp = tokio_test::block_on(predict(State(state), Json(req)))
            .expect("phase-1 prediction")
            .0;
        assert_eq!(resp.phase, 1);
        assert_eq!(resp.strategy, "phase1-first_digit_parity");
        assert!((resp.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn predict_rejects_missing_timeframe_and_unknown_timeframe() {
        let state = AppState::new(EngineConfig::default());

        let mut req = sample_request();
        req.timeframe = None;
        let err = tokio_test::block_on(predict(State(state.clone()), Json(req)))
            .expect_err("missing timeframe must fail");
        assert!(matches!(
            err,
            ApiError::Engine(EngineError::Validation { .. })
        ));

        let mut req = sample_request();
        req.timeframe = Some("M5".to_string());
        let err = tokio_test::block_on(predict(State(state), Json(req)))
            .expect_err("unsupported timeframe must fail");
        assert!(matches!(
            err,
            ApiError::Engine(EngineError::UnsupportedTimeframe(_))
        ));
    }

    #[test]
    fn amplitude_requires_initialized_instrument() {
        let state = AppState::new(EngineConfig::default());
        let req = AmplitudeRequest {
            instrument: Some("R_100".to_string()),
            timeframe: None,
            open: Some(9_412.0),
            high_so_far: Some(9_420.0),
            low_so_far: Some(9_408.0),
            current_price: Some(9_415.0),
            elapsed_seconds: Some(450.0),
            predicted_close: Some(9_418.0),
            predicted_direction: Some("up".to_string()),
        };
        let err = tokio_test::block_on(amplitude(State(state), Json(req)))
            .expect_err("uninitialized instrument must fail");
        assert!(matches!(
            err,
            ApiError::Engine(EngineError::NotInitialized(_))
        ));
    }

    #[test]
    fn reset_clears_instances() {
        let state = AppState::new(EngineConfig::default());
        tokio_test::block_on(predict(State(state.clone()), Json(sample_request())))
            .expect("prediction");
        assert_eq!(state.registry.count().unwrap(), 1);

        let resp = tokio_test::block_on(reset(
            State(state.clone()),
            Json(ResetRequest { instrument: None }),
        ))
        .expect("reset")
        .0;
        assert!(resp.success);
        assert_eq!(resp.cleared, 1);
        assert_eq!(state.registry.count().unwrap(), 0);
    }
}
