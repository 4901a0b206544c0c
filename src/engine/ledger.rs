use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::close::ClosePrediction;
use crate::model::candle::PartialCandle;
use crate::model::direction::CandleColor;

/// One recorded close prediction together with the partial inputs it used.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub predicted_close: f64,
    pub color: CandleColor,
    pub open_used: f64,
    pub high_used: f64,
    pub low_used: f64,
    pub algorithm: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LedgerStats {
    pub confirmed: u32,
    pub hits: u32,
}

impl LedgerStats {
    pub fn accuracy_percent(&self) -> f64 {
        if self.confirmed == 0 {
            0.0
        } else {
            (f64::from(self.hits) / f64::from(self.confirmed)) * 100.0
        }
    }
}

/// Outcome of checking the most recent prediction against a realized close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confirmation {
    pub prediction_id: Uuid,
    pub realized_close: f64,
    pub predicted_close: f64,
    pub absolute_error: f64,
    pub percent_error: f64,
    pub realized_color: CandleColor,
    pub predicted_color: CandleColor,
    pub color_hit: bool,
    pub accuracy_percent: f64,
}

#[derive(Debug, Default)]
struct LedgerInner {
    entries: Vec<LedgerEntry>,
    stats: LedgerStats,
}

/// Append-only record of past predictions plus running accuracy counters.
/// Audit-only: nothing on the prediction path reads it.
#[derive(Debug, Default)]
pub struct PredictionLedger {
    inner: Mutex<LedgerInner>,
}

impl PredictionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, prediction: &ClosePrediction, partial: &PartialCandle) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let entry = LedgerEntry {
            id,
            predicted_close: prediction.predicted_close,
            color: prediction.color,
            open_used: partial.open,
            high_used: partial.high_so_far,
            low_used: partial.low_so_far,
            algorithm: prediction.algorithm.clone(),
            recorded_at: Utc::now(),
        };
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("prediction ledger lock poisoned"))?;
        guard.entries.push(entry);
        Ok(id)
    }

    /// Confirms the most recently recorded prediction against the realized
    /// close. Interleaved instruments must hold one ledger each, since the
    /// most-recent coupling cannot name a specific prediction.
    pub fn confirm_latest(&self, realized_close: f64) -> Result<Option<Confirmation>> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("prediction ledger lock poisoned"))?;
        let Some(entry) = guard.entries.last().cloned() else {
            return Ok(None);
        };

        let absolute_error = (realized_close - entry.predicted_close).abs();
        let percent_error = if realized_close != 0.0 {
            (absolute_error / realized_close.abs()) * 100.0
        } else {
            0.0
        };
        let realized_color = if realized_close > entry.open_used {
            CandleColor::Green
        } else {
            CandleColor::Red
        };
        let color_hit = realized_color == entry.color;

        guard.stats.confirmed = guard.stats.confirmed.saturating_add(1);
        if color_hit {
            guard.stats.hits = guard.stats.hits.saturating_add(1);
        }

        Ok(Some(Confirmation {
            prediction_id: entry.id,
            realized_close,
            predicted_close: entry.predicted_close,
            absolute_error,
            percent_error,
            realized_color,
            predicted_color: entry.color,
            color_hit,
            accuracy_percent: guard.stats.accuracy_percent(),
        }))
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("prediction ledger lock poisoned"))?;
        Ok(guard.stats)
    }

    pub fn len(&self) -> Result<usize> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("prediction ledger lock poisoned"))?;
        Ok(guard.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("prediction ledger lock poisoned"))?;
        guard.entries.clear();
        guard.stats = LedgerStats::default();
        Ok(())
    }
}
