use crate::model::candle::Candle;

/// Percentile ranks tabulated for every historical amplitude sample.
pub const AMPLITUDE_PERCENTILES: [u32; 6] = [10, 25, 50, 75, 90, 95];

/// Summary statistics over the high-low amplitudes of a historical dataset.
/// Computed once per dataset; zero amplitudes are excluded from the sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AmplitudeStatistics {
    pub mean: f64,
    pub stdev: f64,
    /// (rank, amplitude) pairs in ascending rank order. Empty when the
    /// historical sample had no non-zero amplitudes.
    pub percentiles: Vec<(u32, f64)>,
}

impl AmplitudeStatistics {
    pub fn from_history(history: &[Candle]) -> Self {
        let amplitudes: Vec<f64> = history
            .iter()
            .map(Candle::amplitude)
            .filter(|a| *a > 0.0)
            .collect();
        if amplitudes.is_empty() {
            return Self::default();
        }

        let mean = amplitudes.iter().sum::<f64>() / amplitudes.len() as f64;
        let stdev = if amplitudes.len() > 1 {
            let variance = amplitudes.iter().map(|a| (a - mean) * (a - mean)).sum::<f64>()
                / (amplitudes.len() - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        let mut sorted = amplitudes;
        sorted.sort_by(f64::total_cmp);
        let percentiles = AMPLITUDE_PERCENTILES
            .iter()
            .map(|&rank| (rank, interpolated_percentile(&sorted, rank)))
            .collect();

        Self {
            mean,
            stdev,
            percentiles,
        }
    }

    /// Highest tabulated rank whose amplitude does not exceed `amplitude`.
    /// Falls through to 10 when nothing matches or the table is empty.
    pub fn percentile_position(&self, amplitude: f64) -> u32 {
        for &(rank, value) in self.percentiles.iter().rev() {
            if amplitude >= value {
                return rank;
            }
        }
        10
    }
}

/// Linear interpolation between order statistics. `sorted` must be ascending
/// and non-empty.
fn interpolated_percentile(sorted: &[f64], rank: u32) -> f64 {
    let index = (rank as f64 / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    sorted[lower] * (upper as f64 - index) + sorted[upper] * (index - lower as f64)
}
