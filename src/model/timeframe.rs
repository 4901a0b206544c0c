use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    M15,
    M30,
}

impl Timeframe {
    pub fn duration_secs(self) -> u64 {
        match self {
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
        }
    }

    /// Fraction of the interval already elapsed, clamped to [0, 1].
    pub fn elapsed_fraction(self, elapsed_seconds: f64) -> f64 {
        (elapsed_seconds / self.duration_secs() as f64).clamp(0.0, 1.0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            other => Err(EngineError::UnsupportedTimeframe(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_timeframes() {
        assert_eq!("M15".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert_eq!("M30".parse::<Timeframe>().unwrap(), Timeframe::M30);
        assert!("M5".parse::<Timeframe>().is_err());
        assert!("m15".parse::<Timeframe>().is_err());
    }

    #[test]
    fn elapsed_fraction_is_clamped() {
        let tf = Timeframe::M15;
        assert!((tf.elapsed_fraction(450.0) - 0.5).abs() < f64::EPSILON);
        assert!((tf.elapsed_fraction(1_200.0) - 1.0).abs() < f64::EPSILON);
        assert!(tf.elapsed_fraction(-10.0).abs() < f64::EPSILON);
        assert!((Timeframe::M30.elapsed_fraction(900.0) - 0.5).abs() < f64::EPSILON);
    }
}
