use serde::Serialize;

/// Realized or predicted candle color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleColor {
    Green,
    Red,
}

impl CandleColor {
    pub fn as_str(self) -> &'static str {
        match self {
            CandleColor::Green => "green",
            CandleColor::Red => "red",
        }
    }
}

/// Trading side implied by a close prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradePosition {
    Long,
    Short,
}

impl TradePosition {
    pub fn as_str(self) -> &'static str {
        match self {
            TradePosition::Long => "long",
            TradePosition::Short => "short",
        }
    }
}

/// Wire-level direction of a predicted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn color(self) -> CandleColor {
        match self {
            Direction::Up => CandleColor::Green,
            Direction::Down => CandleColor::Red,
        }
    }
}

impl From<CandleColor> for Direction {
    fn from(color: CandleColor) -> Self {
        match color {
            CandleColor::Green => Direction::Up,
            CandleColor::Red => Direction::Down,
        }
    }
}
