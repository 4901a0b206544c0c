use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("missing or malformed field: {field}")]
    Validation { field: String },

    #[error("unsupported timeframe '{0}': expected M15 or M30")]
    UnsupportedTimeframe(String),

    #[error("instrument '{0}' has no initialized engine profile")]
    NotInitialized(String),
}

impl EngineError {
    pub fn validation(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
        }
    }
}
