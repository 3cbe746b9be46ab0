//! Error taxonomy shared by every pipeline stage.
//!
//! - `Configuration`: detected at construction or first use, aborts the run.
//! - `Data`: a single frame or sample is unusable; callers may continue.
//! - `Sequence`: an operation was invoked out of order.

use court_models::ZoneError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UmpireError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("data error: {0}")]
    Data(String),
    #[error("sequence error: {0}")]
    Sequence(String),
}

impl UmpireError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn sequence(msg: impl Into<String>) -> Self {
        Self::Sequence(msg.into())
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }
}

impl From<ZoneError> for UmpireError {
    fn from(e: ZoneError) -> Self {
        Self::Configuration(e.to_string())
    }
}

impl From<serde_json::Error> for UmpireError {
    fn from(e: serde_json::Error) -> Self {
        Self::Configuration(format!("invalid configuration: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, UmpireError>;
