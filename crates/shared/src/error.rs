use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const INVALID_URL_MESSAGE: &str = "Please enter a valid URL starting with http:// or https://";
pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to analyze website. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    AnalysisFailed,
}

/// User-facing failure of a single submission. The message is fixed per kind;
/// underlying causes are logged by the controller and never carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisError {
    #[error("{}", INVALID_URL_MESSAGE)]
    InvalidUrl,
    #[error("{}", ANALYSIS_FAILED_MESSAGE)]
    AnalysisFailed,
}

impl AnalysisError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidUrl => ErrorCode::Validation,
            Self::AnalysisFailed => ErrorCode::AnalysisFailed,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidUrl => INVALID_URL_MESSAGE,
            Self::AnalysisFailed => ANALYSIS_FAILED_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<AnalysisError> for ErrorBody {
    fn from(value: AnalysisError) -> Self {
        Self::new(value.code(), value.message())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("review rating {0} is outside 1..=5")]
    RatingOutOfRange(u8),
    #[error("average rating {0} is outside 0..=5")]
    AverageRatingOutOfRange(f32),
}
