use serde::{Deserialize, Serialize};

use crate::{
    domain::{AnalysisResult, SubmissionId},
    error::AnalysisError,
};

/// The one-and-only state of an analysis request. Busy, failed and ready are
/// mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "payload", rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Idle,
    Loading,
    Error(AnalysisError),
    Ready(AnalysisResult),
}

impl LifecycleState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// `Error` and `Ready` both count; they only end with a fresh submission.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Ready(_))
    }

    pub fn error(&self) -> Option<AnalysisError> {
        match self {
            Self::Error(err) => Some(*err),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Ready(result) => Some(result),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Error(_) => "error",
            Self::Ready(_) => "ready",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum LifecycleEvent {
    StateChanged {
        submission: SubmissionId,
        state: LifecycleState,
    },
    /// A submit arrived while another submission was loading and was dropped.
    SubmitIgnored { active: SubmissionId },
    /// An in-flight submission was cancelled in favour of a newer one.
    Superseded {
        previous: SubmissionId,
        current: SubmissionId,
    },
}
