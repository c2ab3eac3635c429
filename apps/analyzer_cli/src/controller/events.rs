//! Backend-to-front-end events and error modeling.

use shared::{
    domain::{AnalysisResult, SubmissionId},
    error::AnalysisError,
    lifecycle::{LifecycleEvent, LifecycleState},
};

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Info(String),
    Loading {
        submission: SubmissionId,
    },
    Ready {
        submission: SubmissionId,
        result: Box<AnalysisResult>,
    },
    Error(UiError),
}

impl UiEvent {
    /// `Idle` is never re-entered after startup, so it maps to nothing.
    pub fn from_lifecycle(event: LifecycleEvent) -> Option<Self> {
        match event {
            LifecycleEvent::StateChanged { submission, state } => match state {
                LifecycleState::Idle => None,
                LifecycleState::Loading => Some(Self::Loading { submission }),
                LifecycleState::Ready(result) => Some(Self::Ready {
                    submission,
                    result: Box::new(result),
                }),
                LifecycleState::Error(error) => {
                    Some(Self::Error(UiError::from_analysis_error(submission, error)))
                }
            },
            LifecycleEvent::SubmitIgnored { active } => Some(Self::Info(format!(
                "Analysis #{active} is still running; wait for it to finish before submitting again."
            ))),
            LifecycleEvent::Superseded { previous, current } => Some(Self::Info(format!(
                "Analysis #{previous} cancelled in favour of #{current}."
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Validation,
    Analysis,
    Backend,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Submit,
    General,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    submission: Option<SubmissionId>,
    message: String,
}

impl UiError {
    pub fn from_analysis_error(submission: SubmissionId, error: AnalysisError) -> Self {
        let category = match error {
            AnalysisError::InvalidUrl => UiErrorCategory::Validation,
            AnalysisError::AnalysisFailed => UiErrorCategory::Analysis,
        };
        Self {
            category,
            context: UiErrorContext::Submit,
            submission: Some(submission),
            message: error.message().to_string(),
        }
    }

    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("startup failure")
            || lower.contains("runtime")
            || lower.contains("disconnected")
        {
            UiErrorCategory::Backend
        } else if lower.contains("valid url") || lower.contains("invalid") {
            UiErrorCategory::Validation
        } else if lower.contains("analyze") || lower.contains("analysis") {
            UiErrorCategory::Analysis
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            submission: None,
            message,
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn submission(&self) -> Option<SubmissionId> {
        self.submission
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
