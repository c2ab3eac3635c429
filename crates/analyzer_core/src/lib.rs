use std::{
    panic::AssertUnwindSafe,
    str::FromStr,
    sync::{Arc, Weak},
    time::Duration,
};

use anyhow::anyhow;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{AnalysisRequest, AnalysisResult, SubmissionId},
    error::AnalysisError,
    lifecycle::{LifecycleEvent, LifecycleState},
};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

mod provider;
pub use provider::{
    sample_result, AnalysisProvider, MockAnalysisProvider, UnavailableAnalysisProvider,
    DEFAULT_SIMULATED_DELAY, SAMPLE_ANALYSIS_JSON,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What `submit()` does when a previous submission is still loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// Keep the in-flight submission and drop the new one.
    #[default]
    Reject,
    /// Abort the in-flight submission and start the new one.
    Supersede,
}

impl FromStr for SubmitPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "supersede" => Ok(Self::Supersede),
            other => Err(anyhow!(
                "unknown submit policy '{other}' (expected 'reject' or 'supersede')"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    pub submit_policy: SubmitPolicy,
    /// Upper bound on a single provider call; `None` waits indefinitely.
    pub analysis_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Validation failed; the state is already `Error` and no provider call was made.
    Rejected {
        submission: SubmissionId,
        error: AnalysisError,
    },
    /// The state is `Loading` and the provider call is running.
    Started { submission: SubmissionId },
    /// Another submission is loading and the policy is [`SubmitPolicy::Reject`].
    Ignored { active: SubmissionId },
}

impl SubmitOutcome {
    pub fn submission(&self) -> Option<SubmissionId> {
        match self {
            Self::Rejected { submission, .. } | Self::Started { submission } => Some(*submission),
            Self::Ignored { .. } => None,
        }
    }
}

struct ActiveSubmission {
    id: SubmissionId,
    task: JoinHandle<()>,
}

struct ControllerState {
    url: String,
    last_submission: SubmissionId,
    active: Option<ActiveSubmission>,
}

/// Owns the URL input and the lifecycle state of analysis requests.
///
/// Every state change goes through [`AnalysisController::transition`], which
/// updates the watch channel and broadcasts a [`LifecycleEvent`] while the
/// inner lock is held, so observers see transitions in submission order.
pub struct AnalysisController {
    provider: Arc<dyn AnalysisProvider>,
    config: ControllerConfig,
    inner: Mutex<ControllerState>,
    state: watch::Sender<LifecycleState>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl AnalysisController {
    pub fn new(provider: Arc<dyn AnalysisProvider>) -> Arc<Self> {
        Self::new_with_config(provider, ControllerConfig::default())
    }

    pub fn new_with_config(
        provider: Arc<dyn AnalysisProvider>,
        config: ControllerConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(LifecycleState::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            provider,
            config,
            inner: Mutex::new(ControllerState {
                url: String::new(),
                last_submission: SubmissionId(0),
                active: None,
            }),
            state,
            events,
        })
    }

    /// Stores the input verbatim. Validation happens on submit.
    pub async fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        debug!(url = %url, "url input updated");
        self.inner.lock().await.url = url;
    }

    pub async fn url(&self) -> String {
        self.inner.lock().await.url.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub async fn submit(self: &Arc<Self>) -> SubmitOutcome {
        let mut inner = self.inner.lock().await;

        if let Some(active) = inner.active.as_ref() {
            if self.config.submit_policy == SubmitPolicy::Reject {
                debug!(active = %active.id, "submit ignored while a submission is loading");
                let _ = self
                    .events
                    .send(LifecycleEvent::SubmitIgnored { active: active.id });
                return SubmitOutcome::Ignored { active: active.id };
            }
        }

        let submission = inner.last_submission.next();
        inner.last_submission = submission;

        if let Some(previous) = inner.active.take() {
            previous.task.abort();
            info!(previous = %previous.id, current = %submission, "superseded in-flight submission");
            let _ = self.events.send(LifecycleEvent::Superseded {
                previous: previous.id,
                current: submission,
            });
        }

        let request = AnalysisRequest::new(inner.url.clone());
        if let Err(error) = request.validate() {
            info!(submission = %submission, url = %request.url, "rejected url input");
            self.transition(submission, LifecycleState::Error(error));
            return SubmitOutcome::Rejected { submission, error };
        }

        info!(submission = %submission, url = %request.url, "starting website analysis");
        self.transition(submission, LifecycleState::Loading);

        let controller = Arc::downgrade(self);
        let provider = Arc::clone(&self.provider);
        let timeout = self.config.analysis_timeout;
        let task = tokio::spawn(async move {
            let outcome = run_provider(provider.as_ref(), &request, timeout, submission).await;
            resolve_submission(controller, submission, outcome).await;
        });
        inner.active = Some(ActiveSubmission {
            id: submission,
            task,
        });

        SubmitOutcome::Started { submission }
    }

    /// Replaces the URL and submits it in one step.
    pub async fn submit_url(self: &Arc<Self>, url: impl Into<String>) -> SubmitOutcome {
        self.set_url(url).await;
        self.submit().await
    }

    /// Waits until the state is anything other than `Loading`. Returns `Idle`
    /// right away when nothing was ever submitted.
    pub async fn settled(&self) -> LifecycleState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    async fn resolve(&self, submission: SubmissionId, outcome: Result<AnalysisResult, AnalysisError>) {
        let mut inner = self.inner.lock().await;
        // A superseded task can finish its provider call before `abort` lands
        // and then wait here on the lock held by the newer submit.
        if inner.active.as_ref().map(|active| active.id) != Some(submission) {
            debug!(submission = %submission, "discarding outcome of superseded submission");
            return;
        }
        inner.active = None;

        let state = match outcome {
            Ok(result) => LifecycleState::Ready(result),
            Err(error) => LifecycleState::Error(error),
        };
        self.transition(submission, state);
    }

    fn transition(&self, submission: SubmissionId, state: LifecycleState) {
        info!(submission = %submission, state = state.name(), "analysis state changed");
        self.state.send_replace(state.clone());
        let _ = self
            .events
            .send(LifecycleEvent::StateChanged { submission, state });
    }
}

impl Drop for AnalysisController {
    fn drop(&mut self) {
        if let Some(active) = self.inner.get_mut().active.take() {
            active.task.abort();
        }
    }
}

async fn resolve_submission(
    controller: Weak<AnalysisController>,
    submission: SubmissionId,
    outcome: Result<AnalysisResult, AnalysisError>,
) {
    match controller.upgrade() {
        Some(controller) => controller.resolve(submission, outcome).await,
        None => debug!(submission = %submission, "controller dropped before analysis finished"),
    }
}

async fn run_provider(
    provider: &dyn AnalysisProvider,
    request: &AnalysisRequest,
    timeout: Option<Duration>,
    submission: SubmissionId,
) -> Result<AnalysisResult, AnalysisError> {
    let call = AssertUnwindSafe(provider.analyze(request)).catch_unwind();
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    submission = %submission,
                    url = %request.url,
                    timeout_ms = limit.as_millis() as u64,
                    "website analysis timed out"
                );
                return Err(AnalysisError::AnalysisFailed);
            }
        },
        None => call.await,
    };

    match joined {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => {
            warn!(submission = %submission, url = %request.url, "website analysis failed: {err:#}");
            Err(AnalysisError::AnalysisFailed)
        }
        Err(_) => {
            warn!(submission = %submission, url = %request.url, "analysis provider panicked");
            Err(AnalysisError::AnalysisFailed)
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
