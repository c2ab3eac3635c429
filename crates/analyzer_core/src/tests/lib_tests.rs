use super::*;
use anyhow::Result;
use async_trait::async_trait;
use shared::error::{ANALYSIS_FAILED_MESSAGE, INVALID_URL_MESSAGE};
use tokio::sync::{broadcast::error::TryRecvError, Semaphore};

struct TestAnalysisProvider {
    result: AnalysisResult,
    fail_with: Option<String>,
    panic_with: Option<String>,
    gate: Option<Arc<Semaphore>>,
    seen_urls: Arc<Mutex<Vec<String>>>,
}

impl TestAnalysisProvider {
    fn ok() -> Self {
        Self {
            result: sample_result().expect("sample"),
            fail_with: None,
            panic_with: None,
            gate: None,
            seen_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing(err: impl Into<String>) -> Self {
        let mut provider = Self::ok();
        provider.fail_with = Some(err.into());
        provider
    }

    fn panicking(message: impl Into<String>) -> Self {
        let mut provider = Self::ok();
        provider.panic_with = Some(message.into());
        provider
    }

    /// Each call blocks until the returned semaphore receives a permit.
    fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut provider = Self::ok();
        provider.gate = Some(Arc::clone(&gate));
        (provider, gate)
    }

    fn with_product(mut self, product: &str) -> Self {
        self.result.products = vec![product.to_string()];
        self
    }
}

#[async_trait]
impl AnalysisProvider for TestAnalysisProvider {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        self.seen_urls.lock().await.push(request.url.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if let Some(message) = &self.panic_with {
            panic!("{message}");
        }
        if let Some(err) = &self.fail_with {
            return Err(anyhow!(err.clone()));
        }
        Ok(self.result.clone())
    }
}

fn drain_events(rx: &mut broadcast::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

fn state_changes(events: &[LifecycleEvent]) -> Vec<(SubmissionId, &'static str)> {
    events
        .iter()
        .filter_map(|event| match event {
            LifecycleEvent::StateChanged { submission, state } => Some((*submission, state.name())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn starts_idle_and_settled_returns_idle_without_submission() {
    let controller = AnalysisController::new(Arc::new(TestAnalysisProvider::ok()));

    assert_eq!(controller.state(), LifecycleState::Idle);
    assert_eq!(controller.settled().await, LifecycleState::Idle);
    assert_eq!(controller.url().await, "");
}

#[tokio::test]
async fn non_http_url_errors_without_loading_or_provider_call() {
    let provider = TestAnalysisProvider::ok();
    let seen_urls = Arc::clone(&provider.seen_urls);
    let controller = AnalysisController::new(Arc::new(provider));
    let mut events = controller.subscribe_events();

    controller.set_url("ftp://x.com").await;
    let outcome = controller.submit().await;

    assert_eq!(
        outcome,
        SubmitOutcome::Rejected {
            submission: SubmissionId(1),
            error: AnalysisError::InvalidUrl,
        }
    );
    let state = controller.state();
    assert_eq!(state, LifecycleState::Error(AnalysisError::InvalidUrl));
    assert_eq!(
        state.error().map(|err| err.message()),
        Some(INVALID_URL_MESSAGE)
    );
    assert_eq!(
        state_changes(&drain_events(&mut events)),
        vec![(SubmissionId(1), "error")]
    );
    assert!(seen_urls.lock().await.is_empty());
}

#[tokio::test]
async fn empty_url_fails_validation_with_same_message() {
    let controller = AnalysisController::new(Arc::new(TestAnalysisProvider::ok()));

    let outcome = controller.submit().await;

    assert!(matches!(
        outcome,
        SubmitOutcome::Rejected {
            error: AnalysisError::InvalidUrl,
            ..
        }
    ));
    assert_eq!(
        controller.state().error().map(|err| err.to_string()),
        Some(INVALID_URL_MESSAGE.to_string())
    );
}

#[tokio::test]
async fn valid_url_loads_then_passes_provider_result_through() {
    let (provider, gate) = TestAnalysisProvider::gated();
    let provider = provider.with_product("Only Product");
    let expected = provider.result.clone();
    let controller = AnalysisController::new(Arc::new(provider));
    let mut events = controller.subscribe_events();

    let outcome = controller.submit_url("https://example.com").await;
    assert_eq!(
        outcome,
        SubmitOutcome::Started {
            submission: SubmissionId(1)
        }
    );
    assert_eq!(controller.state(), LifecycleState::Loading);

    gate.add_permits(1);
    let settled = controller.settled().await;

    assert_eq!(settled, LifecycleState::Ready(expected.clone()));
    assert_eq!(controller.state().result(), Some(&expected));
    assert_eq!(
        state_changes(&drain_events(&mut events)),
        vec![(SubmissionId(1), "loading"), (SubmissionId(1), "ready")]
    );
}

#[tokio::test]
async fn bare_http_passes_the_prefix_check() {
    let provider = TestAnalysisProvider::ok();
    let seen_urls = Arc::clone(&provider.seen_urls);
    let controller = AnalysisController::new(Arc::new(provider));

    let outcome = controller.submit_url("http").await;

    assert!(matches!(outcome, SubmitOutcome::Started { .. }));
    assert!(matches!(controller.settled().await, LifecycleState::Ready(_)));
    assert_eq!(*seen_urls.lock().await, vec!["http".to_string()]);
}

#[tokio::test]
async fn only_last_set_url_is_validated() {
    let provider = TestAnalysisProvider::ok();
    let seen_urls = Arc::clone(&provider.seen_urls);
    let controller = AnalysisController::new(Arc::new(provider));

    controller.set_url("ftp://x.com").await;
    controller.set_url("not a url").await;
    controller.set_url("https://example.com").await;
    assert!(matches!(
        controller.submit().await,
        SubmitOutcome::Started { .. }
    ));
    assert!(matches!(controller.settled().await, LifecycleState::Ready(_)));

    controller.set_url("https://example.com").await;
    controller.set_url("mailto:someone@example.com").await;
    assert!(matches!(
        controller.submit().await,
        SubmitOutcome::Rejected { .. }
    ));

    assert_eq!(
        *seen_urls.lock().await,
        vec!["https://example.com".to_string()]
    );
}

#[tokio::test]
async fn provider_failure_surfaces_generic_message() {
    let controller = AnalysisController::new(Arc::new(TestAnalysisProvider::failing(
        "connection reset by peer",
    )));
    let mut events = controller.subscribe_events();

    controller.submit_url("https://example.com").await;
    let settled = controller.settled().await;

    assert_eq!(settled, LifecycleState::Error(AnalysisError::AnalysisFailed));
    assert_eq!(
        settled.error().map(|err| err.to_string()),
        Some(ANALYSIS_FAILED_MESSAGE.to_string())
    );
    assert_eq!(
        state_changes(&drain_events(&mut events)),
        vec![(SubmissionId(1), "loading"), (SubmissionId(1), "error")]
    );
}

#[tokio::test]
async fn provider_panic_still_clears_loading() {
    let controller =
        AnalysisController::new(Arc::new(TestAnalysisProvider::panicking("provider bug")));

    controller.submit_url("https://example.com").await;

    assert_eq!(
        controller.settled().await,
        LifecycleState::Error(AnalysisError::AnalysisFailed)
    );
}

#[tokio::test(start_paused = true)]
async fn slow_provider_times_out_as_analysis_failure() {
    let controller = AnalysisController::new_with_config(
        Arc::new(MockAnalysisProvider::new(Duration::from_secs(30))),
        ControllerConfig {
            submit_policy: SubmitPolicy::Reject,
            analysis_timeout: Some(Duration::from_secs(5)),
        },
    );

    let started = tokio::time::Instant::now();
    controller.submit_url("https://example.com").await;
    let settled = controller.settled().await;

    assert_eq!(settled, LifecycleState::Error(AnalysisError::AnalysisFailed));
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn mock_provider_resolves_after_simulated_delay() {
    let controller = AnalysisController::new(Arc::new(MockAnalysisProvider::default()));

    let started = tokio::time::Instant::now();
    controller.submit_url("https://anything.example").await;
    assert!(controller.state().is_loading());
    let settled = controller.settled().await;

    assert!(started.elapsed() >= DEFAULT_SIMULATED_DELAY);
    assert_eq!(
        settled,
        LifecycleState::Ready(sample_result().expect("sample"))
    );
}

#[tokio::test]
async fn reject_policy_ignores_submit_while_loading() {
    let (provider, gate) = TestAnalysisProvider::gated();
    let seen_urls = Arc::clone(&provider.seen_urls);
    let controller = AnalysisController::new(Arc::new(provider));
    let mut events = controller.subscribe_events();

    controller.submit_url("https://first.example").await;
    let second = controller.submit_url("https://second.example").await;

    assert_eq!(
        second,
        SubmitOutcome::Ignored {
            active: SubmissionId(1)
        }
    );
    assert_eq!(second.submission(), None);
    assert!(controller.state().is_loading());

    gate.add_permits(1);
    assert!(matches!(controller.settled().await, LifecycleState::Ready(_)));

    // The input still holds the ignored value; only submission 1 reached the provider.
    assert_eq!(controller.url().await, "https://second.example");
    assert_eq!(
        *seen_urls.lock().await,
        vec!["https://first.example".to_string()]
    );
    let events = drain_events(&mut events);
    assert!(events.contains(&LifecycleEvent::SubmitIgnored {
        active: SubmissionId(1)
    }));
    assert_eq!(
        state_changes(&events),
        vec![(SubmissionId(1), "loading"), (SubmissionId(1), "ready")]
    );
}

#[tokio::test]
async fn supersede_policy_discards_previous_submission() {
    let (provider, gate) = TestAnalysisProvider::gated();
    let controller = AnalysisController::new_with_config(
        Arc::new(provider),
        ControllerConfig {
            submit_policy: SubmitPolicy::Supersede,
            analysis_timeout: None,
        },
    );
    let mut events = controller.subscribe_events();

    controller.submit_url("https://first.example").await;
    let second = controller.submit_url("https://second.example").await;
    assert_eq!(
        second,
        SubmitOutcome::Started {
            submission: SubmissionId(2)
        }
    );

    gate.add_permits(1);
    assert!(matches!(controller.settled().await, LifecycleState::Ready(_)));

    let events = drain_events(&mut events);
    assert!(events.contains(&LifecycleEvent::Superseded {
        previous: SubmissionId(1),
        current: SubmissionId(2),
    }));
    assert_eq!(
        state_changes(&events),
        vec![
            (SubmissionId(1), "loading"),
            (SubmissionId(2), "loading"),
            (SubmissionId(2), "ready"),
        ]
    );
}

#[tokio::test]
async fn late_outcome_of_superseded_submission_is_discarded() {
    let (provider, gate) = TestAnalysisProvider::gated();
    let controller = AnalysisController::new_with_config(
        Arc::new(provider),
        ControllerConfig {
            submit_policy: SubmitPolicy::Supersede,
            analysis_timeout: None,
        },
    );

    controller.submit_url("https://first.example").await;
    controller.submit_url("https://second.example").await;
    let mut events = controller.subscribe_events();

    // Submission 1 finished its provider call before the abort reached it.
    let stale = TestAnalysisProvider::ok().with_product("Stale Widget").result;
    resolve_submission(Arc::downgrade(&controller), SubmissionId(1), Ok(stale)).await;

    assert!(controller.state().is_loading());
    assert!(drain_events(&mut events).is_empty());

    gate.add_permits(1);
    match controller.settled().await {
        LifecycleState::Ready(result) => assert_ne!(result.products, vec!["Stale Widget"]),
        other => panic!("expected ready state, got {other:?}"),
    }
    assert_eq!(
        state_changes(&drain_events(&mut events)),
        vec![(SubmissionId(2), "ready")]
    );
}

#[tokio::test]
async fn supersede_with_invalid_url_cancels_loading_into_error() {
    let (provider, _gate) = TestAnalysisProvider::gated();
    let controller = AnalysisController::new_with_config(
        Arc::new(provider),
        ControllerConfig {
            submit_policy: SubmitPolicy::Supersede,
            analysis_timeout: None,
        },
    );

    controller.submit_url("https://first.example").await;
    let outcome = controller.submit_url("example.com").await;

    assert_eq!(
        outcome,
        SubmitOutcome::Rejected {
            submission: SubmissionId(2),
            error: AnalysisError::InvalidUrl,
        }
    );
    assert_eq!(
        controller.settled().await,
        LifecycleState::Error(AnalysisError::InvalidUrl)
    );
}

#[tokio::test]
async fn resubmit_restarts_from_ready_and_error() {
    let (provider, gate) = TestAnalysisProvider::gated();
    let controller = AnalysisController::new(Arc::new(provider));

    controller.submit_url("https://example.com").await;
    gate.add_permits(1);
    assert!(matches!(controller.settled().await, LifecycleState::Ready(_)));

    controller.submit().await;
    assert!(controller.state().is_loading());
    gate.add_permits(1);
    assert!(matches!(controller.settled().await, LifecycleState::Ready(_)));

    controller.submit_url("ftp://x.com").await;
    assert_eq!(
        controller.state(),
        LifecycleState::Error(AnalysisError::InvalidUrl)
    );

    let outcome = controller.submit_url("https://example.com").await;
    assert_eq!(
        outcome,
        SubmitOutcome::Started {
            submission: SubmissionId(4)
        }
    );
    assert!(controller.state().is_loading());
    gate.add_permits(1);
    assert!(matches!(controller.settled().await, LifecycleState::Ready(_)));
}

#[test]
fn submit_policy_parses_config_values() {
    assert_eq!("reject".parse::<SubmitPolicy>().expect("reject"), SubmitPolicy::Reject);
    assert_eq!(
        " Supersede ".parse::<SubmitPolicy>().expect("supersede"),
        SubmitPolicy::Supersede
    );
    let err = "queue".parse::<SubmitPolicy>().expect_err("unknown policy");
    assert!(err.to_string().contains("unknown submit policy"));
    assert_eq!(SubmitPolicy::default(), SubmitPolicy::Reject);
}
