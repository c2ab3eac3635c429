//! Backend worker: owns the tokio runtime and the analysis controller, drains the
//! command queue, and forwards lifecycle events to the front end.

use std::thread::{self, JoinHandle};

use analyzer_core::AnalysisController;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use shared::lifecycle::LifecycleEvent;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::backend_bridge::commands::BackendCommand;
use crate::config::Settings;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

pub fn launch(
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
    settings: Settings,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let controller = AnalysisController::new_with_config(
                settings.build_provider(),
                settings.controller_config(),
            );
            let event_task = tokio::spawn(forward_lifecycle_events(
                controller.subscribe_events(),
                ui_tx.clone(),
            ));
            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

            // Commands arrive on a blocking queue; spawned analysis tasks run on
            // the runtime's worker threads meanwhile.
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::SetUrl { url } => controller.set_url(url).await,
                    BackendCommand::Submit => {
                        let outcome = controller.submit().await;
                        tracing::debug!(?outcome, "submit processed");
                    }
                    BackendCommand::Shutdown => break,
                }
            }

            // Let the in-flight submission resolve, then close the event
            // stream so the forwarder drains what is queued and exits.
            let last = controller.settled().await;
            tracing::debug!(state = last.name(), "backend worker draining events");
            drop(controller);
            if let Err(err) = event_task.await {
                tracing::warn!("lifecycle event forwarder failed: {err}");
            }
            tracing::debug!("backend worker stopped");
        });
    })
}

async fn forward_lifecycle_events(
    mut events: broadcast::Receiver<LifecycleEvent>,
    ui_tx: Sender<UiEvent>,
) {
    loop {
        let ui_event = match events.recv().await {
            Ok(event) => UiEvent::from_lifecycle(event),
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "front end fell behind analysis events");
                Some(UiEvent::Error(UiError::from_message(
                    UiErrorContext::General,
                    format!("{missed} status updates were skipped"),
                )))
            }
            Err(RecvError::Closed) => return,
        };

        let Some(ui_event) = ui_event else {
            continue;
        };
        match ui_tx.try_send(ui_event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("ui event queue is full; dropping analysis event");
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

#[cfg(test)]
#[path = "../tests/runtime_tests.rs"]
mod tests;
