//! Command orchestration from front-end input to the backend command queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::BackendCommand;

pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    let cmd_name = cmd.name();

    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued cli->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = "Command queue is full; please retry".to_string();
        }
        Err(TrySendError::Disconnected(_)) => {
            *status =
                "Backend worker disconnected (possible startup/runtime failure); restart the analyzer"
                    .to_string();
        }
    }
}

/// Replaces the URL and submits it, mirroring a form edit followed by the
/// analyze trigger. Empty input is not dispatched.
pub fn dispatch_url_submission(cmd_tx: &Sender<BackendCommand>, url: &str, status: &mut String) {
    status.clear();
    if url.is_empty() {
        *status = "Enter a website URL (e.g., https://example.com)".to_string();
        return;
    }

    dispatch_backend_command(
        cmd_tx,
        BackendCommand::SetUrl {
            url: url.to_string(),
        },
        status,
    );
    if status.is_empty() {
        dispatch_backend_command(cmd_tx, BackendCommand::Submit, status);
    }
}
