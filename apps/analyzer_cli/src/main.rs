use std::{
    io::{self, BufRead},
    path::PathBuf,
    process::ExitCode,
    thread,
};

mod backend_bridge;
mod config;
mod controller;
mod report;

use analyzer_core::{AnalysisController, SubmitPolicy};
use anyhow::{Context, Result};
use clap::Parser;
use config::{OutputFormat, ProviderKind, Settings};
use crossbeam_channel::bounded;
use shared::lifecycle::LifecycleState;
use tracing_subscriber::EnvFilter;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::controller::orchestration::{dispatch_backend_command, dispatch_url_submission};

const COMMAND_QUEUE_CAPACITY: usize = 16;
const EVENT_QUEUE_CAPACITY: usize = 64;
const QUIT_COMMAND: &str = ":quit";

#[derive(Parser, Debug)]
#[command(about = "Analyze a website and print business information, reviews and metadata")]
struct Args {
    /// Analyze this URL once and exit. Without it, URLs are read from stdin.
    #[arg(long)]
    url: Option<String>,
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    delay_ms: Option<u64>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long, value_parser = parse_submit_policy)]
    policy: Option<SubmitPolicy>,
    #[arg(long, value_parser = parse_provider_kind)]
    provider: Option<ProviderKind>,
    #[arg(long)]
    json: bool,
}

fn parse_submit_policy(value: &str) -> Result<SubmitPolicy> {
    value.parse()
}

fn parse_provider_kind(value: &str) -> Result<ProviderKind> {
    value.parse()
}

impl Args {
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(delay_ms) = self.delay_ms {
            settings.simulated_delay_ms = delay_ms;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.analysis_timeout_ms = (timeout_ms > 0).then_some(timeout_ms);
        }
        if let Some(policy) = self.policy {
            settings.submit_policy = policy;
        }
        if let Some(provider) = self.provider {
            settings.provider = provider;
        }
        if self.json {
            settings.output = OutputFormat::Json;
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let (mut settings, warnings) = config::load_settings(&args.config);
    args.apply_to(&mut settings);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    for warning in warnings {
        tracing::warn!("{warning}");
    }

    match args.url {
        Some(url) => run_once(&settings, url),
        None => run_interactive(settings),
    }
}

fn run_once(settings: &Settings, url: String) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build analysis runtime")?;

    let state = runtime.block_on(async move {
        let controller = AnalysisController::new_with_config(
            settings.build_provider(),
            settings.controller_config(),
        );
        controller.submit_url(url).await;
        controller.settled().await
    });

    match state {
        LifecycleState::Ready(result) => {
            match settings.output {
                OutputFormat::Text => print!("{}", report::render_text(&result)),
                OutputFormat::Json => println!("{}", report::render_json(&result)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        LifecycleState::Error(error) => {
            match settings.output {
                OutputFormat::Text => eprintln!("Error: {error}"),
                OutputFormat::Json => println!("{}", report::render_error_json(error)?),
            }
            Ok(ExitCode::FAILURE)
        }
        other @ (LifecycleState::Idle | LifecycleState::Loading) => {
            anyhow::bail!("analysis ended in unexpected state '{}'", other.name())
        }
    }
}

fn run_interactive(settings: Settings) -> Result<ExitCode> {
    let (cmd_tx, cmd_rx) = bounded(COMMAND_QUEUE_CAPACITY);
    let (ui_tx, ui_rx) = bounded(EVENT_QUEUE_CAPACITY);
    let worker = backend_bridge::runtime::launch(cmd_rx, ui_tx, settings);
    let printer = thread::spawn(move || {
        for event in ui_rx {
            if let UiEvent::Error(error) = &event {
                tracing::debug!(category = ?error.category(), "showing analysis error");
            }
            println!("{}", report::render_ui_event(&event));
        }
    });

    eprintln!("Enter a website URL (e.g., https://example.com), or {QUIT_COMMAND} to exit.");
    let mut status = String::new();
    for line in io::stdin().lock().lines() {
        let line = line.context("failed to read input")?;
        if line == QUIT_COMMAND {
            break;
        }
        dispatch_url_submission(&cmd_tx, &line, &mut status);
        if !status.is_empty() {
            eprintln!("{status}");
        }
    }

    dispatch_backend_command(&cmd_tx, BackendCommand::Shutdown, &mut status);
    drop(cmd_tx);
    if worker.join().is_err() {
        tracing::error!("backend worker panicked");
    }
    if printer.join().is_err() {
        tracing::error!("event printer panicked");
    }
    Ok(ExitCode::SUCCESS)
}
