// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod remote;
pub mod retry;
pub mod types;

use tracing::info;

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::engine::{
    EventSink, Orchestrator, OrchestratorOptions, RefreshPlan, RunReport, TracingEventSink,
};
use crate::errors::{RefreshError, Result};
use crate::remote::{RemoteService, RestClient};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the REST client
/// - the orchestrator with a `tracing` event sink
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut cfg = load_and_validate(&config_path)?;
    apply_overrides(&mut cfg, &args);

    let client = RestClient::new(
        &cfg.endpoint,
        cfg.site_id.as_deref(),
        cfg.api_version.clone(),
        cfg.request_timeout,
    )
    .map_err(|source| RefreshError::Remote {
        operation: "create HTTP client".to_string(),
        source,
    })?;

    let events = TracingEventSink;
    match run_with_service(&cfg, &client, &events, args.dry_run).await? {
        Outcome::Planned(plan) => print_plan(&plan),
        Outcome::Completed(report) => print_report(&report),
    }
    Ok(())
}

/// What a run produced.
#[derive(Debug)]
pub enum Outcome {
    /// Dry run: nothing was started.
    Planned(RefreshPlan),
    Completed(RunReport),
}

/// Sign in, run (or plan) every spec in `cfg`, sign out.
///
/// Sign-out is attempted whatever the run's result.
pub async fn run_with_service<S: RemoteService>(
    cfg: &ConfigFile,
    service: &S,
    events: &dyn EventSink,
    dry_run: bool,
) -> Result<Outcome> {
    let options = OrchestratorOptions {
        continue_on_error: cfg.continue_on_error,
        poll: cfg.poll_mode.then(|| cfg.polling.clone()),
    };
    let orchestrator = Orchestrator::new(service, cfg.retry.clone(), options, events);

    orchestrator.authenticate(&cfg.credentials).await?;

    let result = if dry_run {
        orchestrator.plan(&cfg.specs).await.map(Outcome::Planned)
    } else {
        orchestrator.run(&cfg.specs).await.map(Outcome::Completed)
    };

    orchestrator.sign_out().await;
    result
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if args.poll {
        cfg.poll_mode = true;
    }
    if args.continue_on_error {
        cfg.continue_on_error = true;
    }
}

fn print_plan(plan: &RefreshPlan) {
    println!("extract-trigger dry-run");
    println!("refreshes ({}):", plan.items.len());
    for item in &plan.items {
        println!("  - {item}");
    }
    if !plan.failures.is_empty() {
        println!("skipped ({}):", plan.failures.len());
        for failure in &plan.failures {
            println!("  - {}: {}", failure.spec, failure.error);
        }
    }
    info!("dry-run complete (no jobs started)");
}

fn print_report(report: &RunReport) {
    for line in report.summary_lines() {
        println!("{line}");
    }
}
