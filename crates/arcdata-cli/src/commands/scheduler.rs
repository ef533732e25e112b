//! Refresh runner: one pass on demand, or a daily loop at a fixed UTC time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arcdata_core::{refresh_all, AppContext, RefreshPlan, RefreshReport};
use time::macros::format_description;
use time::{OffsetDateTime, Time};
use uuid::Uuid;

use crate::cli::{OutputFormat, SchedulerArgs, SchedulerCommand};
use crate::error::CliError;
use crate::output::{self, Meta, Table};

use super::elapsed_ms;

pub fn run(
    context: Arc<AppContext>,
    args: &SchedulerArgs,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let plan = RefreshPlan::from_config(context.config());
    match &args.command {
        SchedulerCommand::Once => {
            let started = Instant::now();
            let report = refresh_all(&context, &plan)?;
            render_report(&report, started, format, pretty)
        }
        SchedulerCommand::Run { at } => {
            let at = parse_time_of_day(at)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            // The context is borrowed so its blocking HTTP client is dropped
            // after the runtime has shut down.
            runtime.block_on(run_daily(&context, plan, at, format, pretty))
        }
    }
}

async fn run_daily(
    context: &Arc<AppContext>,
    plan: RefreshPlan,
    at: Time,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    tracing::info!(at = %at, "scheduler started");
    loop {
        let wait = until_next(OffsetDateTime::now_utc(), at);
        tracing::info!(wait_secs = wait.as_secs(), "next refresh scheduled");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, stopping scheduler");
                return Ok(());
            }
            () = tokio::time::sleep(wait) => {}
        }

        let started = Instant::now();
        let job_context = Arc::clone(context);
        let job_plan = plan.clone();
        let outcome = tokio::task::spawn_blocking(move || refresh_all(&job_context, &job_plan))
            .await
            .map_err(|error| CliError::Runtime(error.to_string()))?;

        match outcome {
            Ok(report) => render_report(&report, started, format, pretty)?,
            Err(error) => {
                tracing::error!(code = error.code(), %error, "refresh run aborted");
            }
        }
    }
}

fn parse_time_of_day(raw: &str) -> Result<Time, CliError> {
    Time::parse(raw.trim(), format_description!("[hour]:[minute]"))
        .map_err(|error| CliError::Argument(format!("--at expects HH:MM in UTC, got '{raw}': {error}")))
}

/// Time left until the next `at` strictly after `now`.
fn until_next(now: OffsetDateTime, at: Time) -> Duration {
    let mut next = now.replace_time(at);
    if next <= now {
        next += time::Duration::days(1);
    }
    Duration::try_from(next - now).unwrap_or_default()
}

fn render_report(
    report: &RefreshReport,
    started: Instant,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let mut table = Table::new(["status", "source", "key", "detail"]);
    for entry in &report.refreshed {
        table.push(vec![
            String::from("ok"),
            entry.source.to_string(),
            entry.key.clone(),
            format!("{} rows", entry.rows),
        ]);
    }
    for entry in &report.failed {
        table.push(vec![
            String::from("failed"),
            entry.source.to_string(),
            entry.key.clone(),
            format!("{}: {}", entry.code, entry.message),
        ]);
    }

    let mut warnings = Vec::new();
    if !report.failed.is_empty() {
        warnings.push(format!("{} keys failed to refresh", report.failed.len()));
    }
    let meta = Meta {
        request_id: Uuid::new_v4().to_string(),
        command: "scheduler",
        origin: Some(String::from("remote")),
        latency_ms: elapsed_ms(started),
        warnings,
    };
    output::render(&meta, &serde_json::to_value(report)?, &table, format, pretty)
}
