mod cache;
mod edgar;
mod scheduler;
mod series;
mod stock;

use std::sync::Arc;
use std::time::Instant;

use arcdata_core::{AppContext, ArcConfig, Origin};
use serde_json::Value;
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{self, Meta, Table};

pub struct CommandResult {
    pub data: Value,
    pub table: Table,
    pub origin: Option<String>,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn new(data: Value, table: Table) -> Self {
        Self {
            data,
            table,
            origin: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin.as_str().to_owned());
        self
    }

    /// Origin of a result assembled from several keys.
    pub fn with_origins(mut self, origins: impl IntoIterator<Item = Origin>) -> Self {
        let mut merged: Option<&'static str> = None;
        for origin in origins {
            merged = match merged {
                None => Some(origin.as_str()),
                Some(seen) if seen == origin.as_str() => Some(seen),
                Some(_) => Some("mixed"),
            };
        }
        self.origin = merged.map(str::to_owned);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Resolve configuration from the environment and flags, then open the store.
pub fn open_context(cli: &Cli) -> Result<Arc<AppContext>, CliError> {
    let mut config = ArcConfig::from_env()?;
    if let Some(home) = &cli.home {
        config = config.with_home(home.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout_ms(timeout_ms)?;
    }
    tracing::debug!(db_path = %config.warehouse.db_path.display(), "opening store");
    Ok(Arc::new(AppContext::open(config)?))
}

pub fn run(cli: &Cli, context: Arc<AppContext>) -> Result<(), CliError> {
    let use_cache = !cli.no_cache;
    let started = Instant::now();

    let (name, result) = match &cli.command {
        Command::Fred(args) => ("fred", series::run_fred(&context, args, use_cache)?),
        Command::Statcan(args) => ("statcan", series::run_statcan(&context, args, use_cache)?),
        Command::Stock(args) => ("stock", stock::run(&context, args, use_cache)?),
        Command::Edgar(args) => ("edgar", edgar::run(&context, args, use_cache)?),
        Command::Cache(args) => ("cache", cache::run(&context, args)?),
        Command::Scheduler(args) => {
            return scheduler::run(context, args, cli.format, cli.pretty);
        }
    };

    let meta = Meta {
        request_id: Uuid::new_v4().to_string(),
        command: name,
        origin: result.origin,
        latency_ms: elapsed_ms(started),
        warnings: result.warnings,
    };
    output::render(&meta, &result.data, &result.table, cli.format, cli.pretty)
}

pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

