use arcdata_core::{AppContext, SourceName};
use serde_json::json;

use crate::cli::{CacheArgs, CacheCommand};
use crate::error::CliError;
use crate::output::Table;

use super::CommandResult;

pub fn run(context: &AppContext, args: &CacheArgs) -> Result<CommandResult, CliError> {
    match &args.command {
        CacheCommand::List { source } => list(context, source.as_deref()),
    }
}

fn list(context: &AppContext, source: Option<&str>) -> Result<CommandResult, CliError> {
    let source = source.map(str::parse::<SourceName>).transpose()?;
    let warehouse = context.warehouse();

    let series = warehouse.list_series(source.map(SourceName::as_str))?;
    let instruments = match source {
        None | Some(SourceName::Equity) => warehouse.list_instruments()?,
        Some(_) => Vec::new(),
    };

    let mut table = Table::new(["source", "key", "title", "rows", "last_updated"]);
    for record in &series {
        table.push(vec![
            record.source.clone(),
            record.natural_key.clone(),
            record.title.clone().unwrap_or_default(),
            record.observation_count.to_string(),
            record.last_updated.clone().unwrap_or_default(),
        ]);
    }
    for record in &instruments {
        table.push(vec![
            SourceName::Equity.as_str().to_owned(),
            record.ticker.clone(),
            record.company_name.clone().unwrap_or_default(),
            record.bar_count.to_string(),
            record.metadata_fetched_at.clone().unwrap_or_default(),
        ]);
    }

    let data = json!({ "series": series, "instruments": instruments });
    Ok(CommandResult::new(data, table))
}
