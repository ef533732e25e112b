use arcdata_core::domain::iso_date;
use arcdata_core::{AppContext, DateRange, Observation, Resolved, SourceName};

use crate::cli::SeriesArgs;
use crate::error::CliError;
use crate::output::Table;

use super::CommandResult;

pub fn run_fred(
    context: &AppContext,
    args: &SeriesArgs,
    use_cache: bool,
) -> Result<CommandResult, CliError> {
    run(context, SourceName::Economic, args, use_cache)
}

pub fn run_statcan(
    context: &AppContext,
    args: &SeriesArgs,
    use_cache: bool,
) -> Result<CommandResult, CliError> {
    run(context, SourceName::StatisticalAgency, args, use_cache)
}

fn run(
    context: &AppContext,
    source: SourceName,
    args: &SeriesArgs,
    use_cache: bool,
) -> Result<CommandResult, CliError> {
    let range = DateRange::parse(args.start.as_deref(), args.end.as_deref())?;
    let resolved = context.get_series(source, &args.key, range, use_cache)?;
    to_result(source, &resolved)
}

fn to_result(
    source: SourceName,
    resolved: &Resolved<Observation>,
) -> Result<CommandResult, CliError> {
    let mut table = Table::new(["date", "value"]);
    for row in &resolved.rows {
        table.push(vec![iso_date(row.date), row.value.to_string()]);
    }

    let data = serde_json::json!({
        "source": source,
        "key": resolved.key,
        "observations": resolved.rows,
    });
    let mut result = CommandResult::new(data, table).with_origin(resolved.origin);
    if resolved.rows.is_empty() {
        result = result.with_warning(format!("no observations for {} in the requested range", resolved.key));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use arcdata_core::domain::parse_date;
    use arcdata_core::Origin;

    use super::*;

    #[test]
    fn observations_become_date_value_rows() {
        let resolved = Resolved {
            key: String::from("CPIAUCSL"),
            rows: vec![Observation::new(parse_date("2024-01-01").expect("date"), 308.417)],
            origin: Origin::Remote,
        };

        let result = to_result(SourceName::Economic, &resolved).expect("result");

        assert_eq!(result.table.rows, vec![vec!["2024-01-01", "308.417"]]);
        assert_eq!(result.data["observations"][0]["date"], "2024-01-01");
        assert_eq!(result.data["source"], "economic");
        assert_eq!(result.origin.as_deref(), Some("remote"));
    }
}
