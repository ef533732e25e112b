use arcdata_core::domain::iso_date;
use arcdata_core::{AppContext, Bar, BarInterval, DateRange, Resolved, Ticker};
use serde_json::{json, Value};

use crate::cli::StockArgs;
use crate::error::CliError;
use crate::output::Table;

use super::CommandResult;

const BAR_COLUMNS: [&str; 7] = ["open", "high", "low", "close", "volume", "dividends", "splits"];

pub fn run(context: &AppContext, args: &StockArgs, use_cache: bool) -> Result<CommandResult, CliError> {
    let tickers = args
        .tickers
        .iter()
        .map(|raw| Ticker::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let interval: BarInterval = args.interval.parse()?;
    let range = DateRange::parse(args.start.as_deref(), args.end.as_deref())?;
    let columns = select_columns(&args.columns)?;

    let resolved = context.get_bars_many(&tickers, interval, range, use_cache)?;
    Ok(to_result(&resolved, interval, &columns))
}

fn select_columns(requested: &[String]) -> Result<Vec<&'static str>, CliError> {
    if requested.is_empty() {
        return Ok(BAR_COLUMNS.to_vec());
    }
    requested
        .iter()
        .map(|name| {
            let name = name.trim().to_ascii_lowercase();
            BAR_COLUMNS
                .iter()
                .copied()
                .find(|column| *column == name)
                .ok_or_else(|| {
                    CliError::Argument(format!(
                        "unknown column '{name}'; expected one of {}",
                        BAR_COLUMNS.join(",")
                    ))
                })
        })
        .collect()
}

fn field(bar: &Bar, column: &str) -> Value {
    match column {
        "open" => json!(bar.open),
        "high" => json!(bar.high),
        "low" => json!(bar.low),
        "close" => json!(bar.close),
        "volume" => json!(bar.volume),
        "dividends" => json!(bar.dividends),
        "splits" => json!(bar.splits),
        _ => Value::Null,
    }
}

fn to_result(resolved: &[Resolved<Bar>], interval: BarInterval, columns: &[&str]) -> CommandResult {
    let mut table = Table::new(
        ["ticker", "date"]
            .into_iter()
            .chain(columns.iter().copied()),
    );
    let mut series = Vec::with_capacity(resolved.len());

    for entry in resolved {
        let mut rows = Vec::with_capacity(entry.rows.len());
        for bar in &entry.rows {
            let mut cells = vec![entry.key.clone(), iso_date(bar.date)];
            let mut row = serde_json::Map::new();
            row.insert(String::from("date"), json!(iso_date(bar.date)));
            for column in columns {
                let value = field(bar, column);
                cells.push(match &value {
                    Value::Null => String::new(),
                    other => other.to_string(),
                });
                row.insert((*column).to_owned(), value);
            }
            table.push(cells);
            rows.push(Value::Object(row));
        }
        series.push(json!({
            "ticker": entry.key,
            "origin": entry.origin,
            "bars": rows,
        }));
    }

    let mut result = CommandResult::new(json!({ "interval": interval, "series": series }), table)
        .with_origins(resolved.iter().map(|entry| entry.origin));
    for entry in resolved.iter().filter(|entry| entry.rows.is_empty()) {
        result = result.with_warning(format!("no bars for {} in the requested range", entry.key));
    }
    result
}

#[cfg(test)]
mod tests {
    use arcdata_core::domain::parse_date;
    use arcdata_core::Origin;

    use super::*;

    fn bar(date: &str, close: f64) -> Bar {
        Bar {
            date: parse_date(date).expect("date"),
            open: close,
            high: close,
            low: close,
            close,
            volume: Some(1_000),
            dividends: 0.0,
            splits: 0.0,
        }
    }

    #[test]
    fn column_selection_is_validated() {
        let columns = select_columns(&[String::from("Close"), String::from("volume")]).expect("columns");
        assert_eq!(columns, vec!["close", "volume"]);

        let error = select_columns(&[String::from("vwap")]).expect_err("unknown");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn mixed_origins_are_reported_once() {
        let resolved = vec![
            Resolved {
                key: String::from("MSFT"),
                rows: vec![bar("2024-01-02", 370.87)],
                origin: Origin::Cache,
            },
            Resolved {
                key: String::from("AAPL"),
                rows: Vec::new(),
                origin: Origin::Remote,
            },
        ];

        let result = to_result(&resolved, BarInterval::OneDay, &["close"]);

        assert_eq!(result.origin.as_deref(), Some("mixed"));
        assert_eq!(result.table.columns, vec!["ticker", "date", "close"]);
        assert_eq!(result.table.rows, vec![vec!["MSFT", "2024-01-02", "370.87"]]);
        assert_eq!(result.data["series"][0]["bars"][0]["close"], 370.87);
        assert_eq!(result.warnings.len(), 1);
    }
}
