use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Rows rendered by the `table` and `csv` formats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// Metadata printed with every result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub request_id: String,
    pub command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    meta: &'a Meta,
    data: &'a Value,
}

pub fn render(
    meta: &Meta,
    data: &Value,
    table: &Table,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render_to(&mut out, meta, data, table, format, pretty)?;
    out.flush()?;
    Ok(())
}

pub fn render_to<W: Write>(
    out: &mut W,
    meta: &Meta,
    data: &Value,
    table: &Table,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let document = JsonDocument { meta, data };
            if pretty {
                serde_json::to_writer_pretty(&mut *out, &document)?;
            } else {
                serde_json::to_writer(&mut *out, &document)?;
            }
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(&table.columns)?;
            for row in &table.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        OutputFormat::Table => {
            render_table(out, table)?;
            for warning in &meta.warnings {
                eprintln!("warning: {warning}");
            }
            if let Some(origin) = &meta.origin {
                eprintln!("origin: {origin}, {} ms", meta.latency_ms);
            }
        }
    }
    Ok(())
}

fn render_table<W: Write>(out: &mut W, table: &Table) -> io::Result<()> {
    if table.rows.is_empty() {
        return writeln!(out, "(no rows)");
    }

    let mut widths: Vec<usize> = table.columns.iter().map(String::len).collect();
    for row in &table.rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    writeln!(out, "{}", line(table.columns.as_slice()))?;
    writeln!(
        out,
        "{}",
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  ")
    )?;
    for row in &table.rows {
        writeln!(out, "{}", line(row.as_slice()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> (Meta, Value, Table) {
        let meta = Meta {
            request_id: String::from("00000000-0000-4000-8000-000000000000"),
            command: "fred",
            origin: Some(String::from("cache")),
            latency_ms: 3,
            warnings: Vec::new(),
        };
        let data = json!([{ "date": "2024-01-01", "value": 308.4 }]);
        let mut table = Table::new(["date", "value"]);
        table.push(vec![String::from("2024-01-01"), String::from("308.4")]);
        (meta, data, table)
    }

    fn rendered(format: OutputFormat) -> String {
        let (meta, data, table) = sample();
        let mut buffer = Vec::new();
        render_to(&mut buffer, &meta, &data, &table, format, false).expect("render");
        String::from_utf8(buffer).expect("utf8")
    }

    #[test]
    fn table_format_aligns_columns() {
        assert_eq!(
            rendered(OutputFormat::Table),
            "date        value\n----------  -----\n2024-01-01  308.4\n"
        );
    }

    #[test]
    fn csv_format_writes_a_header_row() {
        assert_eq!(rendered(OutputFormat::Csv), "date,value\n2024-01-01,308.4\n");
    }

    #[test]
    fn json_format_wraps_data_with_meta() {
        let document: Value = serde_json::from_str(&rendered(OutputFormat::Json)).expect("json");
        assert_eq!(document["meta"]["origin"], "cache");
        assert_eq!(document["meta"]["command"], "fred");
        assert_eq!(document["data"][0]["value"], 308.4);
        assert!(document["meta"].get("warnings").is_none());
    }
}
