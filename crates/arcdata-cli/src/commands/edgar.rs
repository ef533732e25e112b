use arcdata_core::{AppContext, Filing};
use serde_json::{json, Value};

use crate::cli::{EdgarArgs, EdgarCommand};
use crate::error::CliError;
use crate::output::Table;

use super::CommandResult;

pub fn run(context: &AppContext, args: &EdgarArgs, use_cache: bool) -> Result<CommandResult, CliError> {
    let filings = context.filings()?;
    let filing = match &args.command {
        EdgarCommand::Facts(args) => filings.company_facts(&args.ticker_or_cik, use_cache)?,
        EdgarCommand::Submissions(args) => filings.submissions(&args.ticker_or_cik, use_cache)?,
    };
    Ok(to_result(filing))
}

/// Filing payloads are deeply nested; the table shows one line per top-level field.
fn to_result(filing: Filing) -> CommandResult {
    let mut table = Table::new(["field", "value"]);
    if let Value::Object(fields) = &filing.payload {
        for (name, value) in fields {
            table.push(vec![name.clone(), summarize(value)]);
        }
    }

    let data = json!({
        "cik": filing.cik.padded(),
        "kind": filing.kind,
        "document": filing.payload,
    });
    CommandResult::new(data, table).with_origin(filing.origin)
}

fn summarize(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(fields) => format!("{{{} fields}}", fields.len()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use arcdata_core::providers::edgar::Cik;
    use arcdata_core::{FilingKind, Origin};

    use super::*;

    #[test]
    fn top_level_fields_are_summarized() {
        let filing = Filing {
            cik: Cik::from_number(789_019),
            kind: FilingKind::CompanyFacts,
            payload: json!({
                "cik": 789019,
                "entityName": "MICROSOFT CORPORATION",
                "facts": { "dei": {}, "us-gaap": {} }
            }),
            origin: Origin::Cache,
        };

        let result = to_result(filing);

        assert_eq!(
            result.table.rows,
            vec![
                vec!["cik", "789019"],
                vec!["entityName", "MICROSOFT CORPORATION"],
                vec!["facts", "{2 fields}"],
            ]
        );
        assert_eq!(result.data["cik"], "0000789019");
        assert_eq!(result.data["kind"], "company_facts");
    }
}
