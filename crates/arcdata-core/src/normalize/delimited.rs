//! CSV payloads: header validation and typed cell parsing.

use super::{parse_number, resolve_date, CanonicalField, CanonicalRow, ColumnMap, RawDate};
use crate::CoreError;

/// Statistics Canada vector download.
pub const STATCAN_CSV_COLUMNS: ColumnMap = ColumnMap::new(&[
    ("REF_DATE", CanonicalField::Date),
    ("VALUE", CanonicalField::Value),
]);

/// Equity price download. `Adj Close` is not mapped.
pub const EQUITY_CSV_COLUMNS: ColumnMap = ColumnMap::new(&[
    ("Date", CanonicalField::Date),
    ("Open", CanonicalField::Open),
    ("High", CanonicalField::High),
    ("Low", CanonicalField::Low),
    ("Close", CanonicalField::Close),
    ("Volume", CanonicalField::Volume),
    ("Dividends", CanonicalField::Dividends),
    ("Stock Splits", CanonicalField::Splits),
    ("Splits", CanonicalField::Splits),
]);

/// Read a CSV body into canonical rows.
///
/// Every field in `required` must appear in the header row and the date column
/// is always required. A cell that is neither a missing marker nor a number is
/// an error for the whole payload.
pub fn read_rows(
    provider: &str,
    body: &str,
    columns: ColumnMap,
    required: &[CanonicalField],
) -> Result<Vec<CanonicalRow>, CoreError> {
    let body = body.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|error| CoreError::provider(provider, format!("unreadable CSV header: {error}")))?
        .clone();

    let mut layout: Vec<(usize, CanonicalField)> = Vec::new();
    for (index, name) in headers.iter().enumerate() {
        if let Some(field) = columns.field(name) {
            if layout.iter().all(|(_, seen)| *seen != field) {
                layout.push((index, field));
            }
        }
    }

    let date_index = layout
        .iter()
        .find(|(_, field)| *field == CanonicalField::Date)
        .map(|(index, _)| *index);
    let missing: Vec<&str> = std::iter::once(CanonicalField::Date)
        .chain(required.iter().copied())
        .filter(|field| layout.iter().all(|(_, seen)| seen != field))
        .map(CanonicalField::as_str)
        .collect();
    let Some(date_index) = date_index.filter(|_| missing.is_empty()) else {
        return Err(CoreError::provider(
            provider,
            format!(
                "CSV is missing column(s) {} (header: {})",
                missing.join(", "),
                headers.iter().collect::<Vec<_>>().join(",")
            ),
        ));
    };

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|error| {
            CoreError::provider(provider, format!("malformed CSV record {}: {error}", line + 1))
        })?;
        let raw_date = record.get(date_index).unwrap_or_default();
        if raw_date.is_empty() {
            continue;
        }
        let mut row = CanonicalRow::new(resolve_date(
            provider,
            &RawDate::Text(raw_date.to_owned()),
        )?);
        for (index, field) in &layout {
            if *field == CanonicalField::Date {
                continue;
            }
            if let Some(value) = parse_number(provider, *field, record.get(*index).unwrap_or_default())? {
                row.set(*field, value);
            }
        }
        rows.push(row);
    }

    Ok(rows)
}
