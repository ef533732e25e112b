//! Conversion of raw provider payloads into canonical rows keyed by date.

pub mod delimited;
pub mod economic;
pub mod equity;
pub mod statcan;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use time::Date;

use crate::domain::{date_from_unix, parse_date, Bar, Observation};
use crate::{CoreError, ValidationError};

/// Provider-agnostic column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    Date,
    Value,
    Open,
    High,
    Low,
    Close,
    Volume,
    Dividends,
    Splits,
}

impl CanonicalField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Value => "value",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
            Self::Dividends => "dividends",
            Self::Splits => "splits",
        }
    }
}

impl Display for CanonicalField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit rename table from a provider's raw field names to canonical fields.
///
/// Names not listed are dropped. Lookup is exact (case-sensitive).
#[derive(Debug, Clone, Copy)]
pub struct ColumnMap {
    entries: &'static [(&'static str, CanonicalField)],
}

impl ColumnMap {
    pub const fn new(entries: &'static [(&'static str, CanonicalField)]) -> Self {
        Self { entries }
    }

    pub fn field(&self, raw: &str) -> Option<CanonicalField> {
        self.entries
            .iter()
            .find(|(name, _)| *name == raw)
            .map(|(_, field)| *field)
    }

    pub fn raw_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }
}

/// A date-typed value as a provider may send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDate {
    Text(String),
    Calendar(Date),
    Unix { seconds: i64, utc_offset: i64 },
}

impl RawDate {
    pub fn resolve(&self) -> Result<Date, ValidationError> {
        match self {
            Self::Text(text) => parse_date(text),
            Self::Calendar(date) => Ok(*date),
            Self::Unix {
                seconds,
                utc_offset,
            } => date_from_unix(*seconds, *utc_offset),
        }
    }
}

/// One dated record after renaming; numeric fields that were missing are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    pub date: Date,
    values: BTreeMap<CanonicalField, f64>,
}

impl CanonicalRow {
    pub fn new(date: Date) -> Self {
        Self {
            date,
            values: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, field: CanonicalField, value: f64) {
        self.values.insert(field, value);
    }

    pub fn get(&self, field: CanonicalField) -> Option<f64> {
        self.values.get(&field).copied()
    }

    pub fn to_observation(&self) -> Option<Observation> {
        self.get(CanonicalField::Value)
            .map(|value| Observation::new(self.date, value))
    }

    /// A bar needs all four prices; volume is optional and actions default to zero.
    pub fn to_bar(&self) -> Option<Bar> {
        Some(Bar {
            date: self.date,
            open: self.get(CanonicalField::Open)?,
            high: self.get(CanonicalField::High)?,
            low: self.get(CanonicalField::Low)?,
            close: self.get(CanonicalField::Close)?,
            volume: self
                .get(CanonicalField::Volume)
                .filter(|volume| *volume >= 0.0)
                .map(|volume| volume.round() as u64),
            dividends: self.get(CanonicalField::Dividends).unwrap_or(0.0),
            splits: self.get(CanonicalField::Splits).unwrap_or(0.0),
        })
    }
}

/// Parse a numeric cell.
///
/// Only the providers' missing markers (empty, `.`, `null`) yield `None`.
/// Anything else that is not a finite number, `NaN` and `inf` included, fails
/// the payload.
pub fn parse_number(provider: &str, field: CanonicalField, raw: &str) -> Result<Option<f64>, CoreError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(CoreError::provider(
            provider,
            format!("field '{field}' is not numeric: '{trimmed}'"),
        )),
    }
}

/// Resolve a raw date or fail the payload.
pub fn resolve_date(provider: &str, raw: &RawDate) -> Result<Date, CoreError> {
    raw.resolve()
        .map_err(|error| CoreError::provider(provider, error.to_string()))
}

/// Sort ascending by date and keep the last row for each date.
pub fn dedupe_by_date<T, F>(rows: Vec<T>, date_of: F) -> Vec<T>
where
    F: Fn(&T) -> Date,
{
    let mut by_date = BTreeMap::new();
    for row in rows {
        by_date.insert(date_of(&row), row);
    }
    by_date.into_values().collect()
}

pub fn observations_from(rows: &[CanonicalRow]) -> Vec<Observation> {
    let observations = rows.iter().filter_map(CanonicalRow::to_observation).collect();
    dedupe_by_date(observations, |row: &Observation| row.date)
}

pub fn bars_from(rows: &[CanonicalRow]) -> Vec<Bar> {
    let bars = rows.iter().filter_map(CanonicalRow::to_bar).collect();
    dedupe_by_date(bars, |bar: &Bar| bar.date)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use time::macros::date;

    use super::*;

    #[test]
    fn missing_markers_are_absent_not_errors() {
        for raw in ["", " ", ".", "null"] {
            assert_eq!(
                parse_number("fred", CanonicalField::Value, raw).expect("missing"),
                None,
                "{raw:?}"
            );
        }
        assert_eq!(
            parse_number("fred", CanonicalField::Value, " 1234.5 ").expect("number"),
            Some(1234.5)
        );
        assert!(parse_number("fred", CanonicalField::Value, "n/a").is_err());
    }

    #[test]
    fn non_finite_and_formatted_numbers_fail_the_payload() {
        for raw in ["NaN", "nan", "inf", "-inf", "Infinity", "1,234.5"] {
            let error = parse_number("statcan", CanonicalField::Value, raw)
                .expect_err(raw);
            assert!(matches!(error, CoreError::Provider { .. }), "{raw:?}");
        }
    }

    #[test]
    fn column_maps_are_unambiguous() {
        for map in [
            delimited::STATCAN_CSV_COLUMNS,
            delimited::EQUITY_CSV_COLUMNS,
            statcan::WDS_JSON_FIELDS,
        ] {
            let names: Vec<&str> = map.raw_names().collect();
            let unique: HashSet<&str> = names.iter().copied().collect();
            assert_eq!(names.len(), unique.len());
        }
    }

    #[test]
    fn typed_dates_pass_through() {
        let raw = RawDate::Calendar(date!(2023 - 12 - 29));
        assert_eq!(raw.resolve(), Ok(date!(2023 - 12 - 29)));
    }

    #[test]
    fn bars_need_all_prices() {
        let mut row = CanonicalRow::new(date!(2024 - 01 - 02));
        row.set(CanonicalField::Open, 1.0);
        row.set(CanonicalField::High, 2.0);
        row.set(CanonicalField::Low, 0.5);
        assert_eq!(row.to_bar(), None);

        row.set(CanonicalField::Close, 1.5);
        let bar = row.to_bar().expect("bar");
        assert_eq!(bar.volume, None);
        assert_eq!(bar.dividends, 0.0);
    }

    #[test]
    fn duplicate_dates_keep_the_last_row() {
        let rows = vec![
            Observation::new(date!(2024 - 02 - 01), 2.0),
            Observation::new(date!(2024 - 01 - 01), 1.0),
            Observation::new(date!(2024 - 02 - 01), 3.0),
        ];

        let deduped = dedupe_by_date(rows, |row| row.date);

        assert_eq!(
            deduped,
            vec![
                Observation::new(date!(2024 - 01 - 01), 1.0),
                Observation::new(date!(2024 - 02 - 01), 3.0),
            ]
        );
    }
}
