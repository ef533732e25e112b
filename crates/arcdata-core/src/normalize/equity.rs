//! Equity chart payloads. A chart body may hold several instruments; rows are
//! split by the symbol each result reports about itself.

use std::collections::{BTreeMap, HashMap};

use arcdata_warehouse::InstrumentMetadata;
use serde::Deserialize;

use super::{bars_from, resolve_date, CanonicalField, CanonicalRow, RawDate};
use crate::domain::{Bar, Ticker};
use crate::CoreError;

const PROVIDER: &str = "yahoo";

/// Bars and descriptive metadata for one instrument.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquitySeries {
    pub metadata: InstrumentMetadata,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    exchange_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    events: Option<ChartEvents>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    date: i64,
    numerator: f64,
    denominator: f64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Split a chart body into one [`EquitySeries`] per reported symbol.
///
/// # Errors
/// A chart-level error object is a [`CoreError::Provider`]; so is a result whose
/// symbol is not a valid ticker.
pub fn split_chart_by_symbol(body: &str) -> Result<BTreeMap<Ticker, EquitySeries>, CoreError> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|error| CoreError::provider(PROVIDER, format!("malformed chart payload: {error}")))?;

    if let Some(error) = response.chart.error {
        let code = error.code.unwrap_or_else(|| String::from("error"));
        let description = error.description.unwrap_or_default();
        return Err(CoreError::provider(
            PROVIDER,
            format!("chart {code}: {description}"),
        ));
    }

    let mut out: BTreeMap<Ticker, EquitySeries> = BTreeMap::new();
    for result in response.chart.result.unwrap_or_default() {
        let ticker = Ticker::parse(&result.meta.symbol).map_err(|error| {
            CoreError::provider(PROVIDER, format!("chart result symbol: {error}"))
        })?;
        let series = read_result(result)?;
        let entry = out.entry(ticker).or_default();
        entry.metadata = series.metadata;
        entry.bars.extend(series.bars);
        entry.bars = super::dedupe_by_date(std::mem::take(&mut entry.bars), |bar| bar.date);
    }
    Ok(out)
}

fn read_result(result: ChartResult) -> Result<EquitySeries, CoreError> {
    let offset = result.meta.gmtoffset.unwrap_or(0);
    let metadata = InstrumentMetadata {
        company_name: result.meta.long_name,
        exchange: result.meta.exchange_name,
        currency: result.meta.currency,
        ..InstrumentMetadata::default()
    };

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let events = result.events.unwrap_or_default();

    let mut rows: BTreeMap<time::Date, CanonicalRow> = BTreeMap::new();
    for (index, seconds) in timestamps.iter().enumerate() {
        let date = unix_date(*seconds, offset)?;
        let row = rows.entry(date).or_insert_with(|| CanonicalRow::new(date));
        let cells = [
            (CanonicalField::Open, &quote.open),
            (CanonicalField::High, &quote.high),
            (CanonicalField::Low, &quote.low),
            (CanonicalField::Close, &quote.close),
            (CanonicalField::Volume, &quote.volume),
        ];
        for (field, column) in cells {
            if let Some(value) = column.get(index).copied().flatten().filter(|v| v.is_finite()) {
                row.set(field, value);
            }
        }
    }

    for dividend in events.dividends.values() {
        let date = unix_date(dividend.date, offset)?;
        if let Some(row) = rows.get_mut(&date) {
            row.set(CanonicalField::Dividends, dividend.amount);
        }
    }
    for split in events.splits.values() {
        if split.denominator == 0.0 {
            continue;
        }
        let date = unix_date(split.date, offset)?;
        if let Some(row) = rows.get_mut(&date) {
            row.set(CanonicalField::Splits, split.numerator / split.denominator);
        }
    }

    let rows: Vec<CanonicalRow> = rows.into_values().collect();
    Ok(EquitySeries {
        metadata,
        bars: bars_from(&rows),
    })
}

fn unix_date(seconds: i64, utc_offset: i64) -> Result<time::Date, CoreError> {
    resolve_date(
        PROVIDER,
        &RawDate::Unix {
            seconds,
            utc_offset,
        },
    )
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    const TWO_SYMBOLS: &str = r#"{"chart": {"result": [
        {
            "meta": {"symbol": "MSFT", "currency": "USD", "exchangeName": "NMS", "gmtoffset": -18000},
            "timestamp": [1704205800, 1704292200],
            "events": {
                "dividends": {"1704292200": {"amount": 0.75, "date": 1704292200}}
            },
            "indicators": {"quote": [{
                "open": [373.86, 369.01], "high": [375.9, 373.26],
                "low": [366.77, 368.51], "close": [370.87, 370.6],
                "volume": [25258600, 23083500]
            }]}
        },
        {
            "meta": {"symbol": "aapl", "currency": "USD", "gmtoffset": -18000},
            "timestamp": [1704205800, 1704292200],
            "events": {
                "splits": {"1704205800": {"date": 1704205800, "numerator": 4, "denominator": 1, "splitRatio": "4:1"}}
            },
            "indicators": {"quote": [{
                "open": [187.15, null], "high": [188.44, null],
                "low": [183.89, null], "close": [185.64, null],
                "volume": [82488700, null]
            }]}
        }
    ], "error": null}}"#;

    #[test]
    fn splits_results_by_reported_symbol() {
        let series = split_chart_by_symbol(TWO_SYMBOLS).expect("series");

        let tickers: Vec<&str> = series.keys().map(Ticker::as_str).collect();
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);

        let msft = &series[&Ticker::parse("MSFT").expect("ticker")];
        assert_eq!(msft.bars.len(), 2);
        assert_eq!(msft.bars[0].date, date!(2024 - 01 - 02));
        assert_eq!(msft.bars[1].dividends, 0.75);
        assert_eq!(msft.bars[0].volume, Some(25_258_600));
        assert_eq!(msft.metadata.exchange.as_deref(), Some("NMS"));

        let aapl = &series[&Ticker::parse("AAPL").expect("ticker")];
        assert_eq!(aapl.bars.len(), 1);
        assert_eq!(aapl.bars[0].splits, 4.0);
    }

    #[test]
    fn chart_error_object_is_a_provider_error() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;

        let error = split_chart_by_symbol(body).expect_err("chart error");

        assert!(error.to_string().contains("delisted"));
    }
}
