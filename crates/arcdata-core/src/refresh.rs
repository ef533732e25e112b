//! Periodic refresh of everything the store already knows about.

use serde::Serialize;
use time::OffsetDateTime;

use crate::config::ArcConfig;
use crate::context::AppContext;
use crate::domain::{BarInterval, DateRange, Ticker};
use crate::{CoreError, SourceName};

/// Calendar days of bars re-fetched per instrument on each run.
pub const DEFAULT_REFRESH_LOOKBACK_DAYS: u32 = 180;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPlan {
    /// Economic series refreshed whether or not they are cached yet.
    pub watch_series: Vec<String>,
    /// Tickers seeded when the store holds no instrument.
    pub bootstrap_tickers: Vec<Ticker>,
    /// Interval used for bootstrap tickers and instruments without stored bars.
    pub default_interval: BarInterval,
    pub lookback_days: u32,
}

impl RefreshPlan {
    pub fn from_config(config: &ArcConfig) -> Self {
        Self {
            watch_series: config.watch_series.clone(),
            bootstrap_tickers: config.watch_tickers.clone(),
            default_interval: BarInterval::default(),
            lookback_days: DEFAULT_REFRESH_LOOKBACK_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshedKey {
    pub source: SourceName,
    pub key: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedKey {
    pub source: SourceName,
    pub key: String,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub refreshed: Vec<RefreshedKey>,
    pub failed: Vec<FailedKey>,
}

impl RefreshReport {
    fn record<T>(&mut self, source: SourceName, key: String, outcome: Result<Vec<T>, CoreError>) {
        match outcome {
            Ok(rows) => self.refreshed.push(RefreshedKey {
                source,
                key,
                rows: rows.len(),
            }),
            Err(error) => {
                tracing::warn!(source = %source, key = %key, code = error.code(), %error, "refresh failed");
                self.failed.push(FailedKey {
                    source,
                    key,
                    code: error.code(),
                    message: error.to_string(),
                });
            }
        }
    }
}

/// Re-fetch every stored series and instrument plus the plan's watch-list.
///
/// Only a failure to read the store aborts the run. Fetch failures, including
/// a missing API key, are recorded per key.
pub fn refresh_all(context: &AppContext, plan: &RefreshPlan) -> Result<RefreshReport, CoreError> {
    let mut report = RefreshReport::default();
    let warehouse = context.warehouse();

    let mut series: Vec<(SourceName, String)> = Vec::new();
    for record in warehouse.list_series(None)? {
        match record.source.parse::<SourceName>() {
            Ok(SourceName::Equity) => {}
            Ok(source) => series.push((source, record.natural_key)),
            Err(error) => {
                tracing::warn!(source = %record.source, key = %record.natural_key, %error, "skipping series with unknown source");
            }
        }
    }
    for key in &plan.watch_series {
        let entry = (SourceName::Economic, key.clone());
        if !series.contains(&entry) {
            series.push(entry);
        }
    }

    for (source, key) in series {
        let outcome = context
            .get_series(source, &key, DateRange::unbounded(), false)
            .map(|resolved| resolved.rows);
        report.record(source, key, outcome);
    }

    let today = OffsetDateTime::now_utc().date();
    let range = DateRange::trailing_days(today, plan.lookback_days);

    let mut targets: Vec<(Ticker, BarInterval)> = Vec::new();
    let instruments = warehouse.list_instruments()?;
    for instrument in &instruments {
        let ticker = match Ticker::parse(&instrument.ticker) {
            Ok(ticker) => ticker,
            Err(error) => {
                tracing::warn!(ticker = %instrument.ticker, %error, "skipping unparsable stored ticker");
                continue;
            }
        };
        let mut intervals: Vec<BarInterval> = warehouse
            .bar_intervals(instrument.id)?
            .iter()
            .filter_map(|raw| raw.parse().ok())
            .collect();
        if intervals.is_empty() {
            intervals.push(plan.default_interval);
        }
        targets.extend(intervals.into_iter().map(|interval| (ticker.clone(), interval)));
    }
    if instruments.is_empty() {
        targets.extend(
            plan.bootstrap_tickers
                .iter()
                .map(|ticker| (ticker.clone(), plan.default_interval)),
        );
    }

    for (ticker, interval) in targets {
        let outcome = context
            .get_bars(&ticker, interval, range, false)
            .map(|resolved| resolved.rows);
        report.record(SourceName::Equity, format!("{ticker}@{interval}"), outcome);
    }

    tracing::info!(
        refreshed = report.refreshed.len(),
        failed = report.failed.len(),
        "refresh run finished"
    );
    Ok(report)
}
