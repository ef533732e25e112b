use std::collections::BTreeMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime, Time};

use crate::domain::{BarInterval, DateRange, Ticker};
use crate::http_client::HttpClient;
use crate::normalize::delimited::{read_rows, EQUITY_CSV_COLUMNS};
use crate::normalize::equity::{split_chart_by_symbol, EquitySeries};
use crate::normalize::{bars_from, CanonicalField};
use crate::probe::{Candidate, EndpointPlan, PayloadParser, Prober, ResponseFormat};
use crate::providers::BarSource;
use crate::CoreError;

pub const YAHOO_HOSTS: [&str; 2] = [
    "https://query1.finance.yahoo.com",
    "https://query2.finance.yahoo.com",
];

/// Calendar days fetched when a request has no start date.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Daily-or-coarser equity bars from Yahoo Finance.
pub struct YahooSource {
    prober: Prober,
    hosts: Vec<String>,
}

impl YahooSource {
    pub fn new(http: Arc<dyn HttpClient>, timeout_ms: u64) -> Self {
        Self {
            prober: Prober::new(http)
                .with_timeout_ms(timeout_ms)
                .with_header("referer", "https://finance.yahoo.com/"),
            hosts: YAHOO_HOSTS.iter().map(|host| (*host).to_owned()).collect(),
        }
    }

    /// Candidate endpoints for one ticker: chart JSON then CSV download, per host.
    pub fn candidates(
        &self,
        ticker: &Ticker,
        interval: BarInterval,
        range: DateRange,
    ) -> Vec<Candidate> {
        let (period1, period2) = unix_window(range);
        let symbol = urlencoding::encode(ticker.as_str());
        let plan = self
            .hosts
            .iter()
            .fold(EndpointPlan::new(), |plan, host| plan.host(host.as_str()));
        plan.suffix(
            format!(
                "/v8/finance/chart/{symbol}?period1={period1}&period2={period2}\
                 &interval={interval}&events=div%2Csplit"
            ),
            ResponseFormat::Json,
        )
        .suffix(
            format!(
                "/v7/finance/download/{symbol}?period1={period1}&period2={period2}\
                 &interval={interval}&events=history&includeAdjustedClose=true"
            ),
            ResponseFormat::Csv,
        )
        .candidates()
    }
}

/// `[period1, period2)` in Unix seconds covering the inclusive date range.
fn unix_window(range: DateRange) -> (i64, i64) {
    let end = range
        .end()
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());
    let start = range.start().unwrap_or_else(|| {
        DateRange::trailing_days(end, DEFAULT_LOOKBACK_DAYS)
            .start()
            .unwrap_or(end)
    });
    let period1 = start.with_time(Time::MIDNIGHT).assume_utc().unix_timestamp();
    let period2 = (end.with_time(Time::MIDNIGHT).assume_utc() + Duration::days(1)).unix_timestamp();
    (period1, period2)
}

struct ChartParser<'a> {
    ticker: &'a Ticker,
}

impl PayloadParser for ChartParser<'_> {
    type Output = BTreeMap<Ticker, EquitySeries>;

    fn provider(&self) -> &str {
        "yahoo"
    }

    fn parse(&self, format: ResponseFormat, body: &str) -> Result<Self::Output, CoreError> {
        match format {
            ResponseFormat::Json => split_chart_by_symbol(body),
            ResponseFormat::Csv => {
                let rows = read_rows(
                    "yahoo",
                    body,
                    EQUITY_CSV_COLUMNS,
                    &[
                        CanonicalField::Open,
                        CanonicalField::High,
                        CanonicalField::Low,
                        CanonicalField::Close,
                    ],
                )?;
                let series = EquitySeries {
                    bars: bars_from(&rows),
                    ..EquitySeries::default()
                };
                Ok(BTreeMap::from([(self.ticker.clone(), series)]))
            }
        }
    }
}

impl BarSource for YahooSource {
    fn fetch_bars(
        &self,
        tickers: &[Ticker],
        interval: BarInterval,
        range: DateRange,
    ) -> Result<BTreeMap<Ticker, EquitySeries>, CoreError> {
        let mut out = BTreeMap::new();
        for ticker in tickers {
            // A chart response may already have carried this symbol.
            if out.contains_key(ticker) {
                continue;
            }
            let candidates = self.candidates(ticker, interval, range);
            let probed = self
                .prober
                .probe(ticker.as_str(), &candidates, &ChartParser { ticker })?;
            for (symbol, series) in probed.value {
                if tickers.contains(&symbol) {
                    out.insert(symbol, series);
                } else {
                    tracing::debug!(requested = %ticker, returned = %symbol, "dropping unrequested symbol");
                }
            }
        }
        Ok(out)
    }
}
