//! Read-through cache over the entity store.
//!
//! A cached read is a hit when at least one stored row falls inside the
//! requested range; gaps inside the range are not detected. On a miss, or when
//! the cache is bypassed, the source is fetched, every fetched row is upserted,
//! and the rows inside the range are returned.

use std::time::Instant;

use arcdata_warehouse::{
    BarRecord, FetchLogEntry, FetchStatus, ObservationRecord, Warehouse,
};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Bar, BarInterval, DateRange, Observation, Ticker};
use crate::providers::{BarSource, SeriesSource};
use crate::{CoreError, SourceName};

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Cache,
    Remote,
}

impl Origin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Remote => "remote",
        }
    }
}

/// Rows for one key plus their origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub key: String,
    pub rows: Vec<T>,
    pub origin: Origin,
}

#[derive(Clone)]
pub struct CacheResolver {
    warehouse: Warehouse,
}

impl CacheResolver {
    pub fn new(warehouse: Warehouse) -> Self {
        Self { warehouse }
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// Observations for `key` from `source` within `range`.
    ///
    /// With `use_cache == false` the source is always fetched and the store
    /// refreshed, so this doubles as the refresh operation.
    pub fn get_series(
        &self,
        source: &dyn SeriesSource,
        key: &str,
        range: DateRange,
        use_cache: bool,
    ) -> Result<Resolved<Observation>, CoreError> {
        let name = source.source();
        let key = name.normalize_key(key)?;

        if use_cache {
            if let Some(series_id) = self.warehouse.find_series(name.as_str(), &key)? {
                let rows = self.warehouse.load_observations(series_id, range.to_bounds())?;
                if !rows.is_empty() {
                    tracing::info!(source = %name, key = %key, rows = rows.len(), "cache hit");
                    return Ok(Resolved {
                        key,
                        rows: rows.into_iter().map(Observation::from).collect(),
                        origin: Origin::Cache,
                    });
                }
            }
            tracing::info!(source = %name, key = %key, range = %range, "cache miss");
        }

        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let outcome = self.fetch_series_into_store(source, &key, range);
        self.log_fetch(&request_id, name, &key, started, outcome.as_ref().map(Vec::len));

        Ok(Resolved {
            key,
            rows: outcome?,
            origin: Origin::Remote,
        })
    }

    fn fetch_series_into_store(
        &self,
        source: &dyn SeriesSource,
        key: &str,
        range: DateRange,
    ) -> Result<Vec<Observation>, CoreError> {
        let name = source.source();
        let payload = source.fetch_series(key, range)?;

        let series_id = self
            .warehouse
            .resolve_series(name.as_str(), key, payload.title.as_deref())?;
        let records: Vec<ObservationRecord> =
            payload.observations.iter().map(ObservationRecord::from).collect();
        let written = self.warehouse.upsert_observations(series_id, &records)?;
        tracing::info!(source = %name, key, rows = written, "stored fetched observations");

        Ok(payload
            .observations
            .into_iter()
            .filter(|row| range.contains(row.date))
            .collect())
    }

    /// Bars for one ticker; see [`CacheResolver::get_bars_many`].
    pub fn get_bars(
        &self,
        source: &dyn BarSource,
        ticker: &Ticker,
        interval: BarInterval,
        range: DateRange,
        use_cache: bool,
    ) -> Result<Resolved<Bar>, CoreError> {
        self.get_bars_many(source, std::slice::from_ref(ticker), interval, range, use_cache)?
            .pop()
            .ok_or_else(|| CoreError::not_found(ticker.as_str()))
    }

    /// Bars for several tickers, one result per distinct ticker in request order.
    ///
    /// Each ticker is checked against the store on its own; every ticker that
    /// misses is fetched in a single source call and stored per ticker.
    pub fn get_bars_many(
        &self,
        source: &dyn BarSource,
        tickers: &[Ticker],
        interval: BarInterval,
        range: DateRange,
        use_cache: bool,
    ) -> Result<Vec<Resolved<Bar>>, CoreError> {
        let mut requested: Vec<Ticker> = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            if !requested.contains(ticker) {
                requested.push(ticker.clone());
            }
        }

        let mut results: Vec<Option<Resolved<Bar>>> = Vec::with_capacity(requested.len());
        let mut missing: Vec<Ticker> = Vec::new();
        for ticker in &requested {
            let cached = if use_cache {
                self.cached_bars(ticker, interval, range)?
            } else {
                None
            };
            match cached {
                Some(rows) => {
                    tracing::info!(ticker = %ticker, %interval, rows = rows.len(), "cache hit");
                    results.push(Some(Resolved {
                        key: ticker.to_string(),
                        rows,
                        origin: Origin::Cache,
                    }));
                }
                None => {
                    missing.push(ticker.clone());
                    results.push(None);
                }
            }
        }

        if !missing.is_empty() {
            tracing::info!(
                tickers = %missing.iter().map(Ticker::as_str).collect::<Vec<_>>().join(","),
                %interval,
                range = %range,
                "fetching missing tickers"
            );
            let request_id = Uuid::new_v4().to_string();
            let started = Instant::now();
            let mut fetched = match source.fetch_bars(&missing, interval, range) {
                Ok(fetched) => fetched,
                Err(error) => {
                    for ticker in &missing {
                        self.log_fetch(&request_id, SourceName::Equity, ticker.as_str(), started, Err(&error));
                    }
                    return Err(error);
                }
            };

            for (slot, ticker) in results.iter_mut().zip(&requested) {
                if slot.is_some() {
                    continue;
                }
                let outcome = match fetched.remove(ticker) {
                    Some(series) => self.store_bars(ticker, interval, range, series),
                    None => Err(CoreError::not_found(ticker.as_str())),
                };
                self.log_fetch(
                    &request_id,
                    SourceName::Equity,
                    ticker.as_str(),
                    started,
                    outcome.as_ref().map(Vec::len),
                );
                *slot = Some(Resolved {
                    key: ticker.to_string(),
                    rows: outcome?,
                    origin: Origin::Remote,
                });
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn cached_bars(
        &self,
        ticker: &Ticker,
        interval: BarInterval,
        range: DateRange,
    ) -> Result<Option<Vec<Bar>>, CoreError> {
        let Some(instrument_id) = self.warehouse.find_instrument(ticker.as_str())? else {
            return Ok(None);
        };
        let rows = self
            .warehouse
            .load_bars(instrument_id, interval.as_str(), range.to_bounds())?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.into_iter().map(Bar::from).collect()))
    }

    fn store_bars(
        &self,
        ticker: &Ticker,
        interval: BarInterval,
        range: DateRange,
        series: crate::normalize::equity::EquitySeries,
    ) -> Result<Vec<Bar>, CoreError> {
        let instrument_id = self.warehouse.resolve_instrument(ticker.as_str())?;
        self.warehouse
            .update_instrument_metadata(instrument_id, &series.metadata)?;
        let records: Vec<BarRecord> = series.bars.iter().map(BarRecord::from).collect();
        let written = self
            .warehouse
            .upsert_bars(instrument_id, interval.as_str(), &records)?;
        tracing::info!(ticker = %ticker, %interval, rows = written, "stored fetched bars");

        Ok(series
            .bars
            .into_iter()
            .filter(|bar| range.contains(bar.date))
            .collect())
    }

    /// Audit a remote fetch. A failing audit write never masks the fetch outcome.
    fn log_fetch(
        &self,
        request_id: &str,
        source: SourceName,
        key: &str,
        started: Instant,
        outcome: Result<usize, &CoreError>,
    ) {
        let latency_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;
        let entry = FetchLogEntry {
            request_id: request_id.to_owned(),
            source: source.as_str().to_owned(),
            natural_key: key.to_owned(),
            status: if outcome.is_ok() {
                FetchStatus::Ok
            } else {
                FetchStatus::Error
            },
            row_count: outcome.as_ref().ok().map(|rows| *rows as u64),
            latency_ms,
        };
        if let Err(error) = outcome {
            tracing::warn!(source = %source, key, code = error.code(), %error, "remote fetch failed");
        }
        if let Err(error) = self.warehouse.record_fetch(&entry) {
            tracing::warn!(%error, request_id, "could not write fetch log entry");
        }
    }
}
