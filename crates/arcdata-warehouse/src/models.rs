//! Row types exchanged with the entity store.

use serde::Serialize;
use time::Date;

/// A cached series row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRecord {
    pub id: i64,
    pub source: String,
    pub natural_key: String,
    pub title: Option<String>,
    /// Last successful upsert, as DuckDB renders `TIMESTAMP`.
    pub last_updated: Option<String>,
    pub observation_count: i64,
}

/// One dated value of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationRecord {
    pub date: Date,
    pub value: f64,
}

/// A cached instrument row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentRecord {
    pub id: i64,
    pub ticker: String,
    pub company_name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub currency: Option<String>,
    pub metadata_fetched_at: Option<String>,
    pub bar_count: i64,
}

/// Optional descriptive fields of an instrument. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentMetadata {
    pub company_name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub currency: Option<String>,
}

impl InstrumentMetadata {
    pub fn is_empty(&self) -> bool {
        self.company_name.is_none()
            && self.exchange.is_none()
            && self.sector.is_none()
            && self.industry.is_none()
            && self.currency.is_none()
    }
}

/// One OHLCV bar with corporate actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarRecord {
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<i64>,
    pub dividends: f64,
    pub splits: f64,
}

/// Inclusive date bounds; a missing side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    pub start: Option<Date>,
    pub end: Option<Date>,
}

impl DateBounds {
    pub const UNBOUNDED: Self = Self {
        start: None,
        end: None,
    };

    pub const fn new(start: Option<Date>, end: Option<Date>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

/// Outcome of one remote fetch, as written to `fetch_log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLogEntry {
    pub request_id: String,
    pub source: String,
    pub natural_key: String,
    pub status: FetchStatus,
    pub row_count: Option<u64>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    Error,
}

impl FetchStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}
