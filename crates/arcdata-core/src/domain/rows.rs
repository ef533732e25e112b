use arcdata_warehouse::{BarRecord, ObservationRecord};
use serde::{Serialize, Serializer};
use time::Date;

use super::date::iso_date;

/// Canonical single-value row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    #[serde(serialize_with = "serialize_date")]
    pub date: Date,
    pub value: f64,
}

impl Observation {
    pub const fn new(date: Date, value: f64) -> Self {
        Self { date, value }
    }
}

/// Canonical OHLCV row with the corporate actions of that day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    #[serde(serialize_with = "serialize_date")]
    pub date: Date,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
    pub dividends: f64,
    pub splits: f64,
}

fn serialize_date<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&iso_date(*date))
}

impl From<ObservationRecord> for Observation {
    fn from(record: ObservationRecord) -> Self {
        Self {
            date: record.date,
            value: record.value,
        }
    }
}

impl From<&Observation> for ObservationRecord {
    fn from(row: &Observation) -> Self {
        Self {
            date: row.date,
            value: row.value,
        }
    }
}

impl From<BarRecord> for Bar {
    fn from(record: BarRecord) -> Self {
        Self {
            date: record.date,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume.map(|volume| volume.max(0).unsigned_abs()),
            dividends: record.dividends,
            splits: record.splits,
        }
    }
}

impl From<&Bar> for BarRecord {
    fn from(bar: &Bar) -> Self {
        Self {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume.map(|volume| i64::try_from(volume).unwrap_or(i64::MAX)),
            dividends: bar.dividends,
            splits: bar.splits,
        }
    }
}
