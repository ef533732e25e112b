//! Provider adapters. Each one knows its endpoints and payload shapes and
//! nothing about caching.

pub mod edgar;
pub mod fred;
pub mod statcan;
pub mod yahoo;

use std::collections::BTreeMap;

use crate::domain::{BarInterval, DateRange, Observation, Ticker};
use crate::normalize::equity::EquitySeries;
use crate::{CoreError, SourceName};

/// Rows fetched for one series key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SeriesPayload {
    pub title: Option<String>,
    pub observations: Vec<Observation>,
}

/// Capability: fetch raw observations for a key over a range.
pub trait SeriesSource: Send + Sync {
    fn source(&self) -> SourceName;

    /// `key` is already normalized for [`SeriesSource::source`].
    fn fetch_series(&self, key: &str, range: DateRange) -> Result<SeriesPayload, CoreError>;
}

/// Capability: fetch bars for several tickers at once.
pub trait BarSource: Send + Sync {
    /// Returns one entry per ticker the provider had data for.
    fn fetch_bars(
        &self,
        tickers: &[Ticker],
        interval: BarInterval,
        range: DateRange,
    ) -> Result<BTreeMap<Ticker, EquitySeries>, CoreError>;
}
