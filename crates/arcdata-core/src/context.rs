use std::sync::Arc;

use arcdata_warehouse::Warehouse;

use crate::config::ArcConfig;
use crate::domain::{Bar, BarInterval, DateRange, Observation, Ticker};
use crate::filings::FilingsCache;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::providers::edgar::EdgarClient;
use crate::providers::fred::FredSource;
use crate::providers::statcan::StatCanSource;
use crate::providers::yahoo::YahooSource;
use crate::providers::{BarSource, SeriesSource};
use crate::resolver::{CacheResolver, Resolved};
use crate::throttling::{PacedHttpClient, RequestPacer};
use crate::{CoreError, SourceName, ValidationError};

/// Everything one process needs to serve requests: configuration, the opened
/// store and the shared HTTP transport. Dropping the context closes the store.
pub struct AppContext {
    config: ArcConfig,
    resolver: CacheResolver,
    http: Arc<dyn HttpClient>,
    edgar_http: Arc<dyn HttpClient>,
}

impl AppContext {
    /// Open the configured store and a real HTTP transport.
    ///
    /// Builds a blocking HTTP client, so call this outside any async runtime.
    pub fn open(config: ArcConfig) -> Result<Self, CoreError> {
        let warehouse = Warehouse::open(config.warehouse.clone())?;
        let http = ReqwestHttpClient::new(config.http_timeout_ms).map_err(|error| {
            CoreError::configuration(format!("could not build HTTP client: {error}"))
        })?;
        Ok(Self::with_parts(config, warehouse, Arc::new(http)))
    }

    /// Assemble a context from an already opened store and any transport.
    pub fn with_parts(config: ArcConfig, warehouse: Warehouse, http: Arc<dyn HttpClient>) -> Self {
        let pacer = RequestPacer::per_second(config.edgar_requests_per_second);
        let edgar_http: Arc<dyn HttpClient> =
            Arc::new(PacedHttpClient::new(Arc::clone(&http), pacer));
        Self {
            config,
            resolver: CacheResolver::new(warehouse),
            http,
            edgar_http,
        }
    }

    pub fn config(&self) -> &ArcConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CacheResolver {
        &self.resolver
    }

    pub fn warehouse(&self) -> &Warehouse {
        self.resolver.warehouse()
    }

    /// The single-value adapter for `source`.
    ///
    /// # Errors
    /// [`CoreError::Configuration`] when the economic source has no API key;
    /// [`ValidationError::NotASeriesSource`] for the equity source.
    pub fn series_source(&self, source: SourceName) -> Result<Box<dyn SeriesSource>, CoreError> {
        let timeout_ms = self.config.http_timeout_ms;
        match source {
            SourceName::Economic => {
                let api_key = self.config.require_fred_api_key()?;
                Ok(Box::new(FredSource::new(
                    Arc::clone(&self.http),
                    api_key,
                    timeout_ms,
                )?))
            }
            SourceName::StatisticalAgency => Ok(Box::new(StatCanSource::new(
                Arc::clone(&self.http),
                timeout_ms,
            ))),
            SourceName::Equity => Err(ValidationError::NotASeriesSource {
                value: source.to_string(),
            }
            .into()),
        }
    }

    pub fn bar_source(&self) -> YahooSource {
        YahooSource::new(Arc::clone(&self.http), self.config.http_timeout_ms)
    }

    pub fn get_series(
        &self,
        source: SourceName,
        key: &str,
        range: DateRange,
        use_cache: bool,
    ) -> Result<Resolved<Observation>, CoreError> {
        let adapter = self.series_source(source)?;
        self.resolver.get_series(adapter.as_ref(), key, range, use_cache)
    }

    pub fn get_bars(
        &self,
        ticker: &Ticker,
        interval: BarInterval,
        range: DateRange,
        use_cache: bool,
    ) -> Result<Resolved<Bar>, CoreError> {
        let source = self.bar_source();
        self.resolver
            .get_bars(&source as &dyn BarSource, ticker, interval, range, use_cache)
    }

    pub fn get_bars_many(
        &self,
        tickers: &[Ticker],
        interval: BarInterval,
        range: DateRange,
        use_cache: bool,
    ) -> Result<Vec<Resolved<Bar>>, CoreError> {
        let source = self.bar_source();
        self.resolver
            .get_bars_many(&source as &dyn BarSource, tickers, interval, range, use_cache)
    }

    /// Filing documents, paced to the SEC request budget.
    pub fn filings(&self) -> Result<FilingsCache, CoreError> {
        let client = EdgarClient::new(
            Arc::clone(&self.edgar_http),
            &self.config.edgar_user_agent,
            self.config.http_timeout_ms,
        )?;
        Ok(FilingsCache::new(self.warehouse().clone(), client))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::testing::ScriptedHttpClient;

    fn context(pairs: &[(&str, &str)], http: Arc<ScriptedHttpClient>) -> AppContext {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        let config = ArcConfig::from_lookup(|name| map.get(name).map(|value| (*value).to_owned()))
            .expect("config");
        let warehouse = Warehouse::open_in_memory().expect("warehouse");
        AppContext::with_parts(config, warehouse, http)
    }

    #[test]
    fn equity_is_not_a_series_source() {
        let ctx = context(&[], Arc::new(ScriptedHttpClient::new()));

        let error = ctx.series_source(SourceName::Equity).err().expect("rejected");
        assert!(matches!(
            error,
            CoreError::Validation(ValidationError::NotASeriesSource { .. })
        ));
    }

    #[test]
    fn missing_fred_key_fails_before_any_request() {
        let http = Arc::new(ScriptedHttpClient::new());
        let ctx = context(&[], http.clone());

        let error = ctx
            .get_series(SourceName::Economic, "CPIAUCSL", DateRange::unbounded(), true)
            .expect_err("no key");

        assert!(matches!(error, CoreError::Configuration(_)));
        assert_eq!(http.request_count(), 0);
    }
}
