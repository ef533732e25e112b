use std::env;
use std::path::PathBuf;

use arcdata_warehouse::WarehouseConfig;

use crate::domain::Ticker;
use crate::http_client::DEFAULT_TIMEOUT_MS;
use crate::{CoreError, SourceName};

pub const DEFAULT_EDGAR_USER_AGENT: &str = "arcdata/0.1 (contact@example.com)";
pub const DEFAULT_WATCH_SERIES: [&str; 3] = ["CPIAUCSL", "FEDFUNDS", "UNRATE"];
pub const DEFAULT_WATCH_TICKERS: [&str; 1] = ["MSFT"];
/// SEC asks automated clients to stay at or below ten requests per second.
pub const DEFAULT_EDGAR_REQUESTS_PER_SECOND: u32 = 10;

/// Runtime settings, read from the environment and overridable by CLI flags.
#[derive(Debug, Clone)]
pub struct ArcConfig {
    pub warehouse: WarehouseConfig,
    pub fred_api_key: Option<String>,
    pub edgar_user_agent: String,
    pub http_timeout_ms: u64,
    pub edgar_requests_per_second: u32,
    /// Economic series refreshed even when not cached yet.
    pub watch_series: Vec<String>,
    /// Tickers refreshed when the store holds no instrument yet.
    pub watch_tickers: Vec<Ticker>,
}

impl ArcConfig {
    /// Settings from process environment variables.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Settings from an arbitrary variable lookup.
    ///
    /// Each setting `X` is read from `ARCDATA_X` first and then from plain `X`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = |name: &str| {
            lookup(&format!("ARCDATA_{name}"))
                .or_else(|| lookup(name))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let home = lookup("ARCDATA_HOME")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| lookup("HOME").map(|home| PathBuf::from(home).join(".arcdata")))
            .unwrap_or_else(|| PathBuf::from(".arcdata"));
        let mut warehouse = WarehouseConfig::under_home(home);
        if let Some(db_path) = lookup("ARCDATA_DB_PATH").filter(|value| !value.trim().is_empty()) {
            warehouse.db_path = PathBuf::from(db_path);
        }

        let http_timeout_ms = match setting("HTTP_TIMEOUT_MS") {
            Some(raw) => parse_positive("ARCDATA_HTTP_TIMEOUT_MS", &raw)?,
            None => DEFAULT_TIMEOUT_MS,
        };
        let edgar_requests_per_second = match setting("EDGAR_REQUESTS_PER_SECOND") {
            Some(raw) => {
                let value = parse_positive("ARCDATA_EDGAR_REQUESTS_PER_SECOND", &raw)?;
                u32::try_from(value).map_err(|_| {
                    CoreError::configuration("ARCDATA_EDGAR_REQUESTS_PER_SECOND is too large")
                })?
            }
            None => DEFAULT_EDGAR_REQUESTS_PER_SECOND,
        };

        let watch_series = match setting("WATCH_SERIES") {
            Some(raw) => split_list(&raw)
                .map(|key| SourceName::Economic.normalize_key(key))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| {
                    CoreError::configuration(format!("ARCDATA_WATCH_SERIES: {error}"))
                })?,
            None => DEFAULT_WATCH_SERIES.iter().map(|key| (*key).to_owned()).collect(),
        };
        let watch_tickers = split_list(
            setting("WATCH_TICKERS")
                .as_deref()
                .unwrap_or(&DEFAULT_WATCH_TICKERS.join(",")),
        )
        .map(Ticker::parse)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| CoreError::configuration(format!("ARCDATA_WATCH_TICKERS: {error}")))?;

        Ok(Self {
            warehouse,
            fred_api_key: setting("FRED_API_KEY"),
            edgar_user_agent: setting("EDGAR_USER_AGENT")
                .unwrap_or_else(|| String::from(DEFAULT_EDGAR_USER_AGENT)),
            http_timeout_ms,
            edgar_requests_per_second,
            watch_series,
            watch_tickers,
        })
    }

    /// Place the store under `home`, keeping an explicit database path if one was set.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let default_db = self.warehouse.arcdata_home.join("cache").join("arcdata.duckdb");
        let relocated = WarehouseConfig::under_home(home);
        if self.warehouse.db_path == default_db {
            self.warehouse.db_path = relocated.db_path;
        }
        self.warehouse.arcdata_home = relocated.arcdata_home;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Result<Self, CoreError> {
        if timeout_ms == 0 {
            return Err(CoreError::configuration(
                "HTTP timeout must be greater than zero",
            ));
        }
        self.http_timeout_ms = timeout_ms;
        Ok(self)
    }

    /// API key for the economic source, or the configuration error that explains its absence.
    pub fn require_fred_api_key(&self) -> Result<&str, CoreError> {
        self.fred_api_key.as_deref().ok_or_else(|| {
            CoreError::configuration(
                "FRED_API_KEY is not set; export it (or ARCDATA_FRED_API_KEY) to query economic series",
            )
        })
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u64, CoreError> {
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(CoreError::configuration(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}
