use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::domain::Ticker;
use crate::http_client::HttpClient;
use crate::probe::{Candidate, JsonDocumentParser, Prober, ResponseFormat};
use crate::{CoreError, ValidationError};

pub const EDGAR_DATA_HOST: &str = "https://data.sec.gov";
pub const EDGAR_TICKER_MAP_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// SEC Central Index Key. Rendered zero-padded to ten digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cik(u64);

impl Cik {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("CIK")
            .or_else(|| trimmed.strip_prefix("cik"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidCik {
                value: trimmed.to_owned(),
            });
        }
        digits
            .parse()
            .map(Self)
            .map_err(|_| ValidationError::InvalidCik {
                value: trimmed.to_owned(),
            })
    }

    pub const fn from_number(value: u64) -> Self {
        Self(value)
    }

    pub fn padded(&self) -> String {
        format!("{:010}", self.0)
    }
}

impl Display for Cik {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.padded())
    }
}

/// One row of the SEC ticker directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerEntry {
    pub cik_str: u64,
    pub ticker: String,
    pub title: String,
}

/// Raw filing documents from SEC EDGAR.
pub struct EdgarClient {
    prober: Prober,
    data_host: String,
    ticker_map_url: String,
}

impl EdgarClient {
    /// # Errors
    /// [`CoreError::Configuration`] when `user_agent` is blank; SEC refuses anonymous clients.
    pub fn new(
        http: Arc<dyn HttpClient>,
        user_agent: &str,
        timeout_ms: u64,
    ) -> Result<Self, CoreError> {
        let user_agent = user_agent.trim();
        if user_agent.is_empty() {
            return Err(CoreError::configuration(
                "EDGAR_USER_AGENT must name the requester, e.g. \"app/1.0 (you@example.com)\"",
            ));
        }
        Ok(Self {
            prober: Prober::new(http)
                .with_timeout_ms(timeout_ms)
                .with_header("user-agent", user_agent)
                .with_header("accept", "application/json"),
            data_host: String::from(EDGAR_DATA_HOST),
            ticker_map_url: String::from(EDGAR_TICKER_MAP_URL),
        })
    }

    pub fn company_facts_url(&self, cik: Cik) -> String {
        format!("{}/api/xbrl/companyfacts/CIK{}.json", self.data_host, cik.padded())
    }

    pub fn submissions_url(&self, cik: Cik) -> String {
        format!("{}/submissions/CIK{}.json", self.data_host, cik.padded())
    }

    /// XBRL company facts for `cik`.
    pub fn company_facts(&self, cik: Cik) -> Result<Value, CoreError> {
        self.document(&cik.padded(), self.company_facts_url(cik))
    }

    /// Filing history for `cik`.
    pub fn submissions(&self, cik: Cik) -> Result<Value, CoreError> {
        self.document(&cik.padded(), self.submissions_url(cik))
    }

    /// The SEC ticker directory, keyed by uppercased ticker.
    pub fn ticker_directory(&self) -> Result<BTreeMap<Ticker, Cik>, CoreError> {
        let raw = self.document("company_tickers", self.ticker_map_url.clone())?;
        let entries: BTreeMap<String, TickerEntry> = serde_json::from_value(raw).map_err(|error| {
            CoreError::provider("edgar", format!("malformed ticker directory: {error}"))
        })?;

        let mut directory = BTreeMap::new();
        for entry in entries.into_values() {
            match Ticker::parse(&entry.ticker) {
                Ok(ticker) => {
                    directory.entry(ticker).or_insert(Cik::from_number(entry.cik_str));
                }
                Err(error) => {
                    tracing::trace!(ticker = %entry.ticker, %error, "skipping unparsable SEC ticker");
                }
            }
        }
        Ok(directory)
    }

    fn document(&self, key: &str, url: String) -> Result<Value, CoreError> {
        let candidates = [Candidate {
            url,
            format: ResponseFormat::Json,
        }];
        Ok(self
            .prober
            .probe(key, &candidates, &JsonDocumentParser::new("edgar"))?
            .value)
    }
}
