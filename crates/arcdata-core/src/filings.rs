//! Document cache for SEC filing payloads.
//!
//! Filing documents are stored whole, keyed by CIK, with no completeness
//! semantics: a stored document is served as-is until the caller bypasses the
//! cache. Ticker to CIK lookups are cached the same way.

use arcdata_warehouse::{DocumentKey, Warehouse};
use serde::Serialize;
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::domain::Ticker;
use crate::providers::edgar::{Cik, EdgarClient};
use crate::resolver::Origin;
use crate::CoreError;

pub const TICKER_COLLECTION: &str = "edgar_tickers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingKind {
    CompanyFacts,
    Submissions,
}

impl FilingKind {
    pub const fn collection(self) -> &'static str {
        match self {
            Self::CompanyFacts => "edgar_companyfacts",
            Self::Submissions => "edgar_submissions",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CompanyFacts => "company_facts",
            Self::Submissions => "submissions",
        }
    }
}

/// One raw filing document and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Filing {
    pub cik: Cik,
    pub kind: FilingKind,
    pub payload: Value,
    pub origin: Origin,
}

pub struct FilingsCache {
    warehouse: Warehouse,
    client: EdgarClient,
}

impl FilingsCache {
    pub fn new(warehouse: Warehouse, client: EdgarClient) -> Self {
        Self { warehouse, client }
    }

    pub fn company_facts(&self, ticker_or_cik: &str, use_cache: bool) -> Result<Filing, CoreError> {
        self.fetch(FilingKind::CompanyFacts, ticker_or_cik, use_cache)
    }

    pub fn submissions(&self, ticker_or_cik: &str, use_cache: bool) -> Result<Filing, CoreError> {
        self.fetch(FilingKind::Submissions, ticker_or_cik, use_cache)
    }

    pub fn fetch(
        &self,
        kind: FilingKind,
        ticker_or_cik: &str,
        use_cache: bool,
    ) -> Result<Filing, CoreError> {
        let cik = self.resolve_cik(ticker_or_cik, use_cache)?;
        let key = DocumentKey::new().with("cik", cik.padded());

        if use_cache {
            if let Some(stored) = self.warehouse.get_document(kind.collection(), &key)? {
                if let Some(payload) = stored.get("payload") {
                    tracing::info!(cik = %cik, kind = kind.as_str(), "filing cache hit");
                    return Ok(Filing {
                        cik,
                        kind,
                        payload: payload.clone(),
                        origin: Origin::Cache,
                    });
                }
            }
            tracing::info!(cik = %cik, kind = kind.as_str(), "filing cache miss");
        }

        let payload = match kind {
            FilingKind::CompanyFacts => self.client.company_facts(cik)?,
            FilingKind::Submissions => self.client.submissions(cik)?,
        };
        self.warehouse.upsert_document(
            kind.collection(),
            &json!({
                "cik": cik.padded(),
                "payload": payload,
                "fetched_at": OffsetDateTime::now_utc().unix_timestamp(),
            }),
            &["cik"],
        )?;

        Ok(Filing {
            cik,
            kind,
            payload,
            origin: Origin::Remote,
        })
    }

    /// Accepts a CIK (bare digits or `CIK`-prefixed) or a ticker symbol.
    pub fn resolve_cik(&self, ticker_or_cik: &str, use_cache: bool) -> Result<Cik, CoreError> {
        if let Ok(cik) = Cik::parse(ticker_or_cik) {
            return Ok(cik);
        }
        let ticker = Ticker::parse(ticker_or_cik)?;
        let key = DocumentKey::new().with("ticker", ticker.as_str());

        if use_cache {
            let stored = self.warehouse.get_document(TICKER_COLLECTION, &key)?;
            if let Some(cik) = stored
                .as_ref()
                .and_then(|doc| doc.get("cik"))
                .and_then(Value::as_str)
                .and_then(|raw| Cik::parse(raw).ok())
            {
                return Ok(cik);
            }
        }

        let directory = self.client.ticker_directory()?;
        let cik = *directory
            .get(&ticker)
            .ok_or_else(|| CoreError::not_found(ticker.as_str()))?;
        self.warehouse.upsert_document(
            TICKER_COLLECTION,
            &json!({ "ticker": ticker.as_str(), "cik": cik.padded() }),
            &["ticker"],
        )?;
        tracing::debug!(ticker = %ticker, cik = %cik, "resolved ticker to CIK");
        Ok(cik)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http_client::HttpResponse;
    use crate::testing::ScriptedHttpClient;
    use crate::providers::edgar::EDGAR_TICKER_MAP_URL;

    fn cache_with(http: Arc<ScriptedHttpClient>) -> FilingsCache {
        let warehouse = Warehouse::open_in_memory().expect("warehouse");
        let client = EdgarClient::new(http, "arcdata-test (ops@example.com)", 1_000).expect("client");
        FilingsCache::new(warehouse, client)
    }

    #[test]
    fn ticker_lookup_is_cached_as_a_document() {
        let http = Arc::new(ScriptedHttpClient::new().respond(
            EDGAR_TICKER_MAP_URL,
            HttpResponse::ok(r#"{"0":{"cik_str":789019,"ticker":"MSFT","title":"MICROSOFT CORP"}}"#),
        ));
        let cache = cache_with(http.clone());

        let first = cache.resolve_cik("msft", true).expect("cik");
        let second = cache.resolve_cik("MSFT", true).expect("cik");

        assert_eq!(first, Cik::from_number(789_019));
        assert_eq!(second, first);
        assert_eq!(http.request_count(), 1);
    }

    #[test]
    fn numeric_input_skips_the_directory() {
        let http = Arc::new(ScriptedHttpClient::new());
        let cache = cache_with(http.clone());

        assert_eq!(
            cache.resolve_cik("320193", true).expect("cik"),
            Cik::from_number(320_193)
        );
        assert_eq!(http.request_count(), 0);
    }

    #[test]
    fn unknown_ticker_is_not_found() {
        let http = Arc::new(
            ScriptedHttpClient::new().respond(EDGAR_TICKER_MAP_URL, HttpResponse::ok("{}")),
        );
        let cache = cache_with(http);

        let error = cache.resolve_cik("ZZZZ", true).expect_err("unknown");
        assert!(matches!(error, CoreError::NotFound { .. }));
    }
}
