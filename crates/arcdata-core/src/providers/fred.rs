use std::sync::Arc;

use crate::domain::{iso_date, DateRange};
use crate::http_client::{HttpClient, HttpResponse};
use crate::normalize::economic::{is_unknown_series_message, parse_fred_observations};
use crate::probe::{Candidate, PayloadParser, Prober, ResponseFormat, StatusClass};
use crate::providers::{SeriesPayload, SeriesSource};
use crate::{CoreError, SourceName};

pub const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";

/// Economic series from FRED.
pub struct FredSource {
    prober: Prober,
    api_key: String,
}

impl FredSource {
    /// # Errors
    /// [`CoreError::Configuration`] when `api_key` is blank.
    pub fn new(http: Arc<dyn HttpClient>, api_key: &str, timeout_ms: u64) -> Result<Self, CoreError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(CoreError::configuration(
                "FRED_API_KEY is not set; the economic source needs an API key",
            ));
        }
        Ok(Self {
            prober: Prober::new(http).with_timeout_ms(timeout_ms),
            api_key: api_key.to_owned(),
        })
    }

    fn observations_url(&self, series_id: &str, range: DateRange) -> String {
        let mut url = format!(
            "{FRED_BASE_URL}/series/observations?series_id={}&api_key={}&file_type=json",
            urlencoding::encode(series_id),
            urlencoding::encode(&self.api_key),
        );
        if let Some(start) = range.start() {
            url.push_str(&format!("&observation_start={}", iso_date(start)));
        }
        if let Some(end) = range.end() {
            url.push_str(&format!("&observation_end={}", iso_date(end)));
        }
        url
    }
}

struct FredParser;

impl PayloadParser for FredParser {
    type Output = SeriesPayload;

    fn provider(&self) -> &str {
        "fred"
    }

    fn parse(&self, _format: ResponseFormat, body: &str) -> Result<SeriesPayload, CoreError> {
        Ok(SeriesPayload {
            title: None,
            observations: parse_fred_observations(body)?,
        })
    }

    fn classify(&self, response: &HttpResponse) -> StatusClass {
        match response.status {
            200..=299 => StatusClass::Success,
            404 => StatusClass::NotFound,
            400 if is_unknown_series_message(&response.body) => StatusClass::NotFound,
            _ => StatusClass::Abort,
        }
    }
}

impl SeriesSource for FredSource {
    fn source(&self) -> SourceName {
        SourceName::Economic
    }

    fn fetch_series(&self, key: &str, range: DateRange) -> Result<SeriesPayload, CoreError> {
        let candidates = [Candidate {
            url: self.observations_url(key, range),
            format: ResponseFormat::Json,
        }];
        let mut payload = self.prober.probe(key, &candidates, &FredParser)?.value;
        payload.title.get_or_insert_with(|| key.to_owned());
        Ok(payload)
    }
}
