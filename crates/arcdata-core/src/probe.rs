//! Ordered endpoint probing for providers with several unstable endpoint variants.
//!
//! Candidates are tried strictly in order. Each answer is classified into one
//! of three outcomes: try the next candidate (the key is not served there),
//! abort the whole probe, or parse the body. The first body that parses wins.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::http_client::{HttpClient, HttpRequest, HttpResponse, DEFAULT_TIMEOUT_MS};
use crate::CoreError;

/// Wire format a candidate answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseFormat {
    Json,
    Csv,
}

impl ResponseFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// One concrete URL to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub format: ResponseFormat,
}

/// Base hosts crossed with path suffixes.
#[derive(Debug, Clone, Default)]
pub struct EndpointPlan {
    hosts: Vec<String>,
    suffixes: Vec<(String, ResponseFormat)>,
}

impl EndpointPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, base: impl Into<String>) -> Self {
        self.hosts.push(base.into());
        self
    }

    pub fn suffix(mut self, path: impl Into<String>, format: ResponseFormat) -> Self {
        self.suffixes.push((path.into(), format));
        self
    }

    /// Every host/suffix pair, host-major then suffix-minor.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.hosts
            .iter()
            .flat_map(|host| {
                self.suffixes.iter().map(move |(path, format)| Candidate {
                    url: format!("{host}{path}"),
                    format: *format,
                })
            })
            .collect()
    }
}

/// What a response status means for the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Parse the body.
    Success,
    /// The key is not served by this candidate; try the next one.
    NotFound,
    /// Stop probing with a transport error.
    Abort,
}

/// Provider-specific interpretation of candidate responses.
pub trait PayloadParser {
    type Output;

    /// Provider label used in errors and logs.
    fn provider(&self) -> &str;

    /// Turn a successful body into canonical output. Errors here are final.
    fn parse(&self, format: ResponseFormat, body: &str) -> Result<Self::Output, CoreError>;

    fn classify(&self, response: &HttpResponse) -> StatusClass {
        if response.is_success() {
            StatusClass::Success
        } else if response.status == 404 {
            StatusClass::NotFound
        } else {
            StatusClass::Abort
        }
    }
}

/// Output of a successful probe.
#[derive(Debug, Clone, PartialEq)]
pub struct Probed<T> {
    pub value: T,
    pub candidate: Candidate,
    /// Number of requests issued, including the winning one.
    pub attempts: usize,
}

/// Stateless driver that walks a candidate list.
#[derive(Clone)]
pub struct Prober {
    http: Arc<dyn HttpClient>,
    timeout_ms: u64,
    headers: BTreeMap<String, String>,
}

impl Prober {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Try `candidates` in order for `key`.
    ///
    /// # Errors
    /// - [`CoreError::Transport`] on a transport failure or a status the parser classifies as abort
    /// - whatever the parser returns for the first successful body
    /// - [`CoreError::NotFound`] naming `key` when every candidate is not-found
    pub fn probe<P: PayloadParser>(
        &self,
        key: &str,
        candidates: &[Candidate],
        parser: &P,
    ) -> Result<Probed<P::Output>, CoreError> {
        for (index, candidate) in candidates.iter().enumerate() {
            let mut request =
                HttpRequest::get(candidate.url.as_str()).with_timeout_ms(self.timeout_ms);
            for (name, value) in &self.headers {
                request = request.with_header(name.as_str(), value.as_str());
            }

            tracing::debug!(
                provider = parser.provider(),
                key,
                url = %candidate.url,
                format = candidate.format.as_str(),
                attempt = index + 1,
                "probing endpoint"
            );

            let response = self.http.execute(request).map_err(|error| {
                tracing::warn!(
                    provider = parser.provider(),
                    key,
                    url = %candidate.url,
                    error = %error,
                    "probe aborted on transport failure"
                );
                CoreError::transport(candidate.url.as_str(), None, error.message())
            })?;

            match parser.classify(&response) {
                StatusClass::NotFound => {
                    tracing::debug!(
                        provider = parser.provider(),
                        key,
                        url = %candidate.url,
                        status = response.status,
                        "endpoint does not serve key, trying next"
                    );
                }
                StatusClass::Abort => {
                    tracing::warn!(
                        provider = parser.provider(),
                        key,
                        url = %candidate.url,
                        status = response.status,
                        "probe aborted on unexpected status"
                    );
                    return Err(CoreError::transport(
                        candidate.url.as_str(),
                        Some(response.status),
                        format!("unexpected HTTP status {}", response.status),
                    ));
                }
                StatusClass::Success => {
                    let value = parser.parse(candidate.format, &response.body)?;
                    return Ok(Probed {
                        value,
                        candidate: candidate.clone(),
                        attempts: index + 1,
                    });
                }
            }
        }

        Err(CoreError::not_found(key))
    }
}

/// Parser that returns the body as a JSON document, for non-tabular payloads.
#[derive(Debug, Clone)]
pub struct JsonDocumentParser {
    provider: String,
}

impl JsonDocumentParser {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

impl PayloadParser for JsonDocumentParser {
    type Output = serde_json::Value;

    fn provider(&self) -> &str {
        &self.provider
    }

    fn parse(&self, format: ResponseFormat, body: &str) -> Result<Self::Output, CoreError> {
        if format != ResponseFormat::Json {
            return Err(CoreError::provider(
                self.provider.as_str(),
                format!("expected a JSON document, endpoint serves {}", format.as_str()),
            ));
        }
        serde_json::from_str(body).map_err(|error| {
            CoreError::provider(self.provider.as_str(), format!("malformed JSON document: {error}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpError;
    use crate::testing::ScriptedHttpClient;

    struct EchoParser;

    impl PayloadParser for EchoParser {
        type Output = String;

        fn provider(&self) -> &str {
            "echo"
        }

        fn parse(&self, _format: ResponseFormat, body: &str) -> Result<String, CoreError> {
            if body == "bad" {
                return Err(CoreError::provider("echo", "bad body"));
            }
            Ok(body.to_owned())
        }
    }

    fn candidates(urls: &[&str]) -> Vec<Candidate> {
        urls.iter()
            .map(|url| Candidate {
                url: (*url).to_owned(),
                format: ResponseFormat::Json,
            })
            .collect()
    }

    #[test]
    fn plan_is_host_major() {
        let plan = EndpointPlan::new()
            .host("https://a")
            .host("https://b")
            .suffix("/x", ResponseFormat::Json)
            .suffix("/y", ResponseFormat::Csv);

        let urls: Vec<String> = plan.candidates().into_iter().map(|c| c.url).collect();

        assert_eq!(urls, vec!["https://a/x", "https://a/y", "https://b/x", "https://b/y"]);
    }

    #[test]
    fn parse_failure_on_first_success_is_final() {
        let http = Arc::new(
            ScriptedHttpClient::new()
                .respond("https://a", HttpResponse::ok("bad"))
                .respond("https://b", HttpResponse::ok("good")),
        );
        let prober = Prober::new(http.clone());

        let error = prober
            .probe("K", &candidates(&["https://a", "https://b"]), &EchoParser)
            .expect_err("parse failure");

        assert!(matches!(error, CoreError::Provider { .. }));
        assert_eq!(http.request_count(), 1);
    }

    #[test]
    fn connection_failure_aborts() {
        let http = Arc::new(
            ScriptedHttpClient::new()
                .fail("https://a", HttpError::timeout("timed out"))
                .respond("https://b", HttpResponse::ok("good")),
        );
        let prober = Prober::new(http.clone());

        let error = prober
            .probe("K", &candidates(&["https://a", "https://b"]), &EchoParser)
            .expect_err("transport failure");

        assert!(matches!(
            error,
            CoreError::Transport { status: None, .. }
        ));
        assert_eq!(http.request_count(), 1);
    }

    #[test]
    fn headers_and_timeout_are_attached_to_every_attempt() {
        let http = Arc::new(ScriptedHttpClient::new());
        let prober = Prober::new(http.clone())
            .with_timeout_ms(1_234)
            .with_header("User-Agent", "arcdata-test");

        let _ = prober.probe("K", &candidates(&["https://a", "https://b"]), &EchoParser);

        let requests = http.requests();
        assert_eq!(requests.len(), 2);
        for request in requests {
            assert_eq!(request.timeout_ms, 1_234);
            assert_eq!(
                request.headers.get("user-agent").map(String::as_str),
                Some("arcdata-test")
            );
        }
    }

    #[test]
    fn json_document_parser_rejects_csv_candidates() {
        let parser = JsonDocumentParser::new("edgar");
        assert!(parser.parse(ResponseFormat::Csv, "a,b").is_err());
        assert_eq!(
            parser
                .parse(ResponseFormat::Json, r#"{"cik":1}"#)
                .expect("json")["cik"],
            1
        );
    }
}
