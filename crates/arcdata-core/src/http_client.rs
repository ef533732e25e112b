use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Default per-request timeout. Every request carries a finite timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// HTTP request envelope used by provider transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the timeout; zero is raised to one millisecond so no request waits forever.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }
}

/// HTTP response envelope returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn not_found() -> Self {
        Self::new(404, "")
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error: the request never produced a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    timed_out: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Blocking transport contract used by provider adapters.
pub trait HttpClient: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        (**self).execute(request)
    }
}

/// Production HTTP client using reqwest's blocking API.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::blocking::Client,
}

impl ReqwestHttpClient {
    /// Build a client whose requests never outlive `timeout_ms`.
    pub fn new(timeout_ms: u64) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("arcdata/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(timeout_ms.max(1)))
            .build()
            .map_err(|e| HttpError::new(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .client
            .get(&request.url)
            .timeout(Duration::from_millis(request.timeout_ms.max(1)));

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                HttpError::timeout(format!("request timeout: {e}"))
            } else if e.is_connect() {
                HttpError::new(format!("connection failed: {e}"))
            } else {
                HttpError::new(format!("request failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_normalizes_headers_and_timeout() {
        let request = HttpRequest::get("https://example.test")
            .with_header("User-Agent", "arcdata-test")
            .with_timeout_ms(0);

        assert_eq!(
            request.headers.get("user-agent").map(String::as_str),
            Some("arcdata-test")
        );
        assert_eq!(request.timeout_ms, 1);
    }
}
