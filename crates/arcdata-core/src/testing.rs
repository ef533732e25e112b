//! Offline HTTP transport for tests.
//!
//! Compiled for this crate's own tests and, through the `test-support`
//! feature, for the behaviour suites in the workspace `tests/` directory.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Offline transport that answers from scripted routes and records every request.
///
/// A route matches when the request URL starts with it; the longest matching
/// route wins. Queued answers are consumed in order and the last one repeats.
/// Unmatched URLs answer 404.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    routes: Mutex<BTreeMap<String, VecDeque<Result<HttpResponse, HttpError>>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url_prefix: impl Into<String>, response: HttpResponse) -> Self {
        self.push(url_prefix.into(), Ok(response));
        self
    }

    pub fn fail(self, url_prefix: impl Into<String>, error: HttpError) -> Self {
        self.push(url_prefix.into(), Err(error));
        self
    }

    fn push(&self, route: String, answer: Result<HttpResponse, HttpError>) {
        self.routes
            .lock()
            .expect("scripted routes mutex poisoned")
            .entry(route)
            .or_default()
            .push_back(answer);
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("scripted requests mutex poisoned")
            .clone()
    }

    pub fn request_urls(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.url)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .expect("scripted requests mutex poisoned")
            .len()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = request.url.clone();
        self.requests
            .lock()
            .expect("scripted requests mutex poisoned")
            .push(request);

        let mut routes = self.routes.lock().expect("scripted routes mutex poisoned");
        let route = routes
            .keys()
            .filter(|route| url.starts_with(route.as_str()))
            .max_by_key(|route| route.len())
            .cloned();

        let Some(queue) = route.and_then(|route| routes.get_mut(&route)) else {
            return Ok(HttpResponse::not_found());
        };
        if queue.len() > 1 {
            if let Some(answer) = queue.pop_front() {
                return answer;
            }
        }
        queue
            .front()
            .cloned()
            .unwrap_or_else(|| Ok(HttpResponse::not_found()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_client_prefers_longest_route_and_repeats_last_answer() {
        let client = ScriptedHttpClient::new()
            .respond("https://example.test/", HttpResponse::ok("root"))
            .respond("https://example.test/a", HttpResponse::ok("first"))
            .respond("https://example.test/a", HttpResponse::ok("second"));

        let body = |url: &str| {
            client
                .execute(HttpRequest::get(url))
                .expect("scripted")
                .body
        };

        assert_eq!(body("https://example.test/a?x=1"), "first");
        assert_eq!(body("https://example.test/a?x=1"), "second");
        assert_eq!(body("https://example.test/a?x=1"), "second");
        assert_eq!(body("https://example.test/b"), "root");
        assert_eq!(
            client
                .execute(HttpRequest::get("https://other.test"))
                .expect("unmatched")
                .status,
            404
        );
        assert_eq!(client.request_count(), 5);
    }
}
