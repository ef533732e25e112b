use std::num::NonZeroU32;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token-bucket pacing for providers that publish a request budget.
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Arc<DirectRateLimiter>,
    clock: DefaultClock,
}

impl RequestPacer {
    pub fn per_second(requests: u32) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(burst))),
            clock: DefaultClock::default(),
        }
    }

    /// Take one token, or report how long until one is available.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Block the calling thread until a token is available.
    pub fn acquire(&self) {
        while let Err(delay) = self.try_acquire() {
            tracing::trace!(delay_ms = delay.as_millis() as u64, "request paced");
            thread::sleep(delay);
        }
    }
}

/// Transport wrapper that paces every request through a [`RequestPacer`].
pub struct PacedHttpClient<C> {
    inner: C,
    pacer: RequestPacer,
}

impl<C: HttpClient> PacedHttpClient<C> {
    pub fn new(inner: C, pacer: RequestPacer) -> Self {
        Self { inner, pacer }
    }
}

impl<C: HttpClient> HttpClient for PacedHttpClient<C> {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.pacer.acquire();
        self.inner.execute(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHttpClient;

    #[test]
    fn burst_is_bounded_by_the_quota() {
        let pacer = RequestPacer::per_second(2);

        assert!(pacer.try_acquire().is_ok());
        assert!(pacer.try_acquire().is_ok());
        let delay = pacer.try_acquire().expect_err("third request in the same second");
        assert!(delay <= Duration::from_secs(1));
    }

    #[test]
    fn paced_client_forwards_requests() {
        let scripted = Arc::new(
            ScriptedHttpClient::new().respond("https://example.test", HttpResponse::ok("{}")),
        );
        let client = PacedHttpClient::new(Arc::clone(&scripted), RequestPacer::per_second(10));

        let response = client
            .execute(HttpRequest::get("https://example.test/x"))
            .expect("response");

        assert!(response.is_success());
        assert_eq!(scripted.request_count(), 1);
    }
}
