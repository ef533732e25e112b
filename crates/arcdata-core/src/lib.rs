//! Core of arcdata.
//!
//! This crate contains:
//! - Domain types and input validation
//! - The error taxonomy shared by every caller
//! - HTTP transport, request pacing and ordered endpoint probing
//! - Normalization of provider payloads into canonical rows
//! - Provider adapters, the read-through cache resolver and the filings cache
//! - The refresh job and the application context that wires it together

pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod filings;
pub mod http_client;
pub mod normalize;
pub mod probe;
pub mod providers;
pub mod refresh;
pub mod resolver;
pub mod source;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod throttling;

pub use config::ArcConfig;
pub use context::AppContext;
pub use domain::{Bar, BarInterval, DateRange, Observation, Ticker};
pub use error::{CoreError, ValidationError};
pub use filings::{Filing, FilingKind, FilingsCache};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use probe::{Candidate, PayloadParser, Prober, ResponseFormat, StatusClass};
pub use providers::{BarSource, SeriesPayload, SeriesSource};
pub use refresh::{refresh_all, RefreshPlan, RefreshReport};
pub use resolver::{CacheResolver, Origin, Resolved};
pub use source::SourceName;
#[cfg(any(test, feature = "test-support"))]
pub use testing::ScriptedHttpClient;
