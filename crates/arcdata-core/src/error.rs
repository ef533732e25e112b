use arcdata_warehouse::WarehouseError;
use thiserror::Error;

/// Input validation errors raised before any I/O happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },
    #[error("ticker must start with an ASCII letter or '^': '{ch}'")]
    TickerInvalidStart { ch: char },
    #[error("ticker contains invalid character '{ch}' at index {index}")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("series key cannot be empty")]
    EmptySeriesKey,
    #[error("series key '{value}' contains invalid character '{ch}'")]
    SeriesKeyInvalidChar { value: String, ch: char },

    #[error("invalid interval '{value}', expected one of 1d, 5d, 1wk, 1mo, 3mo")]
    InvalidInterval { value: String },
    #[error("invalid source '{value}', expected one of economic, equity, statistical-agency")]
    InvalidSource { value: String },
    #[error("source '{value}' serves bars, not single-value series")]
    NotASeriesSource { value: String },

    #[error("invalid date '{value}', expected YYYY-MM-DD, YYYY-MM or YYYY")]
    InvalidDate { value: String },
    #[error("range start {start} is after end {end}")]
    InvalidRange { start: String, end: String },

    #[error("CIK must be 1 to 10 digits: '{value}'")]
    InvalidCik { value: String },
}

/// Error taxonomy shared by every cache, probe and store operation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Every endpoint candidate reported the key as missing.
    #[error("no data found for '{key}'")]
    NotFound { key: String },

    /// The provider answered but rejected the request or sent an unusable payload.
    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },

    /// Connection failure, timeout, or an HTTP status outside the not-found class.
    #[error("transport error{}: {message}", url_suffix(.url))]
    Transport {
        url: Option<String>,
        status: Option<u16>,
        message: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] WarehouseError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

fn url_suffix(url: &Option<String>) -> String {
    url.as_deref()
        .map(|url| format!(" for {url}"))
        .unwrap_or_default()
}

impl CoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn transport(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: Some(url.into()),
            status,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Stable machine-readable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "core.validation",
            Self::NotFound { .. } => "core.not_found",
            Self::Provider { .. } => "core.provider",
            Self::Transport { .. } => "core.transport",
            Self::Storage(_) => "core.storage",
            Self::Configuration(_) => "core.configuration",
        }
    }
}
