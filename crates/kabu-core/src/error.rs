use chrono::NaiveDate;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures of the upstream market-data service.
///
/// A symbol that simply has no rows in range is *not* a `FetchError`; the
/// fetcher reports it as missing columns instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("[{symbol}] request failed: {source}")]
    Request {
        symbol: String,
        #[source]
        source: BoxError,
    },

    #[error("[{symbol}] upstream responded with HTTP {status}")]
    Status { symbol: String, status: u16 },

    #[error("[{symbol}] rate limited by upstream, try again later")]
    RateLimited { symbol: String },

    #[error("[{symbol}] malformed response: {reason}")]
    Decode { symbol: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DashError {
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("failed to fetch market data: {0}")]
    Fetch(#[from] FetchError),

    #[error("column `{0}` is missing from the table")]
    MissingColumn(String),

    #[error("moving average window must be at least 1")]
    InvalidWindow,
}

impl DashError {
    /// Whether the error aborts the current render cycle.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DashError::MissingColumn(_))
    }
}
