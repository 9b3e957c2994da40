use chrono::NaiveDate;

/// Central error type for the catrec system.
#[derive(Debug, thiserror::Error)]
pub enum CatrecError {
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("credential error: {message}")]
    CredentialError { message: String },

    #[error("report error: {message}")]
    Report { message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Outcome of a failed catalog request.
///
/// `Transient` describes a single attempt and is retried by the fetcher.
/// Callers only ever observe `Exhausted` or `Cancelled`, and must read
/// `Exhausted` as "no data for this attempt", not as a fatal condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("transient failure fetching {url}: {message}")]
    Transient { url: String, message: String },

    #[error("gave up on {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("request to {url} cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled { .. })
    }
}

/// The expected pattern was absent from a response body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pattern {pattern:?} not found in response from {url}")]
pub struct ParseError {
    pub pattern: String,
    pub url: String,
}
