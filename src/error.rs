use std::path::PathBuf;

use ::scraper::error::SelectorErrorKind;

use crate::model::PlayerRecord;

/// A single outbound request failed.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The request exceeded the per-call timeout.
    #[error("request timed out for {url}")]
    Timeout { url: String },

    /// Upstream answered 429; the cooldown has already been slept.
    #[error("rate limited by upstream for {url}")]
    RateLimited { url: String },

    /// Server returned a non-success HTTP status code.
    #[error("unexpected status {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// HTTP request failed (network, DNS, TLS, etc.).
    #[error("http request failed for {url}: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    /// Failed to read the response body.
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        source: reqwest::Error,
    },

    /// The listing URL could not be assembled.
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_owned(),
            }
        } else {
            FetchError::Transport {
                url: url.to_owned(),
                source: err,
            }
        }
    }
}

/// A completed job whose team column captured the competition label.
#[derive(thiserror::Error, Debug)]
#[error(
    "{offending_count} record(s) in {league} version {version} carry a competition name as team"
)]
pub struct ValidationFailure {
    pub league: String,
    pub version: u16,
    pub offending_count: usize,
    pub sample: Vec<PlayerRecord>,
}

/// All errors that can end a crawl job or a crate operation.
#[derive(thiserror::Error, Debug)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// The same page kept answering 429.
    #[error(
        "gave up on page {page} of {league} version {version} after {retries} rate-limited attempts"
    )]
    RateLimitExhausted {
        league: String,
        version: u16,
        page: u32,
        retries: u32,
    },

    /// A CSS selector string could not be parsed.
    #[error("invalid CSS selector: {0}")]
    Selector(String),

    #[error("unknown league code {0}")]
    UnknownLeague(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid dataset {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl<'a> From<SelectorErrorKind<'a>> for CrawlError {
    fn from(err: SelectorErrorKind<'a>) -> Self {
        CrawlError::Selector(err.to_string())
    }
}

impl CrawlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
