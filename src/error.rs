use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the download pipeline.
///
/// Per-resource variants (`NoDownloadLinkFound`, `RedirectResolutionFailed`,
/// `TransferFailed`) are recorded by the batch operations and never abort
/// sibling work. `RemoteSizeUnknown` only ever reaches the reconciliation step,
/// which turns it into a skip.
#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("no download link found on {url}")]
    NoDownloadLinkFound { url: String },

    #[error("no episodes found on {url}")]
    NoEpisodesFound { url: String },

    #[error("could not resolve download redirect for {url}: {reason}")]
    RedirectResolutionFailed { url: String, reason: String },

    #[error("transfer of {url} failed: {reason}")]
    TransferFailed { url: String, reason: String },

    #[error("remote size of {url} is unknown")]
    RemoteSizeUnknown { url: String },

    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("session store error: {0}")]
    Session(String),
}

impl Error {
    pub(crate) fn http(url: impl ToString, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn transfer(url: impl ToString, reason: impl ToString) -> Self {
        Self::TransferFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether a retry of the same transfer can make progress.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TransferFailed { .. } | Error::Http { .. } => true,
            Error::HttpStatus { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}
