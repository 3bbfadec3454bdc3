//! Errors surfaced by link extraction, selection parsing and file transfers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Request could not be sent or the connection failed.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-2xx status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Body stream broke off mid-transfer.
    #[error("error while reading response body from {url}: {source}")]
    Stream {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Listing page body could not be read as HTML text.
    #[error("could not parse listing page {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid selection '{token}': not a number")]
    InvalidSelection { token: String },

    #[error("invalid selection {index}: expected a number between 1 and {available}")]
    SelectionOutOfRange { index: usize, available: usize },

    #[error("IO error writing to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The task running the transfer died before reporting back.
    #[error("download of {url} aborted: {reason}")]
    Aborted { url: String, reason: String },
}

impl Error {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
