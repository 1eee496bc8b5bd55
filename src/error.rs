//! Error types shared by the retriever, store and fetch orchestrator

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid subscription URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("server returned HTTP {status} for {url}")]
    RemoteStatus { url: String, status: u16 },

    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("subscription {0} not found")]
    NotFound(i64),

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{failed} out of {total} sources failed to fetch")]
    BatchFailed { failed: usize, total: usize },
}

impl Error {
    /// Whether the failure came from the remote end (bad status or transport)
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::RemoteStatus { .. } | Error::Transport { .. })
    }

    /// HTTP status carried by a remote failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RemoteStatus { status, .. } => Some(*status),
            Error::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
