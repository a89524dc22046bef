//! Access adapter errors

use std::path::PathBuf;
use thiserror::Error;

use svnlocal_fs::Revnum;

pub type Result<T> = std::result::Result<T, RaError>;

#[derive(Debug, Error)]
pub enum RaError {
    #[error("Unable to open an ra_local session to URL '{url}': {reason}")]
    InvalidLocation { url: String, reason: String },

    #[error("Unable to open repository at '{}': {source}", path.display())]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: svnlocal_fs::Error,
    },

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("'{}' is not the same repository as '{}'", switch_root.display(), session_root.display())]
    RepositoryMismatch {
        session_root: PathBuf,
        switch_root: PathBuf,
    },

    #[error("No such revision {revision} (youngest is {youngest})")]
    NoSuchRevision { revision: Revnum, youngest: Revnum },

    #[error("Target '{0}' is not a single entry name")]
    InvalidTarget(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Error writing to stream: unexpected end of file")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fs(#[from] svnlocal_fs::Error),
}

impl RaError {
    pub(crate) fn invalid_location(url: &str, reason: impl Into<String>) -> Self {
        RaError::InvalidLocation {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
