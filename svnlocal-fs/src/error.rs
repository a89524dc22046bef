//! Error type shared by the snapshot store and every editor driven over it

use std::path::PathBuf;

use crate::object::{ObjectId, Revnum};

/// Result type for store and editor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the snapshot store, its transactions and tree editors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("'{}' is not a repository", .0.display())]
    NotARepository(PathBuf),

    #[error("Unsupported repository format '{found}' at '{}'", .path.display())]
    UnsupportedFormat { path: PathBuf, found: String },

    #[error("No such revision {0}")]
    NoSuchRevision(Revnum),

    #[error("Path not found: '{0}'")]
    NotFound(String),

    #[error("Path already exists: '{0}'")]
    AlreadyExists(String),

    #[error("'{0}' is not a directory")]
    NotADirectory(String),

    #[error("'{0}' is not a file")]
    NotAFile(String),

    #[error("Conflict at '{path}'")]
    Conflict { path: String },

    #[error("'{path}' is out of date (base r{base}, last changed in r{changed})")]
    OutOfDate {
        path: String,
        base: Revnum,
        changed: Revnum,
    },

    #[error("Checksum mismatch for '{path}': expected {expected}, actual {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid text delta: {0}")]
    InvalidDelta(String),

    #[error("Hook '{name}' rejected the operation: {message}")]
    HookFailed { name: String, message: String },

    #[error("Report target '{0}' is not a single entry name")]
    InvalidTarget(String),

    #[error("Edit has already been closed or aborted")]
    EditorClosed,

    #[error("Editor error: {0}")]
    Editor(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Corrupt repository data: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl Error {
    /// True for errors that mean "the path is not there"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
