//! Error taxonomy for the store.
//!
//! Errors are compared by [`ErrorKind`], never by message text.

use std::fmt;
use std::io;
use thiserror::Error;

/// Which part of a record was being streamed when an I/O error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Header,
    ContentType,
    Body,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Header => write!(f, "header"),
            Stage::ContentType => write!(f, "content-type"),
            Stage::Body => write!(f, "content"),
        }
    }
}

/// Errors returned by [`Store`](crate::Store) construction and operations.
#[derive(Debug, Error)]
pub enum CasError {
    #[error("missing option to configure hash function to use")]
    MissingHashFunc,

    #[error("missing kv backend")]
    MissingKvBackend,

    #[error("content-type is too big: {len} bytes, must be at most 127")]
    ContentTypeTooBig { len: usize },

    #[error("body is too big: {len} bytes, must be less than 4GiB")]
    BodyTooBig { len: usize },

    #[error("unable to calculate hash key: unable to write {stage}")]
    KeyDerivation {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("unable to write {stage}")]
    Write {
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("unable to commit record")]
    Commit {
        #[source]
        source: io::Error,
    },

    #[error("unable to read {stage}")]
    Read {
        stage: Stage,
        #[source]
        source: io::Error,
    },
}

/// Closed set of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingHashFunc,
    MissingKvBackend,
    ContentTypeTooBig,
    BodyTooBig,
    KeyDerivation,
    Write,
    Commit,
    Read,
}

impl CasError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CasError::MissingHashFunc => ErrorKind::MissingHashFunc,
            CasError::MissingKvBackend => ErrorKind::MissingKvBackend,
            CasError::ContentTypeTooBig { .. } => ErrorKind::ContentTypeTooBig,
            CasError::BodyTooBig { .. } => ErrorKind::BodyTooBig,
            CasError::KeyDerivation { .. } => ErrorKind::KeyDerivation,
            CasError::Write { .. } => ErrorKind::Write,
            CasError::Commit { .. } => ErrorKind::Commit,
            CasError::Read { .. } => ErrorKind::Read,
        }
    }

    /// True for a failed header read that looks like an absent key.
    ///
    /// The store does not otherwise distinguish "not found" from "unreadable".
    pub fn is_not_found(&self) -> bool {
        match self {
            CasError::Read {
                stage: Stage::Header,
                source,
            } => matches!(
                source.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CasError>;
