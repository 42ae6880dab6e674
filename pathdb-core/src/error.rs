//! Error and result types shared across the core crate.

use thiserror::Error;

/// Result type used across the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Which kind of record a lookup was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Node,
    Edge,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Node => f.write_str("node"),
            RecordKind::Edge => f.write_str("edge"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Point lookup miss. Callers often treat this as "absent".
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// Malformed pattern text; `nearby` holds the input around the failure.
    #[error("parse error: {message} (near `{nearby}`)")]
    Parse { message: String, nearby: String },

    /// A literal could not be converted to the stored field's type.
    #[error("cannot compare field `{field}` ({expected}) with literal {literal}")]
    PredicateType {
        field: String,
        literal: String,
        expected: &'static str,
    },

    /// Dereferencing or advancing an iterator that is already at its end.
    #[error("invalid iterator use: {0}")]
    InvalidIteratorUse(&'static str),

    /// The file was created with the other index layout.
    #[error("store was created as {stored}, cannot open it as {requested}")]
    LayoutMismatch {
        stored: String,
        requested: &'static str,
    },

    /// A stored payload could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Recoverable error reported by the key-value backend.
    #[error("backend error: {0}")]
    Backend(#[from] redb::Error),

    /// The backend could not be opened. Not expected to be recovered from.
    #[error("fatal backend error: {0}")]
    BackendFatal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>, nearby: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
            nearby: nearby.into(),
        }
    }

    pub(crate) fn node_not_found(id: &str) -> Self {
        Error::NotFound {
            kind: RecordKind::Node,
            id: id.to_owned(),
        }
    }

    pub(crate) fn edge_not_found(id: &str) -> Self {
        Error::NotFound {
            kind: RecordKind::Edge,
            id: id.to_owned(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

macro_rules! backend_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(err: $ty) -> Self {
                    Error::Backend(redb::Error::from(err))
                }
            }
        )*
    };
}

backend_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
);
