//! Error taxonomy for Save, Load and Watch.

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by the binding engine. Traversal stops at the first one.
#[derive(Debug, Error)]
pub enum Error {
    /// The bound value is not a structure.
    #[error("{type_name} is not a structure")]
    Structural { type_name: &'static str },

    /// Leaf/directory mismatch, or a value that does not parse as the field's type.
    #[error("type mismatch at {path}: {reason}")]
    TypeMismatch { path: String, reason: String },

    /// A store call failed with an error Save/Load does not tolerate.
    #[error("store operation failed at {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },

    /// Load found an unallocated map.
    #[error("map at {path} must be allocated before loading")]
    NilDestination { path: String },

    /// Watch was asked for a field that Save or register never saw.
    #[error("field of type {type_name} is not registered; save or register the configuration first")]
    Unregistered { type_name: &'static str },

    /// The watch task panicked or was aborted.
    #[error("watch task failed: {0}")]
    WatchTask(String),

    /// The store client could not be built.
    #[error("store client setup failed: {0}")]
    Setup(#[source] StoreError),
}

/// Result type for binding operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn store(path: &str, source: StoreError) -> Self {
        Error::Store {
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn type_mismatch(path: &str, reason: impl Into<String>) -> Self {
        Error::TypeMismatch {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// The absolute store path the error is annotated with, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::TypeMismatch { path, .. }
            | Error::Store { path, .. }
            | Error::NilDestination { path } => Some(path),
            _ => None,
        }
    }

    /// The underlying store error, if the failure came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Error::Store { source, .. } | Error::Setup(source) => Some(source),
            _ => None,
        }
    }
}
