//! Store error definitions.

use thiserror::Error;

/// etcd v2 error codes the binding engine reacts to.
pub mod codes {
    pub const KEY_NOT_FOUND: u32 = 100;
    pub const NOT_FILE: u32 = 102;
    pub const NOT_DIR: u32 = 104;
    pub const NODE_EXIST: u32 = 105;
    pub const RAFT_INTERNAL: u32 = 300;
    pub const EVENT_INDEX_CLEARED: u32 = 401;
}

/// Errors returned by a [`Store`](super::Store) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Nothing is stored at the path.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A leaf operation targeted a directory.
    #[error("not a file: {0}")]
    NotFile(String),

    /// A directory operation went through a leaf.
    #[error("not a directory: {0}")]
    NotDir(String),

    /// The path is already taken.
    #[error("key already exists: {0}")]
    NodeExists(String),

    /// The requested watch index is older than the retained history.
    #[error("event index cleared: {0}")]
    EventIndexCleared(String),

    /// Any other error reported by the store, kept verbatim.
    #[error("store error {code}: {message} ({cause})")]
    Remote {
        code: u32,
        message: String,
        cause: String,
    },

    /// The store could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with something that could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Map an etcd v2 error body onto a variant.
    pub fn from_code(code: u32, message: impl Into<String>, cause: impl Into<String>) -> Self {
        let cause = cause.into();
        match code {
            codes::KEY_NOT_FOUND => StoreError::KeyNotFound(cause),
            codes::NOT_FILE => StoreError::NotFile(cause),
            codes::NOT_DIR => StoreError::NotDir(cause),
            codes::NODE_EXIST => StoreError::NodeExists(cause),
            codes::EVENT_INDEX_CLEARED => StoreError::EventIndexCleared(cause),
            _ => StoreError::Remote {
                code,
                message: message.into(),
                cause,
            },
        }
    }

    /// The etcd error code for this error, when it has one.
    pub fn code(&self) -> Option<u32> {
        match self {
            StoreError::KeyNotFound(_) => Some(codes::KEY_NOT_FOUND),
            StoreError::NotFile(_) => Some(codes::NOT_FILE),
            StoreError::NotDir(_) => Some(codes::NOT_DIR),
            StoreError::NodeExists(_) => Some(codes::NODE_EXIST),
            StoreError::EventIndexCleared(_) => Some(codes::EVENT_INDEX_CLEARED),
            StoreError::Remote { code, .. } => Some(*code),
            StoreError::Transport(_) | StoreError::Decode(_) => None,
        }
    }

    /// True for the one condition Save tolerates on directory creation.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::NodeExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::KeyNotFound(_))
    }
}
