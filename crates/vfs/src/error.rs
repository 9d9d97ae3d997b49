//! Error types for filesystem operations.

use std::io;

use remotefs_protocol::{ErrorName, RpcError};

/// Errors produced by a [`FileSystem`](crate::FileSystem) or one of its streams.
///
/// Every variant maps onto exactly one File API error name, so the service
/// can relay collaborator failures to the peer unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("security violation: {0}")]
    Security(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("path exists: {0}")]
    PathExists(String),

    #[error("invalid modification: {0}")]
    InvalidModification(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("no modification allowed: {0}")]
    NoModificationAllowed(String),

    #[error("not readable: {0}")]
    NotReadable(String),

    #[error("invalid name: {0}")]
    Encoding(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("aborted: {0}")]
    Abort(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl FsError {
    /// The File API error name this error is reported as.
    pub fn name(&self) -> ErrorName {
        match self {
            FsError::NotFound(_) => ErrorName::NotFound,
            FsError::Security(_) => ErrorName::Security,
            FsError::TypeMismatch(_) => ErrorName::TypeMismatch,
            FsError::PathExists(_) => ErrorName::PathExists,
            FsError::InvalidModification(_) => ErrorName::InvalidModification,
            FsError::InvalidState(_) => ErrorName::InvalidState,
            FsError::NoModificationAllowed(_) => ErrorName::NoModificationAllowed,
            FsError::NotReadable(_) => ErrorName::NotReadable,
            FsError::Encoding(_) => ErrorName::Encoding,
            FsError::NotSupported(_) => ErrorName::NotSupported,
            FsError::Abort(_) => ErrorName::Abort,
            FsError::QuotaExceeded(_) => ErrorName::QuotaExceeded,
            FsError::Io(_) => ErrorName::Unknown,
        }
    }

    fn detail(&self) -> &str {
        match self {
            FsError::NotFound(s)
            | FsError::Security(s)
            | FsError::TypeMismatch(s)
            | FsError::PathExists(s)
            | FsError::InvalidModification(s)
            | FsError::InvalidState(s)
            | FsError::NoModificationAllowed(s)
            | FsError::NotReadable(s)
            | FsError::Encoding(s)
            | FsError::NotSupported(s)
            | FsError::Abort(s)
            | FsError::QuotaExceeded(s)
            | FsError::Io(s) => s,
        }
    }

    /// Converts into the wire error relayed to the peer.
    pub fn to_rpc_error(&self) -> RpcError {
        RpcError::new(self.name(), self.detail())
    }
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        let msg = err.to_string();
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(msg),
            io::ErrorKind::PermissionDenied => FsError::Security(msg),
            io::ErrorKind::AlreadyExists => FsError::PathExists(msg),
            io::ErrorKind::DirectoryNotEmpty => FsError::InvalidModification(msg),
            io::ErrorKind::NotADirectory | io::ErrorKind::IsADirectory => {
                FsError::TypeMismatch(msg)
            }
            io::ErrorKind::StorageFull => FsError::QuotaExceeded(msg),
            _ => FsError::Io(msg),
        }
    }
}

impl From<&FsError> for RpcError {
    fn from(err: &FsError) -> Self {
        err.to_rpc_error()
    }
}

impl From<FsError> for RpcError {
    fn from(err: FsError) -> Self {
        err.to_rpc_error()
    }
}
