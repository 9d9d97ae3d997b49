use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ERR_CODE_BAD_REQUEST, ERR_CODE_CONFLICT, ERR_CODE_FORBIDDEN, ERR_CODE_GONE,
    ERR_CODE_INSUFFICIENT_STORAGE, ERR_CODE_INTERNAL, ERR_CODE_NOT_FOUND,
    ERR_CODE_NOT_IMPLEMENTED, ERR_CODE_UNPROCESSABLE,
};

/// File API error names as seen by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorName {
    #[serde(rename = "NotFoundError")]
    NotFound,
    #[serde(rename = "SecurityError")]
    Security,
    #[serde(rename = "AbortError")]
    Abort,
    #[serde(rename = "NotReadableError")]
    NotReadable,
    #[serde(rename = "EncodingError")]
    Encoding,
    #[serde(rename = "NoModificationAllowedError")]
    NoModificationAllowed,
    #[serde(rename = "InvalidStateError")]
    InvalidState,
    #[serde(rename = "SyntaxError")]
    Syntax,
    #[serde(rename = "InvalidModificationError")]
    InvalidModification,
    #[serde(rename = "QuotaExceededError")]
    QuotaExceeded,
    #[serde(rename = "TypeMismatchError")]
    TypeMismatch,
    #[serde(rename = "PathExistsError")]
    PathExists,
    #[serde(rename = "NotSupportedError")]
    NotSupported,
    #[serde(rename = "UnknownError")]
    #[serde(other)]
    Unknown,
}

impl ErrorName {
    /// Numeric code sent alongside the name.
    pub fn code(self) -> i32 {
        match self {
            ErrorName::NotFound => ERR_CODE_NOT_FOUND,
            ErrorName::Security | ErrorName::NoModificationAllowed => ERR_CODE_FORBIDDEN,
            ErrorName::Abort => ERR_CODE_GONE,
            ErrorName::InvalidState | ErrorName::PathExists | ErrorName::InvalidModification => {
                ERR_CODE_CONFLICT
            }
            ErrorName::Syntax | ErrorName::TypeMismatch => ERR_CODE_BAD_REQUEST,
            ErrorName::Encoding | ErrorName::NotReadable => ERR_CODE_UNPROCESSABLE,
            ErrorName::QuotaExceeded => ERR_CODE_INSUFFICIENT_STORAGE,
            ErrorName::NotSupported => ERR_CODE_NOT_IMPLEMENTED,
            ErrorName::Unknown => ERR_CODE_INTERNAL,
        }
    }

    /// Wire name, e.g. `"NotSupportedError"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorName::NotFound => "NotFoundError",
            ErrorName::Security => "SecurityError",
            ErrorName::Abort => "AbortError",
            ErrorName::NotReadable => "NotReadableError",
            ErrorName::Encoding => "EncodingError",
            ErrorName::NoModificationAllowed => "NoModificationAllowedError",
            ErrorName::InvalidState => "InvalidStateError",
            ErrorName::Syntax => "SyntaxError",
            ErrorName::InvalidModification => "InvalidModificationError",
            ErrorName::QuotaExceeded => "QuotaExceededError",
            ErrorName::TypeMismatch => "TypeMismatchError",
            ErrorName::PathExists => "PathExistsError",
            ErrorName::NotSupported => "NotSupportedError",
            ErrorName::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub name: ErrorName,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl RpcError {
    /// Creates an error whose code is derived from `name`.
    pub fn new(name: ErrorName, message: impl Into<String>) -> Self {
        Self {
            code: name.code(),
            name,
            message: message.into(),
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorName::NotSupported, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorName::InvalidState, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorName::Syntax, message)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

impl std::error::Error for RpcError {}
