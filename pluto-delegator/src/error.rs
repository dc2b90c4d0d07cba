//! Error types for the delegation bridge.
//!
//! [`RemoteError`] is what crosses the wire: a stable [`ErrorCode`] plus a
//! message. Every registry failure is translated into one here and nowhere
//! else.

use pluto_core::error::{ErrorKind, RegistryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

/// Stable, branchable remote error codes.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A component with this name is already registered.
    DuplicateName,
    /// Unknown component.
    NotFound,
    /// Unknown method.
    MethodNotFound,
    /// Unknown variable.
    VariableNotFound,
    /// Wrong number of arguments.
    ArityMismatch,
    /// Value not assignable to the variable's kind.
    TypeMismatch,
    /// Variable cannot be written.
    ReadOnlyVariable,
    /// The component's own logic failed.
    InvocationFailed,
    /// A wait timed out.
    Timeout,
    /// The operation was cancelled.
    Cancelled,
    /// The operation is not allowed in the current state.
    InvalidState,
    /// An argument or value string is not valid structured text.
    InvalidEncoding,
    /// The frame is not a well-formed request.
    InvalidRequest,
    /// The request envelope names a protocol version this bridge does not
    /// speak.
    UnsupportedVersion,
}

impl ErrorCode {
    /// The code as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateName => "duplicate_name",
            Self::NotFound => "not_found",
            Self::MethodNotFound => "method_not_found",
            Self::VariableNotFound => "variable_not_found",
            Self::ArityMismatch => "arity_mismatch",
            Self::TypeMismatch => "type_mismatch",
            Self::ReadOnlyVariable => "read_only_variable",
            Self::InvocationFailed => "invocation_failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::InvalidState => "invalid_state",
            Self::InvalidEncoding => "invalid_encoding",
            Self::InvalidRequest => "invalid_request",
            Self::UnsupportedVersion => "unsupported_version",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::DuplicateName => Self::DuplicateName,
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::MethodNotFound => Self::MethodNotFound,
            ErrorKind::VariableNotFound => Self::VariableNotFound,
            ErrorKind::Arity => Self::ArityMismatch,
            ErrorKind::TypeMismatch => Self::TypeMismatch,
            ErrorKind::ReadOnlyVariable => Self::ReadOnlyVariable,
            ErrorKind::Invocation => Self::InvocationFailed,
            ErrorKind::Timeout => Self::Timeout,
            ErrorKind::Cancelled => Self::Cancelled,
            ErrorKind::InvalidState => Self::InvalidState,
            _ => Self::InvalidState,
        }
    }
}

/// A failure as seen by a remote caller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct RemoteError {
    /// Stable code to branch on.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
}

impl RemoteError {
    /// Create a remote error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<RegistryError> for RemoteError {
    fn from(err: RegistryError) -> Self {
        Self::new(err.kind().into(), err.to_string())
    }
}

/// Server-side failures.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DelegatorError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Accepting or serving a connection failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client-side failures.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting or writing failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection closed before a response arrived.
    #[error("connection closed")]
    Closed,

    /// The server answered with a remote error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The response was well-formed JSON but not what the operation
    /// expects, or a carried value could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    /// The remote code, if the server reported one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Remote(remote) => Some(remote.code),
            _ => None,
        }
    }
}

/// Invalid configuration values.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be used.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        var: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}
