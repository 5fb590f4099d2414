//! Error types
//!
//! Defines domain-specific error types for sessions, transfers and
//! connection resolution.

use std::fmt;
use std::io;
use std::time::Duration;

/// Data transfer errors (RETR / STOR / SFTP read and write)
#[derive(Debug)]
pub enum TransferError {
    /// The stream broke off mid-transfer.
    Interrupted(io::Error),
    /// The server refused the transfer command.
    Rejected { code: u16, message: String },
    /// No usable data channel could be set up.
    DataChannel(String),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Interrupted(e) => write!(f, "Transfer interrupted: {}", e),
            TransferError::Rejected { code, message } => {
                write!(f, "Transfer rejected ({}): {}", code, message)
            }
            TransferError::DataChannel(msg) => write!(f, "Data channel setup failed: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Interrupted(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TransferError {
    fn from(error: io::Error) -> Self {
        TransferError::Interrupted(error)
    }
}

/// Errors surfaced by a remote session
#[derive(Debug)]
pub enum SessionError {
    /// Transport could not be established or broke down.
    Connection(String),
    /// The server rejected the credentials.
    Authentication(String),
    Transfer(TransferError),
    NotFound(String),
    PermissionDenied(String),
    /// A bounded network operation did not finish in time.
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    /// The server answered something we could not make sense of.
    Protocol(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Connection(msg) => write!(f, "Connection error: {}", msg),
            SessionError::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            SessionError::Transfer(e) => write!(f, "Transfer error: {}", e),
            SessionError::NotFound(p) => write!(f, "Not found: {}", p),
            SessionError::PermissionDenied(p) => write!(f, "Permission denied: {}", p),
            SessionError::Timeout { operation, after } => {
                write!(f, "Timed out after {}s during {}", after.as_secs(), operation)
            }
            SessionError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Transfer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransferError> for SessionError {
    fn from(error: TransferError) -> Self {
        SessionError::Transfer(error)
    }
}

impl From<io::Error> for SessionError {
    fn from(error: io::Error) -> Self {
        SessionError::Connection(error.to_string())
    }
}

/// Caller-side check failures for a resolved connection spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteSpecError {
    MissingProtocol,
    UnsupportedProtocol(String),
    MissingHost,
    MissingCredentials,
}

impl fmt::Display for IncompleteSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteSpecError::MissingProtocol => write!(f, "Missing protocol and/or host"),
            IncompleteSpecError::UnsupportedProtocol(p) => {
                write!(f, "Not supported protocol: {}", p)
            }
            IncompleteSpecError::MissingHost => write!(f, "Missing protocol and/or host"),
            IncompleteSpecError::MissingCredentials => {
                write!(f, "Missing username and/or password")
            }
        }
    }
}

impl std::error::Error for IncompleteSpecError {}

/// Request-level error that encompasses resolution and session failures
#[derive(Debug)]
pub enum GatewayError {
    Spec(IncompleteSpecError),
    Session(SessionError),
    UnacceptedMimetype(String),
    /// Missing or unusable request parameter
    BadRequest(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Spec(e) => write!(f, "{}", e),
            GatewayError::Session(e) => write!(f, "{}", e),
            GatewayError::UnacceptedMimetype(m) => write!(f, "Mimetype not accepted: {}", m),
            GatewayError::BadRequest(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<IncompleteSpecError> for GatewayError {
    fn from(error: IncompleteSpecError) -> Self {
        GatewayError::Spec(error)
    }
}

impl From<SessionError> for GatewayError {
    fn from(error: SessionError) -> Self {
        GatewayError::Session(error)
    }
}
