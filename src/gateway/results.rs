//! Gateway request and result types
//!
//! Defines the inputs and outcomes of the request-level operations.

use serde::Serialize;

use crate::error::{GatewayError, error_to_http_status};
use crate::session::PathEntry;

/// Read request for a file or directory
#[derive(Debug, Clone, Default)]
pub struct GetRequest {
    pub path: String,
    /// Rename the file here after it has been read
    pub move_to: Option<String>,
    pub ignore_move_to_errors: bool,
    /// Answer a missing path with an empty listing instead of not found
    pub ignore_404_errors: bool,
}

impl GetRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// Upload request
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub path: String,
    pub mimetype: String,
    pub body: Vec<u8>,
}

/// Outcome of a read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    /// Recursive listing of a directory
    Listing(Vec<PathEntry>),
    /// File content, named by the final path segment
    Attachment { filename: String, content: Vec<u8> },
    /// A missing path with 404 suppression on
    Empty,
    NotFound,
}

impl GetOutcome {
    /// HTTP status the outcome is reported with
    pub fn status(&self) -> u16 {
        match self {
            GetOutcome::NotFound => 404,
            _ => 200,
        }
    }
}

/// JSON body of write responses and failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub is_success: bool,
    pub message: String,
}

impl Envelope {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            is_success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::failure("NOT FOUND")
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"is_success":{},"message":""}}"#, self.is_success)
        })
    }
}

impl From<&GatewayError> for Envelope {
    fn from(error: &GatewayError) -> Self {
        Envelope {
            is_success: error_to_http_status(error) == 200,
            message: error.to_string(),
        }
    }
}
