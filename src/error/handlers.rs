//! Error handlers
//!
//! Maps errors onto the status codes the HTTP layer reports.

use crate::error::types::{GatewayError, SessionError};
use log::error;

/// Log a request-level error
pub fn handle_error(err: &GatewayError) {
    error!("Request failed: {}", err);
}

/// Convert an error to the HTTP status code of the response envelope
pub fn error_to_http_status(err: &GatewayError) -> u16 {
    match err {
        GatewayError::Spec(_) => 500,
        GatewayError::UnacceptedMimetype(_) | GatewayError::BadRequest(_) => 400,
        GatewayError::Session(e) => match e {
            SessionError::Connection(_) => 500,
            SessionError::Authentication(_) => 500,
            SessionError::Transfer(_) => 500,
            SessionError::NotFound(_) => 500,
            SessionError::PermissionDenied(_) => 500,
            SessionError::Timeout { .. } => 504,
            SessionError::Protocol(_) => 500,
        },
    }
}
