//! Error handling
//!
//! Defines error types and handling for the remote filesystem layer.

pub mod handlers;
pub mod types;

pub use types::*;

pub use handlers::{error_to_http_status, handle_error};
