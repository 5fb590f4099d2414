//! Utility functions
//!
//! Provides logging, remote path and validation helpers.

pub mod logging;
pub mod path;
pub mod validation;
