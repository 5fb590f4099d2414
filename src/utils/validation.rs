//! Input validation utilities
//!
//! Checks applied to caller-supplied strings before they reach a wire protocol.

/// Maximum length of a single control-channel argument
const MAX_ARGUMENT_LENGTH: usize = 4096;

/// Rejects arguments that could smuggle extra commands onto a line-based channel.
pub fn is_safe_argument(input: &str) -> bool {
    input.len() <= MAX_ARGUMENT_LENGTH && !input.contains(['\0', '\r', '\n'])
}

/// Mimetypes accepted for uploads
pub const ACCEPTED_MIMETYPES: [&str; 4] = [
    "text/csv",
    "text/xml",
    "application/xml",
    "application/json",
];

/// Checks an upload mimetype, ignoring parameters such as `; charset=utf-8`.
pub fn is_accepted_mimetype(mimetype: &str) -> bool {
    let essence = mimetype.split(';').next().unwrap_or_default().trim();
    ACCEPTED_MIMETYPES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(essence))
}
