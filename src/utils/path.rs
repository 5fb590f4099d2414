//! Remote path helpers
//!
//! Remote paths are always `/`-separated regardless of the local platform.

use crate::connection::Protocol;

/// Root sentinel understood by SFTP servers
pub const SFTP_ROOT: &str = ".";

/// Joins a child name onto a parent with exactly one separator.
///
/// The root sentinels `""` and `"."` contribute no path segment.
pub fn join_remote(parent: &str, name: &str) -> String {
    match parent {
        "" | SFTP_ROOT => name.to_string(),
        p if p.ends_with('/') => format!("{}{}", p, name),
        p => format!("{}/{}", p, name),
    }
}

/// Final segment of a remote path, used as the attachment name.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Whether the last segment is `.` or `..`
pub fn is_dot_entry(path: &str) -> bool {
    matches!(file_name(path), "." | "..")
}

/// Normalizes a request path: one leading `/`, no trailing `/`.
///
/// The root collapses to `""`, or to the root sentinel for SFTP.
pub fn normalize_request_path(path: &str, protocol: Protocol) -> String {
    let mut path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    if path.ends_with('/') {
        path.pop();
    }
    if path.is_empty() && protocol == Protocol::Sftp {
        path.push_str(SFTP_ROOT);
    }
    path
}
