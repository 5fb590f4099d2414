//! Request-supplied credentials
//!
//! Basic-auth credentials carried by an incoming request. They take
//! precedence over the baseline username and password.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parses an `Authorization: Basic <base64(user:pass)>` header value.
    ///
    /// Returns `None` for any other scheme or a malformed payload.
    pub fn from_authorization_header(value: &str) -> Option<Self> {
        let (scheme, payload) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(payload.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self::new(username, password))
    }
}
