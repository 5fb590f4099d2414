//! Connection specification types

use std::fmt;
use std::str::FromStr;

use crate::error::IncompleteSpecError;

/// Wire protocol backing a remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ftp,
    Ftps,
    Sftp,
}

impl Protocol {
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ftp | Protocol::Ftps => 21,
            Protocol::Sftp => 22,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Ftp => "FTP",
            Protocol::Ftps => "FTPS",
            Protocol::Sftp => "SFTP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = IncompleteSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FTP" => Ok(Protocol::Ftp),
            "FTPS" => Ok(Protocol::Ftps),
            "SFTP" => Ok(Protocol::Sftp),
            "" => Err(IncompleteSpecError::MissingProtocol),
            other => Err(IncompleteSpecError::UnsupportedProtocol(other.to_string())),
        }
    }
}

/// Fully determined parameters for opening one session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub protocol: Protocol,
    pub host: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl ConnectionSpec {
    /// Splits the host into address and port, falling back to the protocol default.
    ///
    /// Accepts `host`, `host:port`, `[v6]` and `[v6]:port`.
    pub fn endpoint(&self) -> (String, u16) {
        split_host_port(&self.host, self.protocol.default_port())
    }
}

fn split_host_port(host: &str, default_port: u16) -> (String, u16) {
    if let Some(rest) = host.strip_prefix('[') {
        if let Some((addr, tail)) = rest.split_once(']') {
            let port = tail
                .strip_prefix(':')
                .and_then(|p| p.parse().ok())
                .unwrap_or(default_port);
            return (addr.to_string(), port);
        }
    }

    // A bare IPv6 address has more than one colon and no port.
    match host.rsplit_once(':') {
        Some((addr, port)) if !addr.contains(':') => match port.parse() {
            Ok(port) => (addr.to_string(), port),
            Err(_) => (host.to_string(), default_port),
        },
        _ => (host.to_string(), default_port),
    }
}

/// Whatever the resolver could determine; fields may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSpec {
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ResolvedSpec {
    /// Caller-side completeness check before a session is constructed.
    pub fn complete(self) -> Result<ConnectionSpec, IncompleteSpecError> {
        let protocol = self
            .protocol
            .filter(|p| !p.is_empty())
            .ok_or(IncompleteSpecError::MissingProtocol)?;
        let host = self
            .host
            .filter(|h| !h.is_empty())
            .ok_or(IncompleteSpecError::MissingHost)?;
        let protocol: Protocol = protocol.parse()?;

        match (self.username, self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok(ConnectionSpec {
                    protocol,
                    host,
                    username,
                    password,
                })
            }
            _ => Err(IncompleteSpecError::MissingCredentials),
        }
    }
}
