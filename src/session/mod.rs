//! Remote session contract
//!
//! Every backend (FTP, FTPS, SFTP) exposes the same capability set so callers
//! never need to know which wire protocol serves a request. A session owns one
//! authenticated transport; it is not shared and not pooled.

#[cfg(test)]
pub(crate) mod memory;
pub mod results;

use async_trait::async_trait;
use std::future::Future;
use std::io::Cursor;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::connection::{ConnectionSpec, Protocol};
use crate::error::SessionError;
use crate::ftp::{FtpSession, FtpsSession};
use crate::sftp::SftpSession;

pub use results::{PathEntry, PathType};

/// Uniform file access over one authenticated remote connection.
///
/// `close` must be called on every exit path. Dropping a session still tears
/// the transport down, but without the protocol-level goodbye.
#[async_trait]
pub trait RemoteSession: Send {
    fn protocol(&self) -> Protocol;

    /// Never fails: absence and indeterminable types both yield `Unknown`.
    async fn classify(&mut self, path: &str) -> PathType;

    /// Paths immediately under `path`, joined with it. Empty on any failure.
    async fn list(&mut self, path: &str) -> Vec<String>;

    /// Fetches the whole object into memory, positioned at the start.
    async fn stream_in(&mut self, path: &str) -> Result<Cursor<Vec<u8>>, SessionError>;

    /// Uploads `data` to `path`, replacing any existing object.
    async fn stream_out(&mut self, path: &str, data: &[u8]) -> Result<(), SessionError>;

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError>;

    /// Releases the transport. Calling it again is a no-op.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Per-session tuning derived from process configuration
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    pub wire_debug: bool,
    pub tls_accept_invalid_certs: bool,
    pub host_key_fingerprint: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for SessionOptions {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            operation_timeout: config.operation_timeout(),
            wire_debug: config.wire_debug(),
            tls_accept_invalid_certs: config.tls_accept_invalid_certs,
            host_key_fingerprint: config.sftp_host_key_fingerprint.clone(),
        }
    }
}

/// Opens and authenticates a session for the given spec.
pub async fn connect(
    spec: &ConnectionSpec,
    options: &SessionOptions,
) -> Result<Box<dyn RemoteSession>, SessionError> {
    let session: Box<dyn RemoteSession> = match spec.protocol {
        Protocol::Ftp => Box::new(FtpSession::connect(spec, options).await?),
        Protocol::Ftps => Box::new(FtpsSession::connect(spec, options).await?),
        Protocol::Sftp => Box::new(SftpSession::connect(spec, options).await?),
    };
    Ok(session)
}

/// Runs a network operation under a deadline.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::Timeout { operation, after }),
    }
}
