//! SFTP session over russh
//!
//! Paths are used verbatim; `.` addresses the login directory.

use async_trait::async_trait;
use log::{debug, info};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use russh::Disconnect;
use russh::client::{self, Handle};
use russh_sftp::client::SftpSession as SftpChannel;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::StatusCode;
use tokio::io::AsyncWriteExt;

use super::handler::HostKeyPolicy;
use crate::connection::{ConnectionSpec, Protocol};
use crate::error::{SessionError, TransferError};
use crate::session::{PathType, RemoteSession, SessionOptions, bounded};
use crate::utils::path::{SFTP_ROOT, is_dot_entry, join_remote};

pub struct SftpSession {
    sftp: SftpChannel,
    handle: Handle<HostKeyPolicy>,
    timeout: Duration,
    closed: bool,
}

impl SftpSession {
    /// Connects, authenticates with the password and opens the `sftp` subsystem.
    pub async fn connect(
        spec: &ConnectionSpec,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        let (host, port) = spec.endpoint();
        debug!("sftp connecting to {} with {}", spec.host, spec.username);

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(options.operation_timeout),
            ..Default::default()
        });
        let handler = HostKeyPolicy::new(&host, options.host_key_fingerprint.clone());
        let mut handle = bounded("connect", options.connect_timeout, async {
            client::connect(config, (host.as_str(), port), handler)
                .await
                .map_err(|e| {
                    SessionError::Connection(format!("cannot reach {}:{}: {}", host, port, e))
                })
        })
        .await?;

        let auth = bounded("authenticate", options.operation_timeout, async {
            handle
                .authenticate_password(spec.username.as_str(), spec.password.as_str())
                .await
                .map_err(|e| SessionError::Authentication(e.to_string()))
        })
        .await?;
        if !auth.success() {
            return Err(SessionError::Authentication(format!(
                "password authentication failed for {} on {}",
                spec.username, host
            )));
        }
        info!("Logged in to {}:{} as {}", host, port, spec.username);

        let sftp = bounded("open sftp subsystem", options.operation_timeout, async {
            let channel = handle
                .channel_open_session()
                .await
                .map_err(|e| SessionError::Connection(format!("open channel: {}", e)))?;
            channel
                .request_subsystem(true, "sftp")
                .await
                .map_err(|e| SessionError::Connection(format!("request sftp subsystem: {}", e)))?;
            SftpChannel::new(channel.into_stream())
                .await
                .map_err(|e| SessionError::Protocol(format!("sftp init: {}", e)))
        })
        .await?;

        Ok(Self {
            sftp,
            handle,
            timeout: options.operation_timeout,
            closed: false,
        })
    }
}

#[async_trait]
impl RemoteSession for SftpSession {
    fn protocol(&self) -> Protocol {
        Protocol::Sftp
    }

    async fn classify(&mut self, path: &str) -> PathType {
        let stat = bounded("stat", self.timeout, async {
            self.sftp.metadata(path).await.map_err(|e| sftp_error(path, e))
        })
        .await;
        match stat {
            Ok(meta) if meta.is_dir() => PathType::Dir,
            Ok(_) => PathType::File,
            Err(e) => {
                debug!("stat {:?} failed: {}", path, e);
                unresolved_path_type(path)
            }
        }
    }

    async fn list(&mut self, path: &str) -> Vec<String> {
        let entries = bounded("read_dir", self.timeout, async {
            self.sftp.read_dir(path).await.map_err(|e| sftp_error(path, e))
        })
        .await;
        match entries {
            Ok(entries) => entries
                .map(|entry| entry.file_name())
                .filter(|name| !is_dot_entry(name))
                .map(|name| join_remote(path, &name))
                .collect(),
            Err(e) => {
                debug!("Listing {:?} failed, treating as empty: {}", path, e);
                Vec::new()
            }
        }
    }

    async fn stream_in(&mut self, path: &str) -> Result<Cursor<Vec<u8>>, SessionError> {
        debug!("fetching {}", path);
        let body = bounded("read", self.timeout, async {
            self.sftp.read(path).await.map_err(|e| sftp_error(path, e))
        })
        .await?;
        Ok(Cursor::new(body))
    }

    async fn stream_out(&mut self, path: &str, data: &[u8]) -> Result<(), SessionError> {
        debug!("storing {} bytes to {}", data.len(), path);
        bounded("write", self.timeout, async {
            let mut file = self.sftp.create(path).await.map_err(|e| sftp_error(path, e))?;
            file.write_all(data)
                .await
                .map_err(|e| SessionError::from(TransferError::Interrupted(e)))?;
            file.shutdown()
                .await
                .map_err(|e| SessionError::from(TransferError::Interrupted(e)))
        })
        .await
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
        bounded("rename", self.timeout, async {
            self.sftp.rename(from, to).await.map_err(|e| sftp_error(from, e))
        })
        .await
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.sftp.close().await {
            debug!("Closing sftp subsystem: {}", e);
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| SessionError::Connection(format!("disconnect: {}", e)))
    }
}

/// A path that cannot be stat'ed is unknown, except the root sentinels which
/// some servers refuse to stat yet always list.
fn unresolved_path_type(path: &str) -> PathType {
    if path.is_empty() || path == SFTP_ROOT {
        PathType::Dir
    } else {
        PathType::Unknown
    }
}

fn sftp_error(path: &str, e: SftpError) -> SessionError {
    match e {
        SftpError::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => SessionError::NotFound(path.to_string()),
            StatusCode::PermissionDenied => SessionError::PermissionDenied(path.to_string()),
            StatusCode::NoConnection | StatusCode::ConnectionLost => {
                SessionError::Connection(format!("{}: {}", path, status.error_message))
            }
            code => SessionError::Protocol(format!(
                "{} ({:?}): {}",
                path, code, status.error_message
            )),
        },
        SftpError::IO(msg) => SessionError::from(TransferError::DataChannel(msg)),
        SftpError::Timeout => SessionError::Connection(format!("{}: sftp request timed out", path)),
        other => SessionError::Protocol(format!("{}: {}", path, other)),
    }
}
