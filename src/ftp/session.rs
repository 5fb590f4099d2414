//! Plain FTP session
//!
//! FTP has no portable "is this a directory" primitive, so classification is
//! behavioural: a successful `CWD` means DIR, otherwise a single-line `LIST`
//! answer means FILE, anything else is UNKNOWN.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::io::{self, Cursor, ErrorKind};
use std::net::{IpAddr, SocketAddr, SocketAddrV4};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::control::ControlChannel;
use super::reply::Reply;
use super::secure::TlsChannelConfig;
use super::stream::FtpStream;
use crate::connection::{ConnectionSpec, Protocol};
use crate::error::{SessionError, TransferError};
use crate::session::{PathType, RemoteSession, SessionOptions, bounded};
use crate::utils::path::{is_dot_entry, join_remote};

const BUFFER_SIZE: usize = 64 * 1024;

pub struct FtpSession {
    control: ControlChannel,
    protocol: Protocol,
    /// Set for FTPS once `PROT P` is in effect
    data_tls: Option<TlsChannelConfig>,
    closed: bool,
}

impl FtpSession {
    /// Connects and logs in over plain FTP.
    pub async fn connect(
        spec: &ConnectionSpec,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        let (host, port) = spec.endpoint();
        debug!("ftp connecting to {} with {}", spec.host, spec.username);
        let control = ControlChannel::open(
            &host,
            port,
            options.connect_timeout,
            options.operation_timeout,
            options.wire_debug,
        )
        .await?;

        let mut session = FtpSession::from_control(control, Protocol::Ftp);
        session.login(&spec.username, &spec.password).await?;
        Ok(session)
    }

    pub(crate) fn from_control(control: ControlChannel, protocol: Protocol) -> Self {
        Self {
            control,
            protocol,
            data_tls: None,
            closed: false,
        }
    }

    pub(crate) fn control_mut(&mut self) -> &mut ControlChannel {
        &mut self.control
    }

    /// Wraps every subsequent data connection in TLS.
    pub(crate) fn secure_data_channels(&mut self, tls: TlsChannelConfig) {
        self.data_tls = Some(tls);
    }

    pub(crate) fn data_channel_tls(&self) -> Option<&TlsChannelConfig> {
        self.data_tls.as_ref()
    }

    pub(crate) async fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let reply = self.control.command("USER", Some(username)).await?;
        let reply = match reply.code {
            230 => reply,
            331 => self.control.command("PASS", Some(password)).await?,
            _ => return Err(login_error(username, &reply)),
        };
        if !matches!(reply.code, 202 | 230) {
            return Err(login_error(username, &reply));
        }
        info!(
            "Logged in to {} as {}{}",
            self.control.peer(),
            username,
            if self.control.is_secure() { " (TLS)" } else { "" }
        );

        let reply = self.control.command("TYPE", Some("I")).await?;
        if !reply.is_completion() {
            return Err(SessionError::Protocol(format!(
                "binary mode refused ({}): {}",
                reply.code,
                reply.text()
            )));
        }
        Ok(())
    }

    async fn pwd(&mut self) -> Result<String, SessionError> {
        let reply = self.control.command("PWD", None).await?;
        match (reply.code, reply.quoted_path()) {
            (257, Some(path)) => Ok(path),
            _ => Err(SessionError::Protocol(format!(
                "unexpected PWD reply ({}): {}",
                reply.code,
                reply.text()
            ))),
        }
    }

    async fn try_classify(&mut self, path: &str) -> Result<PathType, SessionError> {
        let previous = self.pwd().await?;
        let target = if path.is_empty() { "." } else { path };

        let reply = self.control.command("CWD", Some(target)).await?;
        let result = if reply.is_completion() {
            Ok(PathType::Dir)
        } else if reply.is_permanent_negative() {
            match self.retrieve_lines("LIST", Some(path)).await {
                Ok(lines) if lines.len() == 1 => Ok(PathType::File),
                Ok(_) => Ok(PathType::Unknown),
                Err(e) => Err(e),
            }
        } else {
            Err(SessionError::Protocol(format!(
                "unexpected CWD reply ({}): {}",
                reply.code,
                reply.text()
            )))
        };

        // classification must leave the working directory untouched
        let restore = self.control.command("CWD", Some(&previous)).await?;
        if !restore.is_completion() {
            warn!("Could not restore working directory {}", previous);
        }
        result
    }

    /// Enters passive mode, EPSV first and PASV as the fallback.
    async fn passive_address(&mut self) -> Result<SocketAddr, SessionError> {
        let peer = self.control.peer();
        let reply = self.control.command("EPSV", None).await?;
        if let Some(port) = reply.epsv_port().filter(|_| reply.code == 229) {
            return Ok(SocketAddr::new(peer.ip(), port));
        }

        let reply = self.control.command("PASV", None).await?;
        reply
            .pasv_address()
            .filter(|_| reply.code == 227)
            .map(|announced| data_address(announced, peer))
            .ok_or_else(|| {
                SessionError::from(TransferError::DataChannel(format!(
                    "server did not enter passive mode ({}): {}",
                    reply.code,
                    reply.text()
                )))
            })
    }

    /// Opens a data connection and issues the transfer command on it.
    async fn open_transfer(
        &mut self,
        cmd: &str,
        arg: Option<&str>,
    ) -> Result<FtpStream, SessionError> {
        let addr = self.passive_address().await?;
        let timeout = self.control.timeout();
        let tcp = bounded("data connect", timeout, async {
            TcpStream::connect(addr).await.map_err(|e| {
                SessionError::from(TransferError::DataChannel(format!("{}: {}", addr, e)))
            })
        })
        .await?;

        let reply = self.control.command(cmd, arg).await?;
        if !reply.is_preliminary() {
            return Err(rejected(&reply));
        }

        // TLS is negotiated only after the server has answered the command
        match &self.data_tls {
            Some(tls) => {
                let handshake = bounded("data tls handshake", timeout, async {
                    tls.connect(tcp).await.map_err(|e| {
                        SessionError::from(TransferError::DataChannel(format!(
                            "TLS handshake failed: {}",
                            e
                        )))
                    })
                })
                .await;
                match handshake {
                    Ok(stream) => Ok(FtpStream::Tls(Box::new(stream))),
                    Err(e) => {
                        // the server still closes the transfer with its own reply
                        let _ = self.control.next_reply().await;
                        Err(e)
                    }
                }
            }
            None => Ok(FtpStream::Plain(tcp)),
        }
    }

    async fn finish_transfer(&mut self) -> Result<(), SessionError> {
        let reply = self.control.next_reply().await?;
        if reply.is_completion() {
            Ok(())
        } else {
            Err(rejected(&reply))
        }
    }

    async fn retrieve(&mut self, cmd: &str, arg: Option<&str>) -> Result<Vec<u8>, SessionError> {
        let mut data = self.open_transfer(cmd, arg).await?;
        let timeout = self.control.timeout();
        let body = bounded("data read", timeout, async {
            read_to_end(&mut data)
                .await
                .map_err(|e| SessionError::from(TransferError::Interrupted(e)))
        })
        .await;
        drop(data);

        match body {
            Ok(body) => {
                self.finish_transfer().await?;
                Ok(body)
            }
            Err(e) => {
                // drain the 426 that follows an aborted transfer
                let _ = self.control.next_reply().await;
                Err(e)
            }
        }
    }

    async fn retrieve_lines(
        &mut self,
        cmd: &str,
        arg: Option<&str>,
    ) -> Result<Vec<String>, SessionError> {
        let arg = arg.filter(|a| !a.is_empty());
        let body = self.retrieve(cmd, arg).await?;
        Ok(String::from_utf8_lossy(&body)
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn store(&mut self, path: &str, payload: &[u8]) -> Result<(), SessionError> {
        let mut data = self.open_transfer("STOR", Some(path)).await?;
        let timeout = self.control.timeout();
        let written = bounded("data write", timeout, async {
            let result: io::Result<()> = async {
                data.write_all(payload).await?;
                data.shutdown().await
            }
            .await;
            result.map_err(|e| SessionError::from(TransferError::Interrupted(e)))
        })
        .await;
        drop(data);

        if let Err(e) = written {
            let _ = self.control.next_reply().await;
            return Err(e);
        }
        self.finish_transfer().await
    }
}

#[async_trait]
impl RemoteSession for FtpSession {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn classify(&mut self, path: &str) -> PathType {
        match self.try_classify(path).await {
            Ok(path_type) => path_type,
            Err(e) => {
                debug!("Classifying {:?} failed, treating as unknown: {}", path, e);
                PathType::Unknown
            }
        }
    }

    async fn list(&mut self, path: &str) -> Vec<String> {
        match self.retrieve_lines("NLST", Some(path)).await {
            Ok(names) => names
                .into_iter()
                .filter(|name| !is_dot_entry(name))
                .map(|name| {
                    // some servers answer with bare names, others with qualified paths
                    if name.contains('/') {
                        name
                    } else {
                        join_remote(path, &name)
                    }
                })
                .collect(),
            Err(e) => {
                debug!("Listing {:?} failed, treating as empty: {}", path, e);
                Vec::new()
            }
        }
    }

    async fn stream_in(&mut self, path: &str) -> Result<Cursor<Vec<u8>>, SessionError> {
        debug!("fetching {}", path);
        let body = self.retrieve("RETR", Some(path)).await?;
        Ok(Cursor::new(body))
    }

    async fn stream_out(&mut self, path: &str, data: &[u8]) -> Result<(), SessionError> {
        debug!("storing {} bytes to {}", data.len(), path);
        self.store(path, data).await
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
        let reply = self.control.command("RNFR", Some(from)).await?;
        if !reply.is_intermediate() {
            return Err(rename_error(from, &reply));
        }
        let reply = self.control.command("RNTO", Some(to)).await?;
        if !reply.is_completion() {
            return Err(rename_error(to, &reply));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.control.command("QUIT", None).await;
        self.control.shutdown().await;
        match result {
            Ok(reply) if reply.is_completion() => Ok(()),
            Ok(reply) => Err(SessionError::Protocol(format!(
                "unexpected QUIT reply ({}): {}",
                reply.code,
                reply.text()
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Reads a data connection to its end.
async fn read_to_end(stream: &mut FtpStream) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut chunk = vec![0u8; BUFFER_SIZE];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => return Ok(body),
            Ok(n) => body.extend_from_slice(&chunk[..n]),
            // many servers drop TLS data connections without close_notify;
            // the completion reply still confirms the transfer
            Err(e) if e.kind() == ErrorKind::UnexpectedEof && stream.is_secure() => {
                return Ok(body);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Uses the PASV address unless it cannot be reached from here, in which case
/// the announced port is combined with the control peer address.
fn data_address(announced: SocketAddrV4, peer: SocketAddr) -> SocketAddr {
    let ip = *announced.ip();
    let unroutable = match peer.ip() {
        IpAddr::V4(peer_ip) => {
            ip.is_unspecified()
                || (ip.is_private() && !peer_ip.is_private())
                || (ip.is_loopback() && !peer_ip.is_loopback())
        }
        IpAddr::V6(_) => true,
    };
    if unroutable {
        SocketAddr::new(peer.ip(), announced.port())
    } else {
        SocketAddr::V4(announced)
    }
}

fn login_error(username: &str, reply: &Reply) -> SessionError {
    SessionError::Authentication(format!(
        "login as {} refused ({}): {}",
        username,
        reply.code,
        reply.text()
    ))
}

fn rejected(reply: &Reply) -> SessionError {
    TransferError::Rejected {
        code: reply.code,
        message: reply.text(),
    }
    .into()
}

fn rename_error(path: &str, reply: &Reply) -> SessionError {
    match reply.code {
        450 | 550 => SessionError::NotFound(format!("{} ({})", path, reply.text())),
        530 | 532 | 553 => SessionError::PermissionDenied(format!("{} ({})", path, reply.text())),
        code => SessionError::Protocol(format!("rename of {} failed ({}): {}", path, code, reply.text())),
    }
}
