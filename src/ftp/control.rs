//! FTP control channel
//!
//! Sends commands and reads (possibly multi-line) replies over a plain or
//! TLS-secured connection.

use log::debug;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

use super::reply::{LineKind, Reply, parse_reply_line};
use super::secure::TlsChannelConfig;
use super::stream::FtpStream;
use crate::error::SessionError;
use crate::session::bounded;
use crate::utils::validation::is_safe_argument;

const WIRE_TARGET: &str = "remotefs_proxy::wire";

pub(crate) struct ControlChannel {
    stream: BufStream<FtpStream>,
    peer: SocketAddr,
    timeout: Duration,
    wire_debug: bool,
}

impl ControlChannel {
    /// Connects to `host:port` and waits for the server greeting.
    pub(crate) async fn open(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        timeout: Duration,
        wire_debug: bool,
    ) -> Result<Self, SessionError> {
        let tcp = bounded("connect", connect_timeout, async {
            TcpStream::connect((host, port)).await.map_err(|e| {
                SessionError::Connection(format!("cannot reach {}:{}: {}", host, port, e))
            })
        })
        .await?;
        let peer = tcp.peer_addr()?;
        debug!("Control connection established to {} ({})", host, peer);

        let mut control = ControlChannel {
            stream: BufStream::new(FtpStream::Plain(tcp)),
            peer,
            timeout,
            wire_debug,
        };
        control.wait_greeting().await?;
        Ok(control)
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn is_secure(&self) -> bool {
        self.stream.get_ref().is_secure()
    }

    async fn wait_greeting(&mut self) -> Result<(), SessionError> {
        loop {
            let reply = bounded("greeting", self.timeout, self.read_reply()).await?;
            match reply.code {
                120 => continue,
                220 => return Ok(()),
                _ => {
                    return Err(SessionError::Connection(format!(
                        "server not ready ({}): {}",
                        reply.code,
                        reply.text()
                    )));
                }
            }
        }
    }

    /// Upgrades the control connection with `AUTH TLS`.
    pub(crate) async fn secure(mut self, tls: &TlsChannelConfig) -> Result<Self, SessionError> {
        let reply = self.command("AUTH", Some("TLS")).await?;
        if reply.code != 234 {
            return Err(SessionError::Connection(format!(
                "server refused AUTH TLS ({}): {}",
                reply.code,
                reply.text()
            )));
        }

        let tcp = match self.stream.into_inner() {
            FtpStream::Plain(tcp) => tcp,
            FtpStream::Tls(_) => {
                return Err(SessionError::Protocol(
                    "control connection is already secured".into(),
                ));
            }
        };
        let tls_stream = bounded("control tls handshake", self.timeout, async {
            tls.connect(tcp)
                .await
                .map_err(|e| SessionError::Connection(format!("TLS handshake failed: {}", e)))
        })
        .await?;
        debug!("Control connection to {} secured", self.peer);

        Ok(ControlChannel {
            stream: BufStream::new(FtpStream::Tls(Box::new(tls_stream))),
            peer: self.peer,
            timeout: self.timeout,
            wire_debug: self.wire_debug,
        })
    }

    /// Sends one command and reads its reply, bounded by the operation timeout.
    pub(crate) async fn command(
        &mut self,
        cmd: &str,
        arg: Option<&str>,
    ) -> Result<Reply, SessionError> {
        let timeout = self.timeout;
        bounded("control command", timeout, async {
            self.send(cmd, arg).await?;
            self.read_reply().await
        })
        .await
    }

    /// Reads the next reply, e.g. the completion after a data transfer.
    pub(crate) async fn next_reply(&mut self) -> Result<Reply, SessionError> {
        bounded("control reply", self.timeout, self.read_reply()).await
    }

    async fn send(&mut self, cmd: &str, arg: Option<&str>) -> Result<(), SessionError> {
        if let Some(arg) = arg {
            if !is_safe_argument(arg) {
                return Err(SessionError::Protocol(format!(
                    "refusing {} argument with control characters",
                    cmd
                )));
            }
        }
        let line = match arg {
            Some(arg) => format!("{} {}\r\n", cmd, arg),
            None => format!("{}\r\n", cmd),
        };
        if self.wire_debug {
            let shown = if cmd == "PASS" { "PASS ****" } else { line.trim_end() };
            debug!(target: WIRE_TARGET, "*cmd* {}", shown);
        }
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, SessionError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Err(SessionError::Connection(
                "control connection closed by server".into(),
            ));
        }
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        if self.wire_debug {
            debug!(target: WIRE_TARGET, "*resp* {}", line);
        }
        Ok(line)
    }

    async fn read_reply(&mut self) -> Result<Reply, SessionError> {
        let first = self.read_line().await?;
        let (code, kind, text) = parse_reply_line(&first)
            .ok_or_else(|| SessionError::Protocol(format!("malformed reply: {:?}", first)))?;
        let mut reply = Reply {
            code,
            lines: vec![text.to_string()],
        };

        if kind == LineKind::Continued {
            loop {
                let line = self.read_line().await?;
                if let Some((c, LineKind::Final, text)) = parse_reply_line(&line) {
                    if c == code {
                        reply.lines.push(text.to_string());
                        break;
                    }
                }
                reply.lines.push(line);
            }
        }

        Ok(reply)
    }

    /// Best-effort shutdown of the underlying connection.
    pub(crate) async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Control connection shutdown to {}: {}", self.peer, e);
        }
    }
}
