//! In-process FTP server serving an in-memory tree over real TCP.
//!
//! Implements the subset of RFC 959 the client uses, passive mode only. In
//! TLS mode it requires `AUTH TLS` and, once `PROT P` is set, refuses data
//! connections whose TLS session does not resume the control session.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use rustls::crypto::ring;
use rustls::{HandshakeKind, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub const USER: &str = "alice";
pub const PASSWORD: &str = "wonderland";

#[derive(Debug, Default)]
pub struct Tree {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
}

impl Tree {
    pub fn new() -> Self {
        let mut tree = Tree::default();
        tree.dirs.insert("/".to_string());
        tree
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.dirs.insert(path.to_string());
        self
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    fn children(&self, dir: &str) -> Vec<String> {
        self.dirs
            .iter()
            .chain(self.files.keys())
            .filter(|p| p.as_str() != "/" && parent(p) == dir)
            .map(|p| base_name(p).to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// How the server treats FTPS clients
#[derive(Clone)]
enum TlsMode {
    Off,
    /// `AUTH TLS` required, `PROT P` data channels must resume the control session
    Required(TlsAcceptor),
    /// Accepts `PROT P` but keeps sending plaintext data
    IgnoreProt(TlsAcceptor),
}

pub struct FakeFtpServer {
    pub addr: SocketAddr,
    pub tree: Arc<Mutex<Tree>>,
    pub commands: Arc<Mutex<Vec<String>>>,
    /// One entry per protected data connection: whether its session was resumed
    pub data_resumptions: Arc<Mutex<Vec<bool>>>,
}

impl FakeFtpServer {
    pub async fn start(tree: Tree) -> Self {
        Self::start_with(tree, true).await
    }

    /// `epsv: false` answers EPSV with 502 so clients fall back to PASV.
    pub async fn start_with(tree: Tree, epsv: bool) -> Self {
        Self::spawn(tree, epsv, TlsMode::Off).await
    }

    /// Explicit FTPS with a self-signed certificate.
    pub async fn start_tls(tree: Tree) -> Self {
        Self::spawn(tree, true, TlsMode::Required(tls_acceptor())).await
    }

    /// FTPS server that answers `PROT P` yet sends data in the clear.
    pub async fn start_tls_ignoring_prot(tree: Tree) -> Self {
        Self::spawn(tree, true, TlsMode::IgnoreProt(tls_acceptor())).await
    }

    async fn spawn(tree: Tree, epsv: bool, tls: TlsMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = FakeFtpServer {
            addr,
            tree: Arc::new(Mutex::new(tree)),
            commands: Arc::new(Mutex::new(Vec::new())),
            data_resumptions: Arc::new(Mutex::new(Vec::new())),
        };

        let shared = Shared {
            tree: Arc::clone(&server.tree),
            commands: Arc::clone(&server.commands),
            data_resumptions: Arc::clone(&server.data_resumptions),
            epsv,
            tls,
        };
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = shared.clone();
                tokio::spawn(async move {
                    let _ = handle_client(Box::new(stream), shared).await;
                });
            }
        });

        server
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.tree.lock().unwrap().files.get(path).cloned()
    }

    pub fn received(&self, command: &str) -> bool {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.starts_with(command))
    }

    pub fn resumptions(&self) -> Vec<bool> {
        self.data_resumptions.lock().unwrap().clone()
    }
}

/// Server certificate and key, self-signed for `localhost` and `127.0.0.1`.
fn tls_acceptor() -> TlsAcceptor {
    let certs = rustls_pemfile::certs(&mut &include_bytes!("tls/cert.pem")[..])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut &include_bytes!("tls/key.pem")[..])
        .unwrap()
        .unwrap();
    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// A server that accepts connections and never greets.
pub async fn start_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

type Control = BufReader<Box<dyn Io>>;

#[derive(Clone)]
struct Shared {
    tree: Arc<Mutex<Tree>>,
    commands: Arc<Mutex<Vec<String>>>,
    data_resumptions: Arc<Mutex<Vec<bool>>>,
    epsv: bool,
    tls: TlsMode,
}

struct ClientState {
    cwd: String,
    user: Option<String>,
    logged_in: bool,
    secured: bool,
    protected: bool,
    passive: Option<TcpListener>,
    rename_from: Option<String>,
}

fn parse_command(line: &str) -> (String, String) {
    let line = line.trim_end_matches(['\r', '\n']);
    match line.split_once(' ') {
        Some((cmd, arg)) => (cmd.to_ascii_uppercase(), arg.to_string()),
        None => (line.to_ascii_uppercase(), String::new()),
    }
}

async fn handle_client(stream: Box<dyn Io>, shared: Shared) -> io::Result<()> {
    let Shared {
        tree,
        commands,
        data_resumptions,
        epsv,
        tls,
    } = shared;
    let mut reader: Control = BufReader::new(stream);
    reply(&mut reader, "220-Welcome to the test server\r\n220 Ready").await?;

    let mut state = ClientState {
        cwd: "/".to_string(),
        user: None,
        logged_in: false,
        secured: false,
        protected: false,
        passive: None,
        rename_from: None,
    };
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let (cmd, arg) = parse_command(&line);
        commands.lock().unwrap().push(format!("{} {}", cmd, arg).trim().to_string());

        if cmd == "AUTH" {
            let acceptor = match &tls {
                TlsMode::Required(a) | TlsMode::IgnoreProt(a) if !state.secured => a.clone(),
                _ => {
                    reply(&mut reader, "502 AUTH not available").await?;
                    continue;
                }
            };
            reply(&mut reader, "234 Proceed with negotiation").await?;
            let secured: Box<dyn Io> = Box::new(acceptor.accept(reader.into_inner()).await?);
            reader = BufReader::new(secured);
            state.secured = true;
            continue;
        }
        if matches!(tls, TlsMode::Required(_)) && !state.secured && cmd != "QUIT" {
            reply(&mut reader, "530 TLS required").await?;
            continue;
        }
        if !state.logged_in && !matches!(cmd.as_str(), "USER" | "PASS" | "QUIT") {
            reply(&mut reader, "530 Please login with USER and PASS").await?;
            continue;
        }

        let data_tls = match &tls {
            TlsMode::Required(a) if state.protected => Some(a),
            _ => None,
        };
        let data = DataPolicy {
            tls: data_tls,
            resumptions: &data_resumptions,
        };

        match cmd.as_str() {
            "USER" => {
                state.user = Some(arg);
                reply(&mut reader, "331 Password required").await?;
            }
            "PASS" => {
                if state.user.as_deref() == Some(USER) && arg == PASSWORD {
                    state.logged_in = true;
                    reply(&mut reader, "230 Login successful").await?;
                } else {
                    reply(&mut reader, "530 Login incorrect").await?;
                }
            }
            "TYPE" => reply(&mut reader, "200 Switching to Binary mode").await?,
            "PBSZ" if state.secured => reply(&mut reader, "200 PBSZ=0").await?,
            "PROT" if state.secured => {
                state.protected = arg.eq_ignore_ascii_case("P");
                reply(&mut reader, "200 Protection level set").await?;
            }
            "PWD" => {
                let msg = format!("257 \"{}\" is the current directory", state.cwd);
                reply(&mut reader, &msg).await?;
            }
            "CWD" => {
                let target = resolve(&state.cwd, &arg);
                if tree.lock().unwrap().dirs.contains(&target) {
                    state.cwd = target;
                    reply(&mut reader, "250 Directory successfully changed").await?;
                } else {
                    reply(&mut reader, "550 Failed to change directory").await?;
                }
            }
            "EPSV" if epsv => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                state.passive = Some(listener);
                let msg = format!("229 Entering Extended Passive Mode (|||{}|)", port);
                reply(&mut reader, &msg).await?;
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                state.passive = Some(listener);
                let msg = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})",
                    port >> 8,
                    port & 0xff
                );
                reply(&mut reader, &msg).await?;
            }
            "NLST" | "LIST" => {
                let target = resolve(&state.cwd, &arg);
                let lines = {
                    let tree = tree.lock().unwrap();
                    if tree.dirs.contains(&target) {
                        let prefix = if arg.is_empty() { None } else { Some(arg.trim_end_matches('/')) };
                        Some(
                            tree.children(&target)
                                .into_iter()
                                .map(|name| match (cmd.as_str(), prefix) {
                                    ("NLST", Some(prefix)) => format!("{}/{}", prefix, name),
                                    ("NLST", None) => name,
                                    _ => long_line(&name, 0),
                                })
                                .collect::<Vec<_>>(),
                        )
                    } else {
                        tree.files
                            .get(&target)
                            .map(|content| vec![long_line(base_name(&target), content.len())])
                    }
                };
                match lines {
                    Some(lines) => {
                        let mut body = String::new();
                        for l in lines {
                            body.push_str(&l);
                            body.push_str("\r\n");
                        }
                        send_data(&mut reader, &mut state, &data, body.as_bytes()).await?;
                    }
                    None => reply(&mut reader, "550 No such file or directory").await?,
                }
            }
            "RETR" => {
                let target = resolve(&state.cwd, &arg);
                let content = tree.lock().unwrap().files.get(&target).cloned();
                match content {
                    Some(content) => send_data(&mut reader, &mut state, &data, &content).await?,
                    None => reply(&mut reader, "550 Failed to open file").await?,
                }
            }
            "STOR" => {
                let target = resolve(&state.cwd, &arg);
                if !tree.lock().unwrap().dirs.contains(&parent(&target)) {
                    reply(&mut reader, "553 Could not create file").await?;
                    continue;
                }
                let Some(listener) = state.passive.take() else {
                    reply(&mut reader, "425 Use PASV first").await?;
                    continue;
                };
                reply(&mut reader, "150 Ok to send data").await?;
                let Some(mut stream) = data.accept(&listener).await? else {
                    reply(&mut reader, "522 Data connection must resume the TLS session").await?;
                    continue;
                };
                let mut content = Vec::new();
                match stream.read_to_end(&mut content).await {
                    Ok(_) => {
                        tree.lock().unwrap().files.insert(target, content);
                        reply(&mut reader, "226 Transfer complete").await?;
                    }
                    Err(_) => reply(&mut reader, "426 Transfer aborted").await?,
                }
            }
            "RNFR" => {
                let target = resolve(&state.cwd, &arg);
                let exists = {
                    let tree = tree.lock().unwrap();
                    tree.files.contains_key(&target) || tree.dirs.contains(&target)
                };
                if exists {
                    state.rename_from = Some(target);
                    reply(&mut reader, "350 Ready for RNTO").await?;
                } else {
                    reply(&mut reader, "550 RNFR command failed").await?;
                }
            }
            "RNTO" => {
                let target = resolve(&state.cwd, &arg);
                let Some(from) = state.rename_from.take() else {
                    reply(&mut reader, "503 RNFR required first").await?;
                    continue;
                };
                let moved = {
                    let mut tree = tree.lock().unwrap();
                    if tree.dirs.contains(&parent(&target)) {
                        tree.files.remove(&from).map(|c| tree.files.insert(target, c))
                    } else {
                        None
                    }
                };
                match moved {
                    Some(_) => reply(&mut reader, "250 Rename successful").await?,
                    None => reply(&mut reader, "553 Rename failed").await?,
                }
            }
            "QUIT" => {
                reply(&mut reader, "221 Goodbye").await?;
                return Ok(());
            }
            _ => reply(&mut reader, "502 Command not implemented").await?,
        }
    }
}

async fn reply(reader: &mut Control, msg: &str) -> io::Result<()> {
    let stream = reader.get_mut();
    stream.write_all(msg.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await
}

/// Data connection handling for the current command
struct DataPolicy<'a> {
    tls: Option<&'a TlsAcceptor>,
    resumptions: &'a Mutex<Vec<bool>>,
}

impl DataPolicy<'_> {
    /// Accepts the client's data connection; `None` when a protected
    /// connection did not resume the control session.
    async fn accept(&self, listener: &TcpListener) -> io::Result<Option<Box<dyn Io>>> {
        let (tcp, _) = listener.accept().await?;
        let Some(acceptor) = self.tls else {
            return Ok(Some(Box::new(tcp) as Box<dyn Io>));
        };
        let stream = acceptor.accept(tcp).await?;
        let resumed = stream.get_ref().1.handshake_kind() == Some(HandshakeKind::Resumed);
        self.resumptions.lock().unwrap().push(resumed);
        Ok(resumed.then(|| Box::new(stream) as Box<dyn Io>))
    }
}

async fn send_data(
    reader: &mut Control,
    state: &mut ClientState,
    data: &DataPolicy<'_>,
    body: &[u8],
) -> io::Result<()> {
    let Some(listener) = state.passive.take() else {
        return reply(reader, "425 Use PASV first").await;
    };
    reply(reader, "150 Here comes the data").await?;
    let Some(mut stream) = data.accept(&listener).await? else {
        return reply(reader, "522 Data connection must resume the TLS session").await;
    };
    let sent = async {
        stream.write_all(body).await?;
        stream.shutdown().await
    }
    .await;
    drop(stream);
    match sent {
        Ok(()) => reply(reader, "226 Transfer complete").await,
        Err(_) => reply(reader, "426 Transfer aborted").await,
    }
}

fn long_line(name: &str, size: usize) -> String {
    format!("-rw-r--r--    1 ftp      ftp      {:>8} Jan 01 00:00 {}", size, name)
}

fn resolve(cwd: &str, arg: &str) -> String {
    let joined = if arg.starts_with('/') {
        arg.to_string()
    } else {
        format!("{}/{}", cwd, arg)
    };
    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((dir, _)) => dir.to_string(),
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
