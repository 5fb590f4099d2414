//! FTPS: explicit TLS on the control channel and protected data channels
//!
//! Many servers (vsftpd with `require_ssl_reuse`, FileZilla Server) refuse a
//! data connection unless its TLS session resumes the control connection's
//! session. Both channels therefore go through one [`TlsChannelConfig`], which
//! shares a single rustls client config and its session cache.

use async_trait::async_trait;
use log::{debug, warn};
use std::io::{self, Cursor};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{Resumption, Tls12Resumption};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms, ring};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::control::ControlChannel;
use super::session::FtpSession;
use crate::connection::{ConnectionSpec, Protocol};
use crate::error::SessionError;
use crate::session::{PathType, RemoteSession, SessionOptions};

/// Cached TLS sessions per client config
const SESSION_CACHE_SIZE: usize = 32;

/// TLS parameters shared by the control channel and every data channel of
/// one FTPS session.
#[derive(Clone)]
pub struct TlsChannelConfig {
    connector: TlsConnector,
    client_config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
}

impl TlsChannelConfig {
    pub fn new(host: &str, accept_invalid_certs: bool) -> Result<Self, SessionError> {
        let provider = Arc::new(ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| SessionError::Connection(format!("TLS setup failed: {}", e)))?;

        let mut client_config = if accept_invalid_certs {
            warn!("Certificate verification disabled for {}", host);
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert::new(&provider)))
                .with_no_client_auth()
        } else {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        };
        client_config.resumption = Resumption::in_memory_sessions(SESSION_CACHE_SIZE)
            .tls12_resumption(Tls12Resumption::SessionIdOrTickets);

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| SessionError::Connection(format!("invalid TLS name {}: {}", host, e)))?;

        let client_config = Arc::new(client_config);
        Ok(Self {
            connector: TlsConnector::from(client_config.clone()),
            client_config,
            server_name,
        })
    }

    /// Runs a client handshake over `tcp`, resuming a cached session when possible.
    pub(crate) async fn connect(&self, tcp: TcpStream) -> io::Result<TlsStream<TcpStream>> {
        let stream = self.connector.connect(self.server_name.clone(), tcp).await?;
        let (_, conn) = stream.get_ref();
        debug!(
            "TLS established with {:?} ({:?}, resumed: {})",
            self.server_name,
            conn.protocol_version(),
            conn.handshake_kind() == Some(rustls::HandshakeKind::Resumed)
        );
        Ok(stream)
    }

    /// Whether both configs resolve to the same session cache.
    pub fn shares_session_store(&self, other: &TlsChannelConfig) -> bool {
        Arc::ptr_eq(&self.client_config, &other.client_config) && self.server_name == other.server_name
    }
}

/// Skips chain validation while still checking handshake signatures.
#[derive(Debug)]
struct AcceptAnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AcceptAnyServerCert {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// FTP over explicit TLS with private data channels
pub struct FtpsSession {
    inner: FtpSession,
}

impl FtpsSession {
    pub async fn connect(
        spec: &ConnectionSpec,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        let (host, port) = spec.endpoint();
        debug!("ftps connecting to {} with {}", spec.host, spec.username);
        let tls = TlsChannelConfig::new(&host, options.tls_accept_invalid_certs)?;

        let control = ControlChannel::open(
            &host,
            port,
            options.connect_timeout,
            options.operation_timeout,
            options.wire_debug,
        )
        .await?;
        let control = control.secure(&tls).await?;

        let mut inner = FtpSession::from_control(control, Protocol::Ftps);
        inner.login(&spec.username, &spec.password).await?;

        let control = inner.control_mut();
        for (cmd, arg) in [("PBSZ", "0"), ("PROT", "P")] {
            let reply = control.command(cmd, Some(arg)).await?;
            if !reply.is_completion() {
                return Err(SessionError::Protocol(format!(
                    "{} {} refused ({}): {}",
                    cmd,
                    arg,
                    reply.code,
                    reply.text()
                )));
            }
        }
        inner.secure_data_channels(tls);
        Ok(Self { inner })
    }

    /// TLS parameters of the data channels, shared with the control channel.
    pub fn data_channel_tls(&self) -> Option<&TlsChannelConfig> {
        self.inner.data_channel_tls()
    }
}

#[async_trait]
impl RemoteSession for FtpsSession {
    fn protocol(&self) -> Protocol {
        Protocol::Ftps
    }

    async fn classify(&mut self, path: &str) -> PathType {
        self.inner.classify(path).await
    }

    async fn list(&mut self, path: &str) -> Vec<String> {
        self.inner.list(path).await
    }

    async fn stream_in(&mut self, path: &str) -> Result<Cursor<Vec<u8>>, SessionError> {
        self.inner.stream_in(path).await
    }

    async fn stream_out(&mut self, path: &str, data: &[u8]) -> Result<(), SessionError> {
        self.inner.stream_out(path, data).await
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
        self.inner.rename(from, to).await
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.inner.close().await
    }
}
