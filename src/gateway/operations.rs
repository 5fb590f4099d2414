//! Gateway operations
//!
//! Every entry point resolves the connection spec, opens a fresh session,
//! serves the request and closes the session again, whatever the outcome.

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::connection::{ConnectionSpec, ConnectionSpecResolver, RequestContext};
use crate::error::{GatewayError, IncompleteSpecError, SessionError};
use crate::gateway::results::{Envelope, GetOutcome, GetRequest, PutRequest};
use crate::navigate::DirectoryWalker;
use crate::session::{self, PathType, RemoteSession, SessionOptions};
use crate::utils::path::{file_name, normalize_request_path};
use crate::utils::validation::is_accepted_mimetype;

/// Opens authenticated sessions for resolved specs.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, spec: &ConnectionSpec) -> Result<Box<dyn RemoteSession>, SessionError>;
}

/// Opens real network sessions
pub struct NetworkSessionFactory {
    options: SessionOptions,
}

impl NetworkSessionFactory {
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionFactory for NetworkSessionFactory {
    async fn open(&self, spec: &ConnectionSpec) -> Result<Box<dyn RemoteSession>, SessionError> {
        session::connect(spec, &self.options).await
    }
}

pub struct Gateway<F = NetworkSessionFactory> {
    resolver: ConnectionSpecResolver,
    factory: F,
    walker: DirectoryWalker,
}

impl Gateway<NetworkSessionFactory> {
    /// Gateway over the network with baseline and tuning from `config`
    pub fn from_config(config: &GatewayConfig) -> Self {
        Gateway::new(
            ConnectionSpecResolver::new(config.baseline()),
            NetworkSessionFactory::new(SessionOptions::from(config)),
            DirectoryWalker::new(config.max_walk_depth),
        )
    }
}

impl<F: SessionFactory> Gateway<F> {
    pub fn new(resolver: ConnectionSpecResolver, factory: F, walker: DirectoryWalker) -> Self {
        Self {
            resolver,
            factory,
            walker,
        }
    }

    /// Lists a directory recursively or downloads a file.
    pub async fn get(
        &self,
        request: &GetRequest,
        context: &RequestContext,
    ) -> Result<GetOutcome, GatewayError> {
        let spec = self.resolve(None, context)?;
        let mut session = self.factory.open(&spec).await?;
        let path = normalize_request_path(&request.path, spec.protocol);
        let result = self.serve_get(session.as_mut(), path, request).await;
        release(session).await;
        result
    }

    /// Uploads the request body after checking its mimetype.
    pub async fn put(
        &self,
        request: &PutRequest,
        context: &RequestContext,
    ) -> Result<Envelope, GatewayError> {
        if !is_accepted_mimetype(&request.mimetype) {
            return Err(GatewayError::UnacceptedMimetype(request.mimetype.clone()));
        }
        let spec = self.resolve(None, context)?;
        let mut session = self.factory.open(&spec).await?;
        let result = session.stream_out(&request.path, &request.body).await;
        release(session).await;

        result?;
        info!("Stored {} bytes to {}", request.body.len(), request.path);
        Ok(Envelope::success(format!(
            "Stored {} bytes to {}",
            request.body.len(),
            request.path
        )))
    }

    /// Downloads `fpath` from the endpoint named by `variable`, without
    /// classifying it first.
    pub async fn fetch_file(
        &self,
        variable: &str,
        fpath: &str,
        context: &RequestContext,
    ) -> Result<GetOutcome, GatewayError> {
        if fpath.is_empty() {
            return Err(GatewayError::BadRequest(
                "Missing the mandatory parameter.".into(),
            ));
        }
        let spec = match self.resolve(Some(variable), context) {
            Err(IncompleteSpecError::MissingProtocol | IncompleteSpecError::MissingHost) => {
                return Err(GatewayError::BadRequest(format!(
                    "Cannot find the endpoint url for {}",
                    variable
                )));
            }
            other => other?,
        };

        let mut session = self.factory.open(&spec).await?;
        let result = session.stream_in(fpath).await;
        release(session).await;

        Ok(GetOutcome::Attachment {
            filename: file_name(fpath).to_string(),
            content: result?.into_inner(),
        })
    }

    fn resolve(
        &self,
        variable: Option<&str>,
        context: &RequestContext,
    ) -> Result<ConnectionSpec, IncompleteSpecError> {
        let spec = self.resolver.resolve(variable, context).complete()?;
        debug!("Resolved {:?}", spec);
        Ok(spec)
    }

    async fn serve_get(
        &self,
        session: &mut dyn RemoteSession,
        path: String,
        request: &GetRequest,
    ) -> Result<GetOutcome, GatewayError> {
        match session.classify(&path).await {
            PathType::Dir => Ok(GetOutcome::Listing(self.walker.walk(session, &path).await)),
            PathType::File => {
                let content = session.stream_in(&path).await?.into_inner();
                if let Some(move_to) = &request.move_to {
                    match session.rename(&path, move_to).await {
                        Ok(()) => info!("renamed {} to {}", path, move_to),
                        Err(e) if request.ignore_move_to_errors => {
                            warn!("failed to rename {} to {}: {}", path, move_to, e);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(GetOutcome::Attachment {
                    filename: file_name(&path).to_string(),
                    content,
                })
            }
            PathType::Unknown if request.ignore_404_errors => Ok(GetOutcome::Empty),
            PathType::Unknown => Ok(GetOutcome::NotFound),
        }
    }
}

/// Closes a session; failures are logged since the request outcome is already decided.
async fn release(mut session: Box<dyn RemoteSession>) {
    if let Err(e) = session.close().await {
        warn!("Closing {} session failed: {}", session.protocol(), e);
    }
}
