//! Connection spec resolution
//!
//! Layers, lowest precedence first:
//! 1. baseline defaults from process configuration
//! 2. an optional per-route variable (environment, then query parameter)
//!    whose `ftp://` / `ftps://` / `sftp://` value overrides protocol and host
//! 3. request basic-auth credentials, overriding baseline credentials
//!
//! The resolver never fails; callers run [`ResolvedSpec::complete`].

use log::debug;
use std::collections::HashMap;

use super::credentials::BasicCredentials;
use super::spec::{Protocol, ResolvedSpec};

/// Baseline connection defaults, read once at startup
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// The parts of an incoming request the resolver looks at
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub query: HashMap<String, String>,
    pub credentials: Option<BasicCredentials>,
}

impl RequestContext {
    pub fn with_credentials(mut self, credentials: BasicCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct ConnectionSpecResolver {
    baseline: Baseline,
    env: EnvLookup,
}

const SCHEMES: [(&str, Protocol); 3] = [
    ("ftp://", Protocol::Ftp),
    ("ftps://", Protocol::Ftps),
    ("sftp://", Protocol::Sftp),
];

impl ConnectionSpecResolver {
    /// Resolver reading override variables from the process environment
    pub fn new(baseline: Baseline) -> Self {
        Self::with_env_lookup(baseline, |name| std::env::var(name).ok())
    }

    pub fn with_env_lookup<F>(baseline: Baseline, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            baseline,
            env: Box::new(lookup),
        }
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Resolves protocol, host and credentials for one request.
    pub fn resolve(&self, variable: Option<&str>, request: &RequestContext) -> ResolvedSpec {
        let mut protocol = self
            .baseline
            .protocol
            .as_ref()
            .map(|p| p.to_ascii_uppercase());
        let mut host = self.baseline.host.clone();

        if let Some(name) = variable {
            if let Some(url) = self.lookup_variable(name, request) {
                match parse_endpoint_url(&url) {
                    Some((p, h)) => {
                        debug!("Variable {} overrides endpoint with {}://{}", name, p, h);
                        protocol = Some(p.as_str().to_string());
                        host = Some(h);
                    }
                    None => debug!("Variable {} carries no usable endpoint url", name),
                }
            }
        }

        let (username, password) = match &request.credentials {
            Some(creds) => (Some(creds.username.clone()), Some(creds.password.clone())),
            None => (self.baseline.username.clone(), self.baseline.password.clone()),
        };

        ResolvedSpec {
            protocol,
            host,
            username,
            password,
        }
    }

    /// Environment variable named by the uppercased name wins over the query parameter.
    fn lookup_variable(&self, name: &str, request: &RequestContext) -> Option<String> {
        (self.env)(&name.to_ascii_uppercase())
            .or_else(|| request.query.get(name).cloned())
            .filter(|v| !v.is_empty())
    }
}

/// Splits a scheme-prefixed endpoint into protocol and host.
///
/// Only yields a result when both sides are determinable.
fn parse_endpoint_url(url: &str) -> Option<(Protocol, String)> {
    SCHEMES.iter().find_map(|(prefix, protocol)| {
        let rest = url.strip_prefix(prefix)?;
        let host = rest.split('/').next().unwrap_or_default();
        (!host.is_empty()).then(|| (*protocol, host.to_string()))
    })
}
