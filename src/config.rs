//! Configuration management for the remote filesystem proxy
//!
//! Baseline connection settings and tuning knobs are loaded once at startup
//! and then passed around read-only.

use config::{Config, Environment, File, Map};
use serde::Deserialize;
use std::time::Duration;

use crate::connection::{Baseline, Protocol};

/// Optional config file looked up in the working directory (`remotefs.toml`).
const CONFIG_FILE: &str = "remotefs";

/// Process-wide configuration, immutable after [`GatewayConfig::load`].
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    // ═══ BASELINE CONNECTION (Environment: PROTOCOL, HOSTNAME, USERNAME, PASSWORD) ═══
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    /// Log level name; `DBUG` also enables wire tracing
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    // ═══ TIMEOUTS ═══
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    /// Directories deeper than this are listed but not expanded by the walker
    #[serde(default = "default_max_walk_depth")]
    pub max_walk_depth: usize,

    // ═══ TRANSPORT SECURITY ═══
    #[serde(default)]
    pub tls_accept_invalid_certs: bool,
    /// Expected SSH host key fingerprint, e.g. `SHA256:...`
    #[serde(default)]
    pub sftp_host_key_fingerprint: Option<String>,
}

fn default_loglevel() -> String {
    "INFO".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_operation_timeout_secs() -> u64 {
    300
}

fn default_max_walk_depth() -> usize {
    64
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            protocol: None,
            hostname: None,
            username: None,
            password: None,
            loglevel: default_loglevel(),
            connect_timeout_secs: default_connect_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
            max_walk_depth: default_max_walk_depth(),
            tls_accept_invalid_certs: false,
            sftp_host_key_fingerprint: None,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from the optional config file with environment overrides
    ///
    /// Values stay strings until deserialization so credentials such as
    /// `0123` are not reinterpreted as numbers.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::build(Environment::default())
    }

    /// Load configuration from an explicit variable map instead of the process environment
    pub fn load_with_env(vars: Map<String, String>) -> Result<Self, config::ConfigError> {
        Self::build(Environment::default().source(Some(vars)))
    }

    fn build(env: Environment) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(env)
            .build()?;
        let config: GatewayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.connect_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.operation_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "operation_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.max_walk_depth == 0 {
            return Err(config::ConfigError::Message(
                "max_walk_depth must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Baseline connection defaults used by the resolver
    pub fn baseline(&self) -> Baseline {
        Baseline {
            protocol: self.protocol.clone(),
            host: self.hostname.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Baseline protocol, if it names a supported one
    pub fn baseline_protocol(&self) -> Option<Protocol> {
        self.protocol.as_deref().and_then(|p| p.parse().ok())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Whether the raw control-channel exchange should be logged
    pub fn wire_debug(&self) -> bool {
        self.loglevel.eq_ignore_ascii_case("DBUG")
    }
}
