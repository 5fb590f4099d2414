//! SSH client handler: server host key policy

use log::{info, warn};
use russh::client;
use russh::keys::{HashAlg, PublicKey};

/// Accepts the server key when it matches the pinned SHA256 fingerprint, or
/// any key when nothing is pinned.
pub(crate) struct HostKeyPolicy {
    host: String,
    pinned: Option<String>,
}

impl HostKeyPolicy {
    pub(crate) fn new(host: &str, pinned: Option<String>) -> Self {
        Self {
            host: host.to_string(),
            pinned,
        }
    }
}

impl client::Handler for HostKeyPolicy {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let actual = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        match &self.pinned {
            Some(expected) if fingerprint_matches(expected, &actual) => Ok(true),
            Some(expected) => {
                warn!(
                    "Host key for {} is {}, expected {}; refusing connection",
                    self.host, actual, expected
                );
                Ok(false)
            }
            None => {
                info!("Accepting host key {} for {}", actual, self.host);
                Ok(true)
            }
        }
    }
}

/// Compares fingerprints, tolerating a missing `SHA256:` prefix.
pub(crate) fn fingerprint_matches(expected: &str, actual: &str) -> bool {
    let strip = |fp: &str| {
        let fp = fp.trim();
        fp.strip_prefix("SHA256:").unwrap_or(fp).trim_end_matches('=').to_string()
    };
    strip(expected) == strip(actual)
}
