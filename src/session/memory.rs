//! In-memory session double for walker and gateway tests

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use super::{PathType, RemoteSession};
use crate::connection::Protocol;
use crate::error::SessionError;
use crate::utils::path::{SFTP_ROOT, join_remote};

/// Observations shared with the test after the session has been handed out.
#[derive(Debug, Default)]
pub(crate) struct MemoryLog {
    pub(crate) closes: usize,
    pub(crate) renames: Vec<(String, String)>,
    pub(crate) uploads: Vec<(String, Vec<u8>)>,
    pub(crate) classified: Vec<String>,
}

#[derive(Clone)]
pub(crate) struct MemorySession {
    protocol: Protocol,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    deny_renames: bool,
    pub(crate) log: Arc<Mutex<MemoryLog>>,
}

impl MemorySession {
    pub(crate) fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            files: BTreeMap::new(),
            dirs: BTreeSet::new(),
            deny_renames: false,
            log: Arc::new(Mutex::new(MemoryLog::default())),
        }
    }

    pub(crate) fn with_dir(mut self, path: &str) -> Self {
        self.dirs.insert(path.to_string());
        self
    }

    pub(crate) fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    pub(crate) fn denying_renames(mut self) -> Self {
        self.deny_renames = true;
        self
    }

    fn is_root(path: &str) -> bool {
        path.is_empty() || path == SFTP_ROOT || path == "/"
    }

    fn children_of(&self, parent: &str) -> Vec<String> {
        self.dirs
            .iter()
            .chain(self.files.keys())
            .filter(|path| {
                let dir = path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
                dir == parent || (Self::is_root(dir) && Self::is_root(parent))
            })
            .filter_map(|path| path.rsplit('/').next())
            .map(|name| join_remote(parent, name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn classify(&mut self, path: &str) -> PathType {
        if let Ok(mut log) = self.log.lock() {
            log.classified.push(path.to_string());
        }
        if Self::is_root(path) || self.dirs.contains(path) {
            PathType::Dir
        } else if self.files.contains_key(path) {
            PathType::File
        } else {
            PathType::Unknown
        }
    }

    async fn list(&mut self, path: &str) -> Vec<String> {
        if Self::is_root(path) || self.dirs.contains(path) {
            self.children_of(path)
        } else {
            Vec::new()
        }
    }

    async fn stream_in(&mut self, path: &str) -> Result<Cursor<Vec<u8>>, SessionError> {
        self.files
            .get(path)
            .map(|content| Cursor::new(content.clone()))
            .ok_or_else(|| SessionError::NotFound(path.to_string()))
    }

    async fn stream_out(&mut self, path: &str, data: &[u8]) -> Result<(), SessionError> {
        self.files.insert(path.to_string(), data.to_vec());
        if let Ok(mut log) = self.log.lock() {
            log.uploads.push((path.to_string(), data.to_vec()));
        }
        Ok(())
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
        if self.deny_renames {
            return Err(SessionError::PermissionDenied(to.to_string()));
        }
        let content = self
            .files
            .remove(from)
            .ok_or_else(|| SessionError::NotFound(from.to_string()))?;
        self.files.insert(to.to_string(), content);
        if let Ok(mut log) = self.log.lock() {
            log.renames.push((from.to_string(), to.to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Ok(mut log) = self.log.lock() {
            log.closes += 1;
        }
        Ok(())
    }
}
