//! Recursive directory listing built on `classify` + `list`

use log::{debug, warn};
use std::vec::IntoIter;

use crate::session::{PathEntry, PathType, RemoteSession};

/// Flattens a remote directory tree into a pre-order listing.
///
/// Every entry is classified individually since no backend returns typed
/// listings. Directories at `max_depth` are reported but not expanded.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryWalker {
    max_depth: usize,
}

impl DirectoryWalker {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Walks everything below `path`. `path` itself is not part of the result.
    pub async fn walk(&self, session: &mut dyn RemoteSession, path: &str) -> Vec<PathEntry> {
        let mut listing = Vec::new();
        let mut pending: Vec<(IntoIter<String>, usize)> =
            vec![(session.list(path).await.into_iter(), 1)];

        loop {
            let Some((children, depth)) = pending.last_mut() else {
                break;
            };
            let depth = *depth;
            let Some(child) = children.next() else {
                pending.pop();
                continue;
            };

            let path_type = session.classify(&child).await;
            listing.push(PathEntry::new(child.clone(), path_type));
            if path_type != PathType::Dir {
                continue;
            }

            if depth >= self.max_depth {
                warn!(
                    "Not expanding {}: walk depth limit of {} reached",
                    child, self.max_depth
                );
                continue;
            }
            let grandchildren = session.list(&child).await;
            pending.push((grandchildren.into_iter(), depth + 1));
        }

        debug!("Walked {:?}: {} entries", path, listing.len());
        listing
    }
}
