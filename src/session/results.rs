//! Session result types
//!
//! Classification outcomes and listing entries produced by sessions and the walker.

use serde::{Serialize, Serializer};

/// Classification of a remote path.
///
/// `Unknown` is a regular outcome: the path is absent or its type cannot be told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathType {
    File,
    Dir,
    Unknown,
}

impl PathType {
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            PathType::File => Some("FILE"),
            PathType::Dir => Some("DIR"),
            PathType::Unknown => None,
        }
    }
}

/// `FILE` / `DIR`, and `null` for unknown entries.
impl Serialize for PathType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_none(),
        }
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathEntry {
    pub filename: String,
    #[serde(rename = "type")]
    pub path_type: PathType,
}

impl PathEntry {
    pub fn new(filename: impl Into<String>, path_type: PathType) -> Self {
        Self {
            filename: filename.into(),
            path_type,
        }
    }
}
