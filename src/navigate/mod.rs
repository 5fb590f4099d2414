//! Navigate module
//!
//! Protocol-agnostic traversal of remote directory trees.

mod walker;

pub use walker::DirectoryWalker;
