pub mod config;
pub mod connection;
pub mod error;
pub mod ftp;
pub mod gateway;
pub mod navigate;
pub mod session;
pub mod sftp;
pub mod utils;

pub use connection::{ConnectionSpec, ConnectionSpecResolver, Protocol};
pub use gateway::Gateway;
pub use navigate::DirectoryWalker;
pub use session::{PathEntry, PathType, RemoteSession};
