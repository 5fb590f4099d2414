//! SFTP client sessions (SSH password authentication)

mod handler;
mod session;

pub use session::SftpSession;
