//! FTP and FTPS client sessions
//!
//! Passive mode only. Transfers are binary (`TYPE I`).

mod control;
mod reply;
mod secure;
mod session;
mod stream;

pub use secure::{FtpsSession, TlsChannelConfig};
pub use session::FtpSession;
