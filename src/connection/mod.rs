//! Connection resolution
//!
//! Decides which protocol, host and credentials a request uses.

pub mod credentials;
pub mod resolver;
pub mod spec;

pub use credentials::BasicCredentials;
pub use resolver::{Baseline, ConnectionSpecResolver, RequestContext};
pub use spec::{ConnectionSpec, Protocol, ResolvedSpec};
