//! Gateway module
//!
//! Request-level orchestration on top of sessions: resolve the endpoint,
//! open a session, serve the request, close the session.

mod operations;
mod results;

pub use operations::{Gateway, NetworkSessionFactory, SessionFactory};
pub use results::{Envelope, GetOutcome, GetRequest, PutRequest};
