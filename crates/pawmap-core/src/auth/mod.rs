//! Session management for the signed-in user.
//!
//! The session holds the bearer token attached to write calls and the user
//! id used for ownership checks. It is persisted as `session.json` in the
//! cache directory.

pub mod session;

pub use session::{Session, SessionData};
