//! Session lifecycle events.
//!
//! Events are committed by the session table in a single per-session
//! sequence and delivered to listeners by the notification dispatcher.

pub mod session;

pub use session::{SessionEvent, SessionLostReason};
