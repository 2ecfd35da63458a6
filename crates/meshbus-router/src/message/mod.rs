//! Routed message types and header validation.

pub mod types;
pub mod validator;

pub use types::{Message, MessageKind};
