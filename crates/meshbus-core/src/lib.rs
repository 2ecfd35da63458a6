//! # meshbus-core
//!
//! Core crate for MeshBus. Contains configuration schemas, typed
//! session identifiers, transport masks, session options, session
//! lifecycle events, and the unified error system.
//!
//! This crate has **no** internal dependencies on other MeshBus crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
