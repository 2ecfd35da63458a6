//! Core type definitions used across the MeshBus workspace.

pub mod id;
pub mod opts;
pub mod transport;

pub use id::*;
pub use opts::{Proximity, SessionOpts, TrafficType};
pub use transport::TransportMask;
