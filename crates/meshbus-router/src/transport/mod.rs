//! Transport collaborator: the seam between the router and whatever
//! carries bytes to remote peers.

pub mod forwarder;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use meshbus_core::AppResult;
use meshbus_core::types::TransportMask;

pub use forwarder::spawn_forwarder;
pub use memory::MemoryTransport;

/// A carrier for remote endpoints.
///
/// Inbound frames are handed to the bus with `BusController::receive`;
/// a dead link is reported with `BusController::endpoint_lost`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// The transport bit this carrier implements.
    fn mask(&self) -> TransportMask;

    /// Sends one marshaled message to `endpoint`.
    async fn send(&self, endpoint: &str, frame: Bytes) -> AppResult<()>;
}
