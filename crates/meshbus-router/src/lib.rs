//! # meshbus-router
//!
//! Routing core of a MeshBus instance. Provides:
//!
//! - Endpoint registry with unique-name minting and link supervision
//! - Transport permission filter backed by a per-user permission database
//! - Session table with port reservations and ordered membership
//! - Message router (unicast, session-cast, broadcast) with backpressure
//! - Session listener dispatch on a dedicated task, ordered per session
//! - The `BusController` that owns and wires all of the above

pub mod bus;
pub mod dispatch;
pub mod endpoint;
pub mod message;
pub mod metrics;
pub mod permission;
pub mod router;
pub mod session;
pub mod transport;

pub use bus::{Attachment, BusController, BusSnapshot};
pub use dispatch::{Dispatcher, SessionListener, SessionPortListener};
pub use endpoint::{BusEndpoint, EndpointKind, EndpointRegistry, PeerCredentials};
pub use message::types::{Message, MessageKind};
pub use permission::{PermissionDb, TransportPermission};
pub use router::Router;
pub use session::{SessionSnapshot, SessionState, SessionTable};
pub use transport::{MemoryTransport, Transport};
