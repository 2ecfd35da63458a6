//! Bus endpoints: handles, the registry that owns them, peer
//! authentication, and link supervision for remote peers.

pub mod authenticator;
pub mod handle;
pub mod heartbeat;
pub mod registry;

pub use authenticator::{Authenticator, PeerCredentials, TrustedUidAuthenticator};
pub use handle::{BusEndpoint, EndpointInfo, EndpointKind};
pub use registry::EndpointRegistry;
