//! Peer authentication. Supplies the user id attached to an endpoint at
//! connect time. The permission filter treats that id as opaque.

use async_trait::async_trait;

use meshbus_core::AppResult;
use meshbus_core::error::AppError;
use meshbus_core::types::UserId;

/// What a connecting peer presents.
#[derive(Debug, Clone, Default)]
pub struct PeerCredentials {
    /// User id reported by the operating system or transport, if any.
    pub uid: Option<u32>,
    /// Opaque authentication blob.
    pub token: Option<String>,
}

impl PeerCredentials {
    /// Credentials carrying only an OS-reported uid.
    pub fn from_uid(uid: u32) -> Self {
        Self {
            uid: Some(uid),
            token: None,
        }
    }
}

/// Resolves peer credentials to a user id.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticates a peer.
    async fn authenticate(&self, credentials: &PeerCredentials) -> AppResult<UserId>;
}

/// Accepts the OS-reported uid as is.
#[derive(Debug, Clone, Default)]
pub struct TrustedUidAuthenticator;

#[async_trait]
impl Authenticator for TrustedUidAuthenticator {
    async fn authenticate(&self, credentials: &PeerCredentials) -> AppResult<UserId> {
        let uid = credentials
            .uid
            .map(UserId)
            .ok_or_else(|| AppError::authentication("Peer did not present a user id"))?;
        if !uid.is_valid() {
            return Err(AppError::authentication(format!("Invalid user id {uid}")));
        }
        Ok(uid)
    }
}
