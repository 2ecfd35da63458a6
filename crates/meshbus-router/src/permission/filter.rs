//! Transport permission filter.

use std::sync::Arc;

use tracing::warn;

use meshbus_core::error::AppError;
use meshbus_core::types::TransportMask;

use crate::endpoint::handle::BusEndpoint;

use super::db::PermissionDb;

/// Decides which of the requested transports an endpoint may use.
#[derive(Debug, Clone)]
pub struct TransportPermission {
    /// Permission records.
    db: Arc<PermissionDb>,
}

impl TransportPermission {
    /// Creates a filter over a permission database.
    pub fn new(db: Arc<PermissionDb>) -> Self {
        Self { db }
    }

    /// Returns the subset of `requested` the endpoint may use.
    ///
    /// Fails with `NoEndpoint` for an invalid endpoint and with
    /// `NoTransports` when nothing remains. `caller` only labels the log.
    pub fn filter_transports(
        &self,
        endpoint: &BusEndpoint,
        requested: TransportMask,
        caller: &str,
    ) -> Result<TransportMask, AppError> {
        if !endpoint.is_valid() {
            warn!(endpoint = %endpoint.name, caller, "No bus endpoint found for sender");
            return Err(AppError::no_endpoint(format!(
                "No bus endpoint found for sender {}",
                endpoint.name
            )));
        }

        let allowed = self
            .db
            .allowed_for_endpoint(&endpoint.name, endpoint.user_id);
        let mut transports = requested;

        if transports.intersects(TransportMask::IP) && !allowed.intersects(TransportMask::IP) {
            transports = transports.without(TransportMask::IP);
            warn!(
                endpoint = %endpoint.name,
                user_id = %endpoint.user_id,
                caller,
                "No permission to use IP transports"
            );
        }
        // Only IP is gated per user; an empty grant is the all-denied record.
        if allowed.is_empty() {
            transports = TransportMask::NONE;
        }

        if transports.is_empty() {
            return Err(AppError::no_transports(format!(
                "No permitted transports for {} (requested {})",
                endpoint.name, requested
            )));
        }
        Ok(transports)
    }

    /// The underlying permission database.
    pub fn db(&self) -> &Arc<PermissionDb> {
        &self.db
    }
}
