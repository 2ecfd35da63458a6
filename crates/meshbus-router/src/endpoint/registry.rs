//! Endpoint registry; owns every connected endpoint by unique name.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use meshbus_core::config::RouterRole;
use meshbus_core::config::router::RouterConfig;
use meshbus_core::error::AppError;
use meshbus_core::events::SessionLostReason;
use meshbus_core::types::{TransportMask, UserId};

use crate::message::types::Message;
use crate::message::validator::validate_bus_name;
use crate::metrics::{BusMetrics, endpoints};
use crate::permission::PermissionDb;
use crate::session::SessionTable;

use super::handle::{BusEndpoint, EndpointInfo, EndpointKind};

/// Registry of all endpoints attached to this bus instance.
#[derive(Debug)]
pub struct EndpointRegistry {
    /// Unique name → endpoint.
    endpoints: DashMap<String, Arc<BusEndpoint>>,
    /// Session table cleaned on unregister.
    sessions: Arc<SessionTable>,
    /// Permission cache cleaned on unregister.
    permissions: Arc<PermissionDb>,
    /// Metrics.
    metrics: Arc<BusMetrics>,
    /// Short guid prefixing minted unique names.
    guid: String,
    /// Whether this instance may mint names.
    role: RouterRole,
    /// Counter for minted names.
    next_name: AtomicU64,
    /// Inbound queue capacity for new endpoints.
    queue_size: usize,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    pub fn new(
        config: &RouterConfig,
        sessions: Arc<SessionTable>,
        permissions: Arc<PermissionDb>,
        metrics: Arc<BusMetrics>,
    ) -> Self {
        let guid = config
            .guid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string()[..8].to_string());
        info!(guid = %guid, role = %config.role, "Endpoint registry initialized");
        Self {
            endpoints: DashMap::new(),
            sessions,
            permissions,
            metrics,
            guid,
            role: config.role,
            next_name: AtomicU64::new(1),
            queue_size: config.inbound_queue_size.max(1),
        }
    }

    /// The guid used in minted names.
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Mints a fresh unique name, or an empty string on a client router.
    pub fn generate_unique_name(&self) -> String {
        if self.role == RouterRole::Client {
            return String::new();
        }
        let n = self.next_name.fetch_add(1, Ordering::Relaxed);
        format!(":{}.{}", self.guid, n)
    }

    /// Builds an endpoint and its inbound queue without registering it.
    pub fn create(
        &self,
        name: String,
        kind: EndpointKind,
        user_id: UserId,
        transport: TransportMask,
    ) -> (Arc<BusEndpoint>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(self.queue_size);
        let endpoint = Arc::new(BusEndpoint::new(name, kind, user_id, transport, tx));
        (endpoint, rx)
    }

    /// Adds an endpoint. Fails if the name is taken.
    pub fn register(&self, endpoint: Arc<BusEndpoint>) -> Result<(), AppError> {
        validate_bus_name(&endpoint.name)?;
        match self.endpoints.entry(endpoint.name.clone()) {
            Entry::Occupied(_) => Err(AppError::duplicate_name(format!(
                "Bus name {} is already registered",
                endpoint.name
            ))),
            Entry::Vacant(slot) => {
                info!(
                    endpoint = %endpoint.name,
                    kind = ?endpoint.kind,
                    user_id = %endpoint.user_id,
                    "Endpoint registered"
                );
                slot.insert(endpoint);
                endpoints::record_register(&self.metrics);
                Ok(())
            }
        }
    }

    /// Removes an endpoint that went away without leaving its sessions.
    pub fn unregister(&self, name: &str) -> Option<Arc<BusEndpoint>> {
        self.unregister_with_reason(name, SessionLostReason::RemoteEndClosedAbruptly)
    }

    /// Removes an endpoint and, before returning, every session membership,
    /// port reservation and cached permission it held.
    pub fn unregister_with_reason(
        &self,
        name: &str,
        reason: SessionLostReason,
    ) -> Option<Arc<BusEndpoint>> {
        let (_, endpoint) = self.endpoints.remove(name)?;
        endpoint.mark_dead();
        self.sessions.on_endpoint_disconnect(name, reason);
        self.permissions.clean_permission_cache(name);
        endpoints::record_unregister(&self.metrics);
        info!(endpoint = %name, %reason, "Endpoint unregistered");
        Some(endpoint)
    }

    /// Looks up a registered endpoint.
    pub fn find(&self, name: &str) -> Result<Arc<BusEndpoint>, AppError> {
        self.get(name)
            .ok_or_else(|| AppError::no_endpoint(format!("No endpoint named {name}")))
    }

    /// Looks up a registered endpoint, if present.
    pub fn get(&self, name: &str) -> Option<Arc<BusEndpoint>> {
        self.endpoints.get(name).map(|e| e.value().clone())
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    /// Every registered endpoint except `exclude`.
    pub fn others(&self, exclude: &str) -> Vec<Arc<BusEndpoint>> {
        self.endpoints
            .iter()
            .filter(|e| e.key() != exclude)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Remote endpoints, for link supervision.
    pub fn remote_endpoints(&self) -> Vec<Arc<BusEndpoint>> {
        self.endpoints
            .iter()
            .filter(|e| e.value().kind == EndpointKind::Remote)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Info snapshots sorted by name.
    pub fn list(&self) -> Vec<EndpointInfo> {
        let mut infos: Vec<EndpointInfo> = self.endpoints.iter().map(|e| e.value().info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Unregisters every endpoint.
    pub fn unregister_all(&self, reason: SessionLostReason) {
        let names: Vec<String> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        debug!(count = names.len(), "Unregistering all endpoints");
        for name in names {
            self.unregister_with_reason(&name, reason);
        }
    }
}
