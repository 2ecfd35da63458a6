//! Top-level bus controller that constructs, owns and wires every
//! component, and exposes the administrative surface.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use meshbus_core::config::{AppConfig, RouterRole};
use meshbus_core::error::AppError;
use meshbus_core::events::SessionLostReason;
use meshbus_core::types::{SessionId, SessionOpts, SessionPort, TransportMask, UserId};

use crate::dispatch::{Dispatcher, SessionListener, SessionPortListener};
use crate::endpoint::heartbeat::{LinkMonitorConfig, run_link_monitor};
use crate::endpoint::{
    Authenticator, BusEndpoint, EndpointKind, EndpointRegistry, PeerCredentials,
    TrustedUidAuthenticator,
};
use crate::message::types::Message;
use crate::metrics::{BusMetrics, MetricsSnapshot};
use crate::permission::{PermissionDb, TransportPermission};
use crate::router::Router;
use crate::session::{SessionSnapshot, SessionState, SessionTable};
use crate::transport::{Transport, spawn_forwarder};

/// A local application's attachment to the bus.
#[derive(Debug)]
pub struct Attachment {
    /// Unique name assigned at connect time.
    pub name: String,
    /// The registered endpoint.
    pub endpoint: Arc<BusEndpoint>,
    /// Messages routed to this attachment.
    pub inbox: mpsc::Receiver<Message>,
}

/// Administrative view of the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSnapshot {
    /// Unique-name guid
    pub guid: String,
    /// Name-minting role
    pub role: RouterRole,
    /// Registered endpoints
    pub endpoints: usize,
    /// Bound session ports
    pub ports: usize,
    /// Live sessions
    pub sessions: usize,
    /// Joins awaiting an accept-callback
    pub pending_joins: usize,
    /// Counters
    pub metrics: MetricsSnapshot,
}

/// Owns the registry, session table, router, permission filter and
/// dispatcher of one bus instance.
#[derive(Clone)]
pub struct BusController {
    /// Endpoint registry.
    pub registry: Arc<EndpointRegistry>,
    /// Session table.
    pub sessions: Arc<SessionTable>,
    /// Message router.
    pub router: Arc<Router>,
    /// Transport permission filter.
    pub permissions: TransportPermission,
    /// Metrics collector.
    pub metrics: Arc<BusMetrics>,
    /// Notification dispatcher.
    dispatcher: Dispatcher,
    /// Peer authentication.
    authenticator: Arc<dyn Authenticator>,
    /// Name-minting role.
    role: RouterRole,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl std::fmt::Debug for BusController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusController")
            .field("guid", &self.registry.guid())
            .field("role", &self.role)
            .finish()
    }
}

impl BusController {
    /// Builds a bus trusting OS-reported user ids. Must run inside a Tokio
    /// runtime.
    pub fn new(config: AppConfig) -> Self {
        Self::with_authenticator(config, Arc::new(TrustedUidAuthenticator))
    }

    /// Builds a bus with a custom authenticator.
    pub fn with_authenticator(config: AppConfig, authenticator: Arc<dyn Authenticator>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        let metrics = Arc::new(BusMetrics::new());
        let dispatcher = Dispatcher::spawn(metrics.clone(), shutdown_tx.subscribe());
        let sessions = Arc::new(SessionTable::new(
            dispatcher.clone(),
            metrics.clone(),
            config.session.clone(),
        ));
        let db = Arc::new(PermissionDb::from_config(&config.permission));
        let permissions = TransportPermission::new(db.clone());
        let registry = Arc::new(EndpointRegistry::new(
            &config.router,
            sessions.clone(),
            db,
            metrics.clone(),
        ));
        let router = Arc::new(Router::new(
            registry.clone(),
            sessions.clone(),
            permissions.clone(),
            metrics.clone(),
        ));

        if config.router.link_timeout_seconds > 0 {
            let monitor = LinkMonitorConfig {
                check_interval: Duration::from_secs(config.router.link_check_interval_seconds.max(1)),
                link_timeout: Duration::from_secs(config.router.link_timeout_seconds),
            };
            tokio::spawn(run_link_monitor(
                registry.clone(),
                monitor,
                shutdown_tx.subscribe(),
            ));
        }

        info!(guid = %registry.guid(), role = %config.router.role, "Bus controller initialized");

        Self {
            registry,
            sessions,
            router,
            permissions,
            metrics,
            dispatcher,
            authenticator,
            role: config.router.role,
            shutdown_tx,
        }
    }

    /// Authenticates a local peer and attaches it under a minted name.
    pub async fn connect(&self, credentials: &PeerCredentials) -> Result<Attachment, AppError> {
        let user_id = self.authenticator.authenticate(credentials).await?;
        self.connect_local(user_id)
    }

    /// Attaches a local application under a minted unique name.
    pub fn connect_local(&self, user_id: UserId) -> Result<Attachment, AppError> {
        let name = self.registry.generate_unique_name();
        if name.is_empty() {
            return Err(AppError::configuration(
                "A client router cannot mint unique names; use connect_named",
            ));
        }
        self.connect_named(name, user_id)
    }

    /// Attaches a local application under a name assigned elsewhere.
    pub fn connect_named(&self, name: String, user_id: UserId) -> Result<Attachment, AppError> {
        let (endpoint, inbox) = self.registry.create(
            name.clone(),
            EndpointKind::Local,
            user_id,
            TransportMask::LOCAL,
        );
        self.registry.register(endpoint.clone())?;
        Ok(Attachment {
            name,
            endpoint,
            inbox,
        })
    }

    /// Registers a remote peer reached through `transport`.
    ///
    /// Messages routed to it are marshaled and handed to the transport by a
    /// forwarder task. Returns the peer's unique name.
    pub fn connect_remote(
        &self,
        name: Option<String>,
        user_id: UserId,
        transport: Arc<dyn Transport>,
    ) -> Result<String, AppError> {
        let name = match name {
            Some(name) => name,
            None => self.registry.generate_unique_name(),
        };
        if name.is_empty() {
            return Err(AppError::configuration(
                "A client router cannot mint unique names for remote peers",
            ));
        }

        let (endpoint, queue) =
            self.registry
                .create(name.clone(), EndpointKind::Remote, user_id, transport.mask());
        self.registry.register(endpoint)?;
        spawn_forwarder(
            name.clone(),
            queue,
            transport,
            self.registry.clone(),
            self.shutdown_tx.subscribe(),
        );
        Ok(name)
    }

    /// Detaches an endpoint without leaving its sessions first.
    pub fn disconnect(&self, name: &str) -> Result<(), AppError> {
        self.registry
            .unregister(name)
            .map(|_| ())
            .ok_or_else(|| AppError::no_endpoint(format!("No endpoint named {name}")))
    }

    /// Transport hook: the link to `name` is gone.
    pub fn endpoint_lost(&self, name: &str) {
        if self.registry.unregister(name).is_none() {
            warn!(endpoint = %name, "Lost endpoint was not registered");
        }
    }

    /// Transport hook: a frame arrived from remote endpoint `from`.
    pub fn receive(&self, from: &str, msg: Message) -> Result<usize, AppError> {
        self.router.push_message(msg, from)
    }

    /// Routes a message from `sender`.
    pub fn push_message(&self, msg: Message, sender: &str) -> Result<usize, AppError> {
        self.router.push_message(msg, sender)
    }

    /// Reserves a session port for `binder`. The offered transports are
    /// reduced to those the binder may use.
    pub fn bind_session_port(
        &self,
        binder: &str,
        port: SessionPort,
        mut opts: SessionOpts,
        listener: Arc<dyn SessionPortListener>,
    ) -> Result<SessionPort, AppError> {
        let endpoint = self.registry.find(binder)?;
        opts.transports = self
            .permissions
            .filter_transports(&endpoint, opts.transports, "bind_session_port")?;
        self.sessions.bind_port(binder, port, opts, listener)
    }

    /// Releases a session port reservation.
    pub fn unbind_session_port(&self, binder: &str, port: SessionPort) -> Result<(), AppError> {
        self.registry.find(binder)?;
        self.sessions.unbind_port(binder, port)
    }

    /// Joins `joiner` to `host`'s session port.
    pub async fn join_session(
        &self,
        joiner: &str,
        host: &str,
        port: SessionPort,
        mut opts: SessionOpts,
        listener: Option<Arc<dyn SessionListener>>,
        timeout: Option<Duration>,
    ) -> Result<(SessionId, SessionOpts), AppError> {
        let endpoint = self.registry.find(joiner)?;
        self.registry.find(host)?;
        opts.transports = self
            .permissions
            .filter_transports(&endpoint, opts.transports, "join_session")?;

        let joined = self
            .sessions
            .join(joiner, host, port, opts, listener, timeout)
            .await?;

        if !endpoint.is_alive() {
            self.sessions
                .on_endpoint_disconnect(joiner, SessionLostReason::RemoteEndClosedAbruptly);
            return Err(AppError::no_endpoint(format!(
                "{joiner} disconnected while joining"
            )));
        }
        Ok(joined)
    }

    /// Leaves a session.
    pub fn leave_session(&self, name: &str, id: SessionId) -> Result<(), AppError> {
        self.registry.find(name)?;
        self.sessions.leave(id, name)
    }

    /// Sets `name`'s session listener, for every session or for one.
    pub fn set_session_listener(
        &self,
        name: &str,
        session: Option<SessionId>,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Result<(), AppError> {
        self.registry.find(name)?;
        self.sessions.set_session_listener(name, session, listener)
    }

    /// Binder-initiated removal of `target` from session `id`.
    pub fn remove_session_member(
        &self,
        actor: &str,
        id: SessionId,
        target: &str,
    ) -> Result<(), AppError> {
        self.registry.find(actor)?;
        self.sessions.remove_member(id, actor, target)
    }

    /// Treats `name`'s user as `alias_uid` for permission decisions.
    pub fn alias_unix_user(&self, name: &str, alias_uid: u32) -> Result<(), AppError> {
        let endpoint = self.registry.find(name)?;
        self.permissions
            .db()
            .add_alias_unix_user(endpoint.user_id, UserId(alias_uid))
    }

    /// Looks up a live session.
    pub fn get_session(&self, id: SessionId) -> Option<SessionSnapshot> {
        self.sessions.get(id)
    }

    /// Lifecycle state of a session id.
    pub fn session_state(&self, id: SessionId) -> SessionState {
        self.sessions.state_of(id)
    }

    /// Resolves once every notification committed so far was delivered.
    pub async fn flush(&self) {
        self.dispatcher.flush().await;
    }

    /// The permission database.
    pub fn permission_db(&self) -> &Arc<PermissionDb> {
        self.permissions.db()
    }

    /// Administrative snapshot.
    pub fn snapshot(&self) -> BusSnapshot {
        let counts = self.sessions.counts();
        BusSnapshot {
            guid: self.registry.guid().to_string(),
            role: self.role,
            endpoints: self.registry.len(),
            ports: counts.ports,
            sessions: counts.sessions,
            pending_joins: counts.pending_joins,
            metrics: self.metrics.snapshot(),
        }
    }

    /// Returns a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Detaches every endpoint, drains pending notifications and stops the
    /// background tasks.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        info!("Shutting down bus");

        self.registry.unregister_all(SessionLostReason::Other);
        self.sessions.clear();
        self.dispatcher.flush().await;

        let _ = self.shutdown_tx.send(());

        info!("Bus shut down");
        Ok(())
    }
}
