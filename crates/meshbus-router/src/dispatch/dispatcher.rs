//! Notification dispatcher. Delivers session events to listeners on a
//! dedicated task.
//!
//! The session table commits events into this dispatcher while it still
//! holds its lock, so the single queue reflects the table's commit order.
//! Listener callbacks run only on the dispatch task, outside that lock.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use meshbus_core::events::SessionEvent;
use meshbus_core::types::{SessionId, SessionPort};

use crate::metrics::{BusMetrics, sessions};

use super::dedup::EventDeduplicator;
use super::listener::{SessionListener, SessionPortListener};
use super::registry::ListenerRegistry;

/// One delivery step inside a committed batch.
pub enum Notification {
    /// Deliver `event` to `target`'s listener for the batch's session.
    Session {
        /// Receiving endpoint.
        target: String,
        /// The event.
        event: SessionEvent,
    },
    /// Deliver `event` only if `target` registered a listener for this
    /// session id. The endpoint's global listener is never consulted.
    ScopedSession {
        /// Receiving endpoint.
        target: String,
        /// The event.
        event: SessionEvent,
    },
    /// Tell a binder's port listener that a joiner was admitted.
    PortJoined {
        /// The binder's port listener.
        listener: Arc<dyn SessionPortListener>,
        /// The joined port.
        port: SessionPort,
        /// The admitted joiner.
        joiner: String,
    },
    /// Install `target`'s per-session listener.
    InstallListener {
        /// Owning endpoint.
        target: String,
        /// The listener.
        listener: Arc<dyn SessionListener>,
    },
    /// Drop `target`'s per-session listener once prior deliveries are done.
    ForgetSession {
        /// Owning endpoint.
        target: String,
    },
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session { target, event } => f
                .debug_struct("Session")
                .field("target", target)
                .field("event", event)
                .finish(),
            Self::ScopedSession { target, event } => f
                .debug_struct("ScopedSession")
                .field("target", target)
                .field("event", event)
                .finish(),
            Self::PortJoined { port, joiner, .. } => f
                .debug_struct("PortJoined")
                .field("port", port)
                .field("joiner", joiner)
                .finish(),
            Self::InstallListener { target, .. } => f
                .debug_struct("InstallListener")
                .field("target", target)
                .finish(),
            Self::ForgetSession { target } => f
                .debug_struct("ForgetSession")
                .field("target", target)
                .finish(),
        }
    }
}

/// All notifications produced by one committed session-table mutation.
#[derive(Debug)]
pub struct NotificationBatch {
    /// Session the mutation applied to.
    pub session_id: SessionId,
    /// Position of the mutation in the session's event sequence.
    pub sequence: u64,
    /// Deliveries in order.
    pub notifications: Vec<Notification>,
    /// Whether the mutation tore the session down.
    pub closes_session: bool,
}

impl NotificationBatch {
    /// Create an empty batch.
    pub fn new(session_id: SessionId, sequence: u64) -> Self {
        Self {
            session_id,
            sequence,
            notifications: Vec::new(),
            closes_session: false,
        }
    }

    /// Queue `event` for `target`.
    pub fn event(&mut self, target: &str, event: SessionEvent) {
        self.notifications.push(Notification::Session {
            target: target.to_string(),
            event,
        });
    }

    /// Queue a step.
    pub fn push(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

enum DispatchCommand {
    Deliver(NotificationBatch),
    SetListener {
        endpoint: String,
        session: Option<SessionId>,
        listener: Option<Arc<dyn SessionListener>>,
    },
    ForgetEndpoint(String),
    Flush(oneshot::Sender<()>),
}

/// Handle to the dispatch task.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<DispatchCommand>,
}

impl Dispatcher {
    /// Spawns the dispatch task on the current runtime.
    pub fn spawn(metrics: Arc<BusMetrics>, shutdown: broadcast::Receiver<()>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatch(rx, metrics, shutdown));
        Self { tx }
    }

    /// Queues a committed batch. Never blocks.
    pub fn enqueue(&self, batch: NotificationBatch) {
        if batch.notifications.is_empty() && !batch.closes_session {
            return;
        }
        self.send(DispatchCommand::Deliver(batch));
    }

    /// Queues a listener registration change.
    pub fn set_listener(
        &self,
        endpoint: &str,
        session: Option<SessionId>,
        listener: Option<Arc<dyn SessionListener>>,
    ) {
        self.send(DispatchCommand::SetListener {
            endpoint: endpoint.to_string(),
            session,
            listener,
        });
    }

    /// Queues removal of every registration held by `endpoint`.
    pub fn forget_endpoint(&self, endpoint: &str) {
        self.send(DispatchCommand::ForgetEndpoint(endpoint.to_string()));
    }

    /// Resolves once everything queued before this call has been delivered.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(DispatchCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, cmd: DispatchCommand) {
        if self.tx.send(cmd).is_err() {
            warn!("Dispatch task stopped, dropping notification");
        }
    }
}

struct DispatchState {
    listeners: ListenerRegistry,
    last_sequence: HashMap<SessionId, u64>,
    metrics: Arc<BusMetrics>,
}

async fn run_dispatch(
    mut rx: mpsc::UnboundedReceiver<DispatchCommand>,
    metrics: Arc<BusMetrics>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut state = DispatchState {
        listeners: ListenerRegistry::new(),
        last_sequence: HashMap::new(),
        metrics,
    };

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            cmd = rx.recv() => match cmd {
                Some(cmd) => state.handle(cmd),
                None => break,
            },
        }
    }

    debug!("Dispatch loop ended");
}

impl DispatchState {
    fn handle(&mut self, cmd: DispatchCommand) {
        match cmd {
            DispatchCommand::Deliver(batch) => self.deliver(batch),
            DispatchCommand::SetListener {
                endpoint,
                session,
                listener,
            } => self.listeners.set(&endpoint, session, listener),
            DispatchCommand::ForgetEndpoint(endpoint) => self.listeners.forget_endpoint(&endpoint),
            DispatchCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    fn deliver(&mut self, batch: NotificationBatch) {
        let session_id = batch.session_id;
        let last = self.last_sequence.entry(session_id).or_insert(0);
        assert!(
            batch.sequence > *last,
            "session {session_id} events out of order: {} after {}",
            batch.sequence,
            *last
        );
        *last = batch.sequence;

        let mut dedup = EventDeduplicator::new();
        let sequence = batch.sequence;
        for notification in batch.notifications {
            match notification {
                Notification::Session { target, event } => {
                    let listener = self.listeners.resolve(&target, session_id);
                    self.dispatch(listener, &mut dedup, &target, (session_id, sequence), &event);
                }
                Notification::ScopedSession { target, event } => {
                    let listener = self.listeners.resolve_scoped(&target, session_id);
                    self.dispatch(listener, &mut dedup, &target, (session_id, sequence), &event);
                }
                Notification::PortJoined {
                    listener,
                    port,
                    joiner,
                } => {
                    guarded(|| listener.session_joined(port, session_id, &joiner));
                    sessions::record_delivered(&self.metrics);
                }
                Notification::InstallListener { target, listener } => {
                    self.listeners.set(&target, Some(session_id), Some(listener));
                }
                Notification::ForgetSession { target } => {
                    self.listeners.forget_session(&target, session_id);
                }
            }
        }

        if batch.closes_session {
            self.last_sequence.remove(&session_id);
        }
    }

    fn dispatch(
        &self,
        listener: Option<Arc<dyn SessionListener>>,
        dedup: &mut EventDeduplicator,
        target: &str,
        (session_id, sequence): (SessionId, u64),
        event: &SessionEvent,
    ) {
        let Some(listener) = listener else {
            trace!(endpoint = %target, session_id = %session_id, event = event.name(), "No listener registered");
            return;
        };
        if !dedup.should_dispatch(&listener, event) {
            sessions::record_deduped(&self.metrics);
            return;
        }
        trace!(
            endpoint = %target,
            session_id = %session_id,
            sequence,
            event = event.name(),
            "Delivering session event"
        );
        guarded(|| invoke(listener.as_ref(), session_id, event));
        sessions::record_delivered(&self.metrics);
    }
}

fn invoke(listener: &dyn SessionListener, session_id: SessionId, event: &SessionEvent) {
    match event {
        SessionEvent::Lost { reason } => listener.session_lost(session_id, *reason),
        SessionEvent::MemberAdded { unique_name } => {
            listener.session_member_added(session_id, unique_name)
        }
        SessionEvent::MemberRemoved { unique_name } => {
            listener.session_member_removed(session_id, unique_name)
        }
    }
}

fn guarded(f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!("Listener callback panicked");
    }
}
