//! The session table.
//!
//! One mutex guards every port reservation and session. Each membership
//! change builds its notification batch and enqueues it on the dispatcher
//! before the lock is released, so the dispatch queue sees mutations in
//! the same total order the table committed them. Listener code never runs
//! under this lock; the accept-callback of a join runs between two short
//! critical sections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use meshbus_core::config::session::SessionConfig;
use meshbus_core::error::AppError;
use meshbus_core::events::{SessionEvent, SessionLostReason};
use meshbus_core::types::{SessionId, SessionOpts, SessionPort};

use crate::dispatch::{
    Dispatcher, Notification, NotificationBatch, SessionListener, SessionPortListener,
};
use crate::metrics::{BusMetrics, sessions};

use super::port::BoundPort;
use super::session::{Session, SessionSnapshot, SessionState};

/// How a member came to leave a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The member called leave.
    Left,
    /// The member's endpoint went away.
    Disconnected(SessionLostReason),
    /// The binder removed the member.
    RemovedByBinder,
}

impl Departure {
    /// Reason reported to the members that remain.
    fn peer_reason(self) -> SessionLostReason {
        match self {
            Departure::Left | Departure::RemovedByBinder => SessionLostReason::RemoteEndLeftSession,
            Departure::Disconnected(reason) => reason,
        }
    }
}

/// Table sizes for administration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    /// Bound ports
    pub ports: usize,
    /// Live sessions
    pub sessions: usize,
    /// Joins waiting on an accept-callback
    pub pending_joins: usize,
}

#[derive(Debug)]
struct PendingJoin {
    joiner: String,
    aborted: bool,
}

struct Admission {
    id: SessionId,
    negotiated: SessionOpts,
    created: bool,
    batch: NotificationBatch,
}

#[derive(Debug, Default)]
struct TableState {
    /// (binder, port) → reservation.
    ports: HashMap<(String, SessionPort), BoundPort>,
    /// Live sessions.
    sessions: HashMap<SessionId, Session>,
    /// Last issued session id.
    last_id: u32,
    /// Whether id allocation has wrapped around.
    wrapped: bool,
    /// In-flight joins by ticket.
    pending: HashMap<u64, PendingJoin>,
    next_ticket: u64,
}

impl TableState {
    fn allocate_id(&mut self) -> SessionId {
        loop {
            let (next, overflow) = self.last_id.overflowing_add(1);
            self.last_id = next;
            self.wrapped |= overflow;
            let id = SessionId(next);
            if next != 0 && !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    fn admit(
        &mut self,
        host: &str,
        port: SessionPort,
        joiner: &str,
        opts: &SessionOpts,
        listener: Option<Arc<dyn SessionListener>>,
        max_members: usize,
    ) -> Result<Admission, AppError> {
        let key = (host.to_string(), port);
        let bound = self.ports.get(&key).ok_or_else(|| {
            AppError::no_session(format!("Port {port} of {host} was unbound during join"))
        })?;
        let port_listener = bound.listener.clone();
        let host_opts = bound.opts;
        let negotiated = host_opts.negotiate(opts);
        let existing = bound
            .active_session
            .filter(|id| host_opts.is_multipoint && self.sessions.contains_key(id));

        let (id, created) = match existing {
            Some(id) => {
                let session = self
                    .sessions
                    .get_mut(&id)
                    .ok_or_else(|| AppError::internal(format!("Session {id} vanished")))?;
                if session.is_member(joiner) {
                    return Err(AppError::already_joined(format!(
                        "{joiner} is already a member of session {id}"
                    )));
                }
                if max_members > 0 && session.members().len() >= max_members {
                    return Err(AppError::denied(format!(
                        "Session {id} is full ({max_members} members)"
                    )));
                }
                session.add(joiner);
                (id, false)
            }
            None => {
                let id = self.allocate_id();
                let mut session = Session::new(id, port, host.to_string(), negotiated);
                session.add(joiner);
                self.sessions.insert(id, session);
                if host_opts.is_multipoint {
                    if let Some(bound) = self.ports.get_mut(&key) {
                        bound.active_session = Some(id);
                    }
                }
                (id, true)
            }
        };

        let session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::internal(format!("Session {id} vanished")))?;
        let peers: Vec<String> = session
            .members()
            .iter()
            .filter(|m| m.as_str() != joiner)
            .cloned()
            .collect();

        let mut batch = NotificationBatch::new(id, session.next_sequence());
        if let Some(listener) = listener {
            batch.push(Notification::InstallListener {
                target: joiner.to_string(),
                listener,
            });
        }
        batch.push(Notification::PortJoined {
            listener: port_listener,
            port,
            joiner: joiner.to_string(),
        });
        for peer in &peers {
            batch.event(
                peer,
                SessionEvent::MemberAdded {
                    unique_name: joiner.to_string(),
                },
            );
        }
        for peer in &peers {
            batch.event(
                joiner,
                SessionEvent::MemberAdded {
                    unique_name: peer.clone(),
                },
            );
        }

        Ok(Admission {
            id,
            negotiated,
            created,
            batch,
        })
    }

    /// Removes `name` from a session and builds the resulting batch.
    fn depart(
        &mut self,
        id: SessionId,
        name: &str,
        departure: Departure,
        metrics: &BusMetrics,
    ) -> Option<NotificationBatch> {
        let session = self.sessions.get_mut(&id)?;
        if !session.remove(name) {
            return None;
        }

        let mut batch = NotificationBatch::new(id, session.next_sequence());
        if departure == Departure::RemovedByBinder {
            batch.event(
                name,
                SessionEvent::Lost {
                    reason: SessionLostReason::RemovedByBinder,
                },
            );
        }
        batch.push(Notification::ForgetSession {
            target: name.to_string(),
        });

        let reason = departure.peer_reason();
        for member in session.members() {
            batch.event(
                member,
                SessionEvent::MemberRemoved {
                    unique_name: name.to_string(),
                },
            );
        }
        // A point-to-point session cannot outlive its pair.
        let ended_for = match session.members() {
            [survivor] if !session.opts.is_multipoint => Some(survivor.clone()),
            _ => None,
        };
        if let Some(survivor) = &ended_for {
            batch.event(survivor, SessionEvent::Lost { reason });
            batch.push(Notification::ForgetSession {
                target: survivor.clone(),
            });
            session.remove(survivor);
        }
        debug!(
            session_id = %id,
            endpoint = %name,
            remaining = session.members().len(),
            ?departure,
            "Member departed"
        );

        if session.is_empty() {
            let binder = session.binder.clone();
            let port = session.port;
            self.sessions.remove(&id);

            // A binder outside the session only hears about it on a
            // listener registered for this session id.
            if binder != name && ended_for.as_deref() != Some(binder.as_str()) {
                batch.push(Notification::ScopedSession {
                    target: binder.clone(),
                    event: SessionEvent::Lost { reason },
                });
                batch.push(Notification::ForgetSession {
                    target: binder.clone(),
                });
            }
            if let Some(bound) = self.ports.get_mut(&(binder, port)) {
                if bound.active_session == Some(id) {
                    bound.active_session = None;
                }
            }
            batch.closes_session = true;
            sessions::record_torn_down(metrics);
            info!(session_id = %id, "Session torn down");
        }

        Some(batch)
    }
}

/// Port reservations and live sessions.
pub struct SessionTable {
    state: Mutex<TableState>,
    dispatcher: Dispatcher,
    metrics: Arc<BusMetrics>,
    config: SessionConfig,
}

impl std::fmt::Debug for SessionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTable")
            .field("counts", &self.counts())
            .finish()
    }
}

/// Drops a pending join's ticket however the join ends.
struct PendingGuard<'a> {
    table: &'a SessionTable,
    ticket: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.table.state.lock() {
            state.pending.remove(&self.ticket);
        }
    }
}

impl SessionTable {
    /// Creates an empty table delivering through `dispatcher`.
    pub fn new(dispatcher: Dispatcher, metrics: Arc<BusMetrics>, config: SessionConfig) -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            dispatcher,
            metrics,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("session table lock poisoned by an earlier invariant violation"),
        }
    }

    /// Reserves `port` for `binder`. [`SessionPort::ANY`] picks the lowest
    /// free port.
    pub fn bind_port(
        &self,
        binder: &str,
        port: SessionPort,
        opts: SessionOpts,
        listener: Arc<dyn SessionPortListener>,
    ) -> Result<SessionPort, AppError> {
        let mut state = self.lock();
        let port = if port.is_any() {
            (1..=u16::MAX)
                .map(SessionPort)
                .find(|p| !state.ports.contains_key(&(binder.to_string(), *p)))
                .ok_or_else(|| AppError::port_in_use(format!("No free session port for {binder}")))?
        } else {
            if state.ports.contains_key(&(binder.to_string(), port)) {
                return Err(AppError::port_in_use(format!(
                    "Port {port} is already bound by {binder}"
                )));
            }
            port
        };

        state.ports.insert(
            (binder.to_string(), port),
            BoundPort::new(binder.to_string(), port, opts, listener),
        );
        info!(endpoint = %binder, port = %port, multipoint = opts.is_multipoint, "Session port bound");
        Ok(port)
    }

    /// Releases a reservation. Sessions joined through it survive.
    pub fn unbind_port(&self, binder: &str, port: SessionPort) -> Result<(), AppError> {
        let mut state = self.lock();
        state
            .ports
            .remove(&(binder.to_string(), port))
            .ok_or_else(|| AppError::no_session(format!("Port {port} is not bound by {binder}")))?;
        info!(endpoint = %binder, port = %port, "Session port unbound");
        Ok(())
    }

    /// Joins `joiner` to the session behind `host`'s `port`.
    ///
    /// Runs the binder's accept-callback with a deadline of `timeout` (or the
    /// configured default). Returns once every member-added notification the
    /// join produced has been delivered. Abandoned if the joiner disconnects
    /// while the callback is pending.
    pub async fn join(
        &self,
        joiner: &str,
        host: &str,
        port: SessionPort,
        opts: SessionOpts,
        listener: Option<Arc<dyn SessionListener>>,
        timeout: Option<Duration>,
    ) -> Result<(SessionId, SessionOpts), AppError> {
        if joiner == host {
            return Err(AppError::invalid_argument(format!(
                "{joiner} cannot join its own port {port}"
            )));
        }

        let (ticket, port_listener) = {
            let mut state = self.lock();
            let bound = state.ports.get(&(host.to_string(), port)).ok_or_else(|| {
                AppError::no_session(format!("Port {port} is not bound by {host}"))
            })?;
            if !bound.opts.is_compatible(&opts) {
                return Err(AppError::bad_session_opts(format!(
                    "Options of {joiner} are incompatible with {host}:{port}"
                )));
            }
            if let Some(id) = bound.active_session {
                if state.sessions.get(&id).is_some_and(|s| s.is_member(joiner)) {
                    return Err(AppError::already_joined(format!(
                        "{joiner} is already a member of session {id}"
                    )));
                }
            }
            let port_listener = bound.listener.clone();

            state.next_ticket += 1;
            let ticket = state.next_ticket;
            state.pending.insert(
                ticket,
                PendingJoin {
                    joiner: joiner.to_string(),
                    aborted: false,
                },
            );
            (ticket, port_listener)
        };
        let _pending = PendingGuard {
            table: self,
            ticket,
        };

        let deadline = timeout.unwrap_or_else(|| self.config.join_timeout());
        debug!(joiner = %joiner, host = %host, port = %port, "Awaiting accept-callback");
        let accepted = tokio::time::timeout(
            deadline,
            port_listener.accept_session_joiner(port, joiner, &opts),
        )
        .await
        .map_err(|_| {
            AppError::timeout(format!(
                "Accept for {joiner} on {host}:{port} timed out after {deadline:?}"
            ))
        })?;
        if !accepted {
            return Err(AppError::denied(format!(
                "{host} refused {joiner} on port {port}"
            )));
        }

        let (id, negotiated) = {
            let mut state = self.lock();
            if state.pending.get(&ticket).is_none_or(|p| p.aborted) {
                return Err(AppError::no_endpoint(format!(
                    "{joiner} disconnected while joining {host}:{port}"
                )));
            }
            let admission = state.admit(
                host,
                port,
                joiner,
                &opts,
                listener,
                self.config.max_members,
            )?;
            if admission.created {
                sessions::record_created(&self.metrics);
                info!(session_id = %admission.id, endpoint = %host, port = %port, "Session created");
            }
            debug!(session_id = %admission.id, endpoint = %joiner, "Member joined");
            self.dispatcher.enqueue(admission.batch);
            (admission.id, admission.negotiated)
        };

        self.dispatcher.flush().await;
        Ok((id, negotiated))
    }

    /// Removes `name` from session `id`.
    pub fn leave(&self, id: SessionId, name: &str) -> Result<(), AppError> {
        let mut state = self.lock();
        let session = state
            .sessions
            .get(&id)
            .ok_or_else(|| AppError::no_session(format!("Session {id} does not exist")))?;
        if !session.is_member(name) {
            return Err(AppError::not_session_member(format!(
                "{name} is not a member of session {id}"
            )));
        }
        if let Some(batch) = state.depart(id, name, Departure::Left, &self.metrics) {
            self.dispatcher.enqueue(batch);
        }
        Ok(())
    }

    /// Binder-initiated removal of `target` from a multipoint session.
    pub fn remove_member(&self, id: SessionId, actor: &str, target: &str) -> Result<(), AppError> {
        let mut state = self.lock();
        let session = state
            .sessions
            .get(&id)
            .ok_or_else(|| AppError::no_session(format!("Session {id} does not exist")))?;
        if session.binder != actor {
            return Err(AppError::denied(format!(
                "{actor} is not the binder of session {id}"
            )));
        }
        if !session.opts.is_multipoint {
            return Err(AppError::denied(format!(
                "Session {id} is not multipoint"
            )));
        }
        if target == session.binder {
            return Err(AppError::invalid_argument(
                "The binder cannot remove itself; leave instead",
            ));
        }
        if !session.is_member(target) {
            return Err(AppError::not_session_member(format!(
                "{target} is not a member of session {id}"
            )));
        }
        if let Some(batch) = state.depart(id, target, Departure::RemovedByBinder, &self.metrics) {
            self.dispatcher.enqueue(batch);
        }
        Ok(())
    }

    /// Cleans up everything `name` held: pending joins, port reservations,
    /// session memberships and listener registrations.
    pub fn on_endpoint_disconnect(&self, name: &str, reason: SessionLostReason) {
        let mut state = self.lock();

        for pending in state.pending.values_mut() {
            if pending.joiner == name {
                pending.aborted = true;
            }
        }

        let before = state.ports.len();
        state.ports.retain(|(binder, _), _| binder != name);
        let released = before - state.ports.len();

        let mut ids: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|s| s.is_member(name))
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        for id in &ids {
            if let Some(batch) =
                state.depart(*id, name, Departure::Disconnected(reason), &self.metrics)
            {
                self.dispatcher.enqueue(batch);
            }
        }
        self.dispatcher.forget_endpoint(name);

        if released > 0 || !ids.is_empty() {
            debug!(
                endpoint = %name,
                ports = released,
                sessions = ids.len(),
                %reason,
                "Endpoint cleaned from session table"
            );
        }
    }

    /// Sets `endpoint`'s listener, globally or for one session.
    ///
    /// A per-session listener needs the endpoint to be a member or the binder.
    pub fn set_session_listener(
        &self,
        endpoint: &str,
        session: Option<SessionId>,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Result<(), AppError> {
        let state = self.lock();
        if let Some(id) = session {
            let s = state
                .sessions
                .get(&id)
                .ok_or_else(|| AppError::no_session(format!("Session {id} does not exist")))?;
            if !s.is_member(endpoint) && s.binder != endpoint {
                return Err(AppError::not_session_member(format!(
                    "{endpoint} is not part of session {id}"
                )));
            }
        }
        self.dispatcher.set_listener(endpoint, session, listener);
        Ok(())
    }

    /// Fails unless `name` is a member of session `id`.
    pub fn check_member(&self, id: SessionId, name: &str) -> Result<(), AppError> {
        let state = self.lock();
        match state.sessions.get(&id) {
            None => Err(AppError::no_session(format!("Session {id} does not exist"))),
            Some(s) if !s.is_member(name) => Err(AppError::not_session_member(format!(
                "{name} is not a member of session {id}"
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Members of session `id` in join order.
    pub fn members(&self, id: SessionId) -> Result<Vec<String>, AppError> {
        let state = self.lock();
        state
            .sessions
            .get(&id)
            .map(|s| s.members().to_vec())
            .ok_or_else(|| AppError::no_session(format!("Session {id} does not exist")))
    }

    /// Looks up a live session.
    pub fn get(&self, id: SessionId) -> Option<SessionSnapshot> {
        self.lock().sessions.get(&id).map(Session::snapshot)
    }

    /// Sessions `name` belongs to.
    pub fn sessions_of(&self, name: &str) -> Vec<SessionId> {
        let state = self.lock();
        let mut ids: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|s| s.is_member(name))
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Lifecycle state of a session id.
    pub fn state_of(&self, id: SessionId) -> SessionState {
        let state = self.lock();
        if state.sessions.contains_key(&id) {
            SessionState::Active
        } else if id.get() != 0 && (state.wrapped || id.get() <= state.last_id) {
            SessionState::TornDown
        } else {
            SessionState::Unbound
        }
    }

    /// Lifecycle state of `binder`'s `port`.
    pub fn port_state(&self, binder: &str, port: SessionPort) -> SessionState {
        let state = self.lock();
        match state.ports.get(&(binder.to_string(), port)) {
            None => SessionState::Unbound,
            Some(bound) => match bound.active_session {
                Some(id) if state.sessions.contains_key(&id) => SessionState::Active,
                _ => SessionState::Bound,
            },
        }
    }

    /// Current table sizes.
    pub fn counts(&self) -> TableCounts {
        let state = self.lock();
        TableCounts {
            ports: state.ports.len(),
            sessions: state.sessions.len(),
            pending_joins: state.pending.len(),
        }
    }

    /// Drops every session and reservation, e.g. on shutdown.
    pub fn clear(&self) {
        let mut state = self.lock();
        let sessions = state.sessions.len();
        state.sessions.clear();
        state.ports.clear();
        for pending in state.pending.values_mut() {
            pending.aborted = true;
        }
        if sessions > 0 {
            warn!(sessions, "Session table cleared with live sessions");
        }
    }
}
