//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use meshbus_core::config::AppConfig;
use meshbus_core::events::SessionLostReason;
use meshbus_core::types::{SessionId, SessionOpts, SessionPort, TransportMask, UserId};
use meshbus_router::bus::Attachment;
use meshbus_router::{BusController, SessionListener, SessionPortListener};

/// How long a test waits for expected notifications.
const WAIT: Duration = Duration::from_secs(5);

/// A notification observed by a [`RecordingListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    /// session_lost
    Lost(SessionId, SessionLostReason),
    /// session_member_added
    Added(SessionId, String),
    /// session_member_removed
    Removed(SessionId, String),
}

/// Session listener that records every callback.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Recorded>>,
    changed: Notify,
}

impl RecordingListener {
    /// Creates an empty recorder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: Recorded) {
        self.events.lock().unwrap().push(event);
        self.changed.notify_waiters();
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    /// Everything recorded so far, clearing the log.
    pub fn take(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    /// Waits until at least `count` events are recorded.
    pub async fn wait_for(&self, count: usize) -> Vec<Recorded> {
        tokio::time::timeout(WAIT, async {
            loop {
                let changed = self.changed.notified();
                {
                    let events = self.events.lock().unwrap();
                    if events.len() >= count {
                        return events.clone();
                    }
                }
                changed.await;
            }
        })
        .await
        .expect("timed out waiting for session events")
    }
}

impl SessionListener for RecordingListener {
    fn session_lost(&self, session_id: SessionId, reason: SessionLostReason) {
        self.record(Recorded::Lost(session_id, reason));
    }

    fn session_member_added(&self, session_id: SessionId, unique_name: &str) {
        self.record(Recorded::Added(session_id, unique_name.to_string()));
    }

    fn session_member_removed(&self, session_id: SessionId, unique_name: &str) {
        self.record(Recorded::Removed(session_id, unique_name.to_string()));
    }
}

/// Port listener with a scripted accept decision.
#[derive(Debug)]
pub struct ScriptedPortListener {
    accept: bool,
    hold: bool,
    /// Signalled when an accept-callback starts.
    pub entered: Notify,
    /// Releases held accept-callbacks.
    pub release: Notify,
    joined: Mutex<Vec<(SessionPort, SessionId, String)>>,
}

impl ScriptedPortListener {
    /// Accepts every joiner immediately.
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::scripted(true, false))
    }

    /// Refuses every joiner.
    pub fn refusing() -> Arc<Self> {
        Arc::new(Self::scripted(false, false))
    }

    /// Accepts, but only once [`release`](Self::release) is notified.
    pub fn held() -> Arc<Self> {
        Arc::new(Self::scripted(true, true))
    }

    fn scripted(accept: bool, hold: bool) -> Self {
        Self {
            accept,
            hold,
            entered: Notify::new(),
            release: Notify::new(),
            joined: Mutex::new(Vec::new()),
        }
    }

    /// session_joined callbacks seen so far.
    pub fn joined(&self) -> Vec<(SessionPort, SessionId, String)> {
        self.joined.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionPortListener for ScriptedPortListener {
    async fn accept_session_joiner(&self, _port: SessionPort, _joiner: &str, _opts: &SessionOpts) -> bool {
        self.entered.notify_one();
        if self.hold {
            self.release.notified().await;
        }
        self.accept
    }

    fn session_joined(&self, port: SessionPort, session_id: SessionId, joiner: &str) {
        self.joined
            .lock()
            .unwrap()
            .push((port, session_id, joiner.to_string()));
    }
}

/// A bus instance with per-test state.
pub struct TestBus {
    /// The bus under test
    pub bus: BusController,
}

impl TestBus {
    /// A daemon bus with default settings and guid `test`.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// A bus built from defaults adjusted by `tweak`.
    pub fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::default();
        config.router.guid = Some("test".to_string());
        tweak(&mut config);
        Self {
            bus: BusController::new(config),
        }
    }

    /// Attaches a local endpoint for `uid`.
    pub fn attach(&self, uid: u32) -> Attachment {
        self.bus.connect_local(UserId(uid)).expect("attach")
    }

    /// Attaches a local endpoint with a recording global session listener.
    pub fn attach_recording(&self, uid: u32) -> (Attachment, Arc<RecordingListener>) {
        let attachment = self.attach(uid);
        let listener = RecordingListener::new();
        self.bus
            .set_session_listener(&attachment.name, None, Some(listener.clone()))
            .expect("set listener");
        (attachment, listener)
    }

    /// Binds a multipoint port accepting everyone.
    pub fn bind_multipoint(&self, binder: &str, port: u16) -> Arc<ScriptedPortListener> {
        let listener = ScriptedPortListener::accepting();
        self.bus
            .bind_session_port(binder, SessionPort(port), multipoint(), listener.clone())
            .expect("bind");
        listener
    }

    /// Joins `joiner` to `host`'s multipoint port.
    pub async fn join(&self, joiner: &str, host: &str, port: u16) -> SessionId {
        let (id, _) = self
            .bus
            .join_session(joiner, host, SessionPort(port), multipoint(), None, None)
            .await
            .expect("join");
        id
    }
}

/// Multipoint message options over any transport.
pub fn multipoint() -> SessionOpts {
    SessionOpts::new(true, TransportMask::ANY)
}
