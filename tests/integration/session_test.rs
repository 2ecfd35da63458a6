//! Integration tests for session lifecycle and listener notifications.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use helpers::{Recorded, RecordingListener, ScriptedPortListener, TestBus, multipoint};

use meshbus_core::ErrorKind;
use meshbus_core::events::SessionLostReason;
use meshbus_core::types::{SessionId, SessionOpts, SessionPort, TransportMask, UserId};
use meshbus_router::endpoint::heartbeat;
use meshbus_router::{MemoryTransport, SessionState};

#[tokio::test]
async fn test_port_42_multipoint_lifecycle() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let (b, _b_events) = t.attach_recording(1000);
    let port_listener = t.bind_multipoint(&a.name, 42);

    let id = t.join(&b.name, &a.name, 42).await;
    assert_eq!(a_events.take(), vec![Recorded::Added(id, b.name.clone())]);
    assert_eq!(
        port_listener.joined(),
        vec![(SessionPort(42), id, b.name.clone())]
    );

    t.bus.leave_session(&b.name, id).expect("b leaves");
    let events = a_events.wait_for(1).await;
    assert_eq!(events, vec![Recorded::Removed(id, b.name.clone())]);
    assert_eq!(t.bus.session_state(id), SessionState::Active);
    assert_eq!(
        t.bus.get_session(id).expect("still resolvable").members,
        vec![a.name.clone()]
    );

    let (c, _c_events) = t.attach_recording(1000);
    assert_eq!(t.join(&c.name, &a.name, 42).await, id);
    t.bus.flush().await;
    assert_eq!(
        a_events.events(),
        vec![
            Recorded::Removed(id, b.name.clone()),
            Recorded::Added(id, c.name.clone()),
        ]
    );

    t.bus.leave_session(&c.name, id).expect("c leaves");
    t.bus.leave_session(&a.name, id).expect("a leaves");
    assert_eq!(t.bus.session_state(id), SessionState::TornDown);
    assert!(t.bus.get_session(id).is_none());
    assert_eq!(
        t.bus.sessions.port_state(&a.name, SessionPort(42)),
        SessionState::Bound
    );
}

#[tokio::test]
async fn test_join_then_leave_is_observed_once_by_every_member() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let (b, b_events) = t.attach_recording(1000);
    let (c, c_events) = t.attach_recording(1000);
    let d = t.attach(1000);
    t.bind_multipoint(&a.name, 7);

    let id = t.join(&b.name, &a.name, 7).await;
    t.join(&c.name, &a.name, 7).await;
    let before = t.bus.get_session(id).expect("session").members.len();
    a_events.take();
    b_events.take();
    c_events.take();

    t.join(&d.name, &a.name, 7).await;
    t.bus.leave_session(&d.name, id).expect("d leaves");
    t.bus.flush().await;

    let expected = vec![
        Recorded::Added(id, d.name.clone()),
        Recorded::Removed(id, d.name.clone()),
    ];
    assert_eq!(a_events.take(), expected);
    assert_eq!(b_events.take(), expected);
    assert_eq!(c_events.take(), expected);
    assert_eq!(t.bus.get_session(id).expect("session").members.len(), before);
}

#[tokio::test]
async fn test_member_added_delivered_before_join_returns() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let b = t.attach(1000);
    t.bind_multipoint(&a.name, 5);

    let id = t.join(&b.name, &a.name, 5).await;
    // No flush: join itself waits for delivery.
    assert_eq!(a_events.events(), vec![Recorded::Added(id, b.name.clone())]);

    t.bus.leave_session(&b.name, id).expect("leave");
    let events = a_events.wait_for(2).await;
    assert_eq!(events[1], Recorded::Removed(id, b.name.clone()));
}

#[tokio::test]
async fn test_abrupt_disconnect_reason() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let (b, b_events) = t.attach_recording(1000);
    let c = t.attach(1000);
    t.bind_multipoint(&a.name, 9);
    let id = t.join(&b.name, &a.name, 9).await;
    t.join(&c.name, &a.name, 9).await;
    a_events.take();
    b_events.take();

    t.bus.disconnect(&c.name).expect("c drops");
    // Cleanup is synchronous with unregistration.
    assert_eq!(
        t.bus.sessions.check_member(id, &c.name).expect_err("gone").kind,
        ErrorKind::NotSessionMember
    );
    t.bus.flush().await;
    assert_eq!(a_events.take(), vec![Recorded::Removed(id, c.name.clone())]);
    assert_eq!(b_events.take(), vec![Recorded::Removed(id, c.name.clone())]);

    t.bus.disconnect(&b.name).expect("b drops");
    t.bus.flush().await;
    assert_eq!(a_events.take(), vec![Recorded::Removed(id, b.name.clone())]);
    assert_eq!(t.bus.session_state(id), SessionState::Active);
}

#[tokio::test]
async fn test_no_event_follows_session_lost() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let b = t.attach(1000);
    let c = t.attach(1000);
    t.bind_multipoint(&a.name, 42);

    let id = t.join(&b.name, &a.name, 42).await;
    t.bus.leave_session(&b.name, id).expect("b leaves");
    t.join(&c.name, &a.name, 42).await;
    t.bus.leave_session(&c.name, id).expect("c leaves");
    t.bus.leave_session(&a.name, id).expect("a leaves");
    t.bus.flush().await;

    let events = a_events.events();
    if let Some(lost) = events.iter().position(|e| matches!(e, Recorded::Lost(..))) {
        assert_eq!(lost, events.len() - 1, "events after session lost: {events:?}");
    }
    assert_eq!(
        events,
        vec![
            Recorded::Added(id, b.name.clone()),
            Recorded::Removed(id, b.name.clone()),
            Recorded::Added(id, c.name.clone()),
            Recorded::Removed(id, c.name.clone()),
        ]
    );
}

#[tokio::test]
async fn test_point_to_point_peer_disconnect_ends_session() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let b = t.attach(1000);
    let opts = SessionOpts::new(false, TransportMask::ANY);
    t.bus
        .bind_session_port(&a.name, SessionPort(8), opts, ScriptedPortListener::accepting())
        .expect("bind");
    let (id, _) = t
        .bus
        .join_session(&b.name, &a.name, SessionPort(8), opts, None, None)
        .await
        .expect("join");
    a_events.take();

    t.bus.disconnect(&b.name).expect("b drops");
    t.bus.flush().await;
    let events = a_events.take();
    assert_eq!(
        events,
        vec![
            Recorded::Removed(id, b.name.clone()),
            Recorded::Lost(id, SessionLostReason::RemoteEndClosedAbruptly),
        ]
    );
    assert!(!events.contains(&Recorded::Lost(id, SessionLostReason::RemoteEndLeftSession)));
    assert_eq!(t.bus.session_state(id), SessionState::TornDown);
    assert_eq!(
        t.bus.leave_session(&a.name, id).expect_err("already over").kind,
        ErrorKind::NoSession
    );
    assert_eq!(
        t.bus.sessions.port_state(&a.name, SessionPort(8)),
        SessionState::Bound
    );
}

#[tokio::test]
async fn test_link_timeout_reason_reaches_peer() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let transport = Arc::new(MemoryTransport::new(TransportMask::TCP, 16));
    let peer = t
        .bus
        .connect_remote(None, UserId(3000), transport)
        .expect("remote");
    let opts = SessionOpts::new(false, TransportMask::ANY);
    t.bus
        .bind_session_port(&a.name, SessionPort(12), opts, ScriptedPortListener::accepting())
        .expect("bind");
    let (id, _) = t
        .bus
        .join_session(&peer, &a.name, SessionPort(12), opts, None, None)
        .await
        .expect("remote joins");
    assert_eq!(a_events.take(), vec![Recorded::Added(id, peer.clone())]);

    let later = Utc::now() + chrono::Duration::seconds(60);
    let expired = heartbeat::sweep(&t.bus.registry, Duration::from_secs(30), later);
    assert_eq!(expired, vec![peer.clone()]);
    t.bus.flush().await;

    assert_eq!(
        a_events.take(),
        vec![
            Recorded::Removed(id, peer.clone()),
            Recorded::Lost(id, SessionLostReason::LinkTimeout),
        ]
    );
    assert_eq!(t.bus.session_state(id), SessionState::TornDown);
    assert!(!t.bus.registry.contains(&peer));
}

#[tokio::test]
async fn test_join_beyond_member_limit_denied() {
    let t = TestBus::with_config(|c| c.session.max_members = 2);
    let (a, a_events) = t.attach_recording(1000);
    let b = t.attach(1000);
    let c = t.attach(1000);
    t.bind_multipoint(&a.name, 15);
    let id = t.join(&b.name, &a.name, 15).await;

    let err = t
        .bus
        .join_session(&c.name, &a.name, SessionPort(15), multipoint(), None, None)
        .await
        .expect_err("session full");
    assert_eq!(err.kind, ErrorKind::Denied);
    t.bus.flush().await;

    assert_eq!(
        t.bus.get_session(id).expect("session").members,
        vec![a.name.clone(), b.name.clone()]
    );
    assert_eq!(a_events.events(), vec![Recorded::Added(id, b.name.clone())]);
    assert_eq!(t.bus.snapshot().pending_joins, 0);
}

#[tokio::test]
async fn test_remove_by_binder() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let (b, b_events) = t.attach_recording(1000);
    let (c, c_events) = t.attach_recording(1000);
    t.bind_multipoint(&a.name, 11);
    let id = t.join(&b.name, &a.name, 11).await;
    t.join(&c.name, &a.name, 11).await;
    a_events.take();
    b_events.take();
    c_events.take();

    let err = t
        .bus
        .remove_session_member(&c.name, id, &b.name)
        .expect_err("only the binder may remove");
    assert_eq!(err.kind, ErrorKind::Denied);

    t.bus
        .remove_session_member(&a.name, id, &b.name)
        .expect("binder removes b");
    t.bus.flush().await;

    assert_eq!(
        b_events.take(),
        vec![Recorded::Lost(id, SessionLostReason::RemovedByBinder)]
    );
    assert_eq!(c_events.take(), vec![Recorded::Removed(id, b.name.clone())]);
    assert_eq!(a_events.take(), vec![Recorded::Removed(id, b.name.clone())]);
    assert_eq!(
        t.bus.get_session(id).expect("session").members,
        vec![a.name.clone(), c.name.clone()]
    );
}

#[tokio::test]
async fn test_remove_on_point_to_point_session_denied() {
    let t = TestBus::new();
    let a = t.attach(1000);
    let b = t.attach(1000);
    let opts = SessionOpts::new(false, TransportMask::ANY);
    t.bus
        .bind_session_port(&a.name, SessionPort(2), opts, ScriptedPortListener::accepting())
        .expect("bind");
    let (id, negotiated) = t
        .bus
        .join_session(&b.name, &a.name, SessionPort(2), opts, None, None)
        .await
        .expect("join");
    assert!(!negotiated.is_multipoint);

    let err = t
        .bus
        .remove_session_member(&a.name, id, &b.name)
        .expect_err("not multipoint");
    assert_eq!(err.kind, ErrorKind::Denied);
}

#[tokio::test]
async fn test_binder_outside_session_still_sees_teardown() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let b = t.attach(1000);
    let c = t.attach(1000);
    t.bind_multipoint(&a.name, 13);
    let id = t.join(&b.name, &a.name, 13).await;
    t.join(&c.name, &a.name, 13).await;

    t.bus.leave_session(&a.name, id).expect("binder leaves");
    t.bus.flush().await;
    a_events.take();

    let scoped = RecordingListener::new();
    t.bus
        .set_session_listener(&a.name, Some(id), Some(scoped.clone()))
        .expect("binder registers interest");

    t.bus.leave_session(&b.name, id).expect("b leaves");
    t.bus.leave_session(&c.name, id).expect("c leaves");
    t.bus.flush().await;

    assert_eq!(
        scoped.events(),
        vec![Recorded::Lost(id, SessionLostReason::RemoteEndLeftSession)]
    );
    assert!(a_events.events().is_empty());
    assert_eq!(t.bus.session_state(id), SessionState::TornDown);
}

#[tokio::test]
async fn test_binder_outside_session_global_listener_sees_nothing() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let b = t.attach(1000);
    t.bind_multipoint(&a.name, 14);
    let id = t.join(&b.name, &a.name, 14).await;

    t.bus.leave_session(&a.name, id).expect("binder leaves");
    t.bus.flush().await;
    a_events.take();

    t.bus.leave_session(&b.name, id).expect("last member leaves");
    t.bus.flush().await;

    assert!(a_events.events().is_empty());
    assert_eq!(t.bus.session_state(id), SessionState::TornDown);
}

#[tokio::test]
async fn test_per_session_listener_replaces_global_for_that_session_only() {
    let t = TestBus::new();
    let (a, _a_events) = t.attach_recording(1000);
    let (b, b_global) = t.attach_recording(1000);
    let c = t.attach(1000);
    t.bind_multipoint(&a.name, 20);
    t.bind_multipoint(&a.name, 21);

    let scoped = RecordingListener::new();
    let (first, _) = t
        .bus
        .join_session(
            &b.name,
            &a.name,
            SessionPort(20),
            multipoint(),
            Some(scoped.clone()),
            None,
        )
        .await
        .expect("join with override");
    let second = t.join(&b.name, &a.name, 21).await;
    assert_ne!(first, second);

    t.join(&c.name, &a.name, 20).await;
    t.join(&c.name, &a.name, 21).await;

    assert_eq!(
        scoped.events(),
        vec![
            Recorded::Added(first, a.name.clone()),
            Recorded::Added(first, c.name.clone()),
        ]
    );
    assert_eq!(
        b_global.events(),
        vec![
            Recorded::Added(second, a.name.clone()),
            Recorded::Added(second, c.name.clone()),
        ]
    );
}

#[tokio::test]
async fn test_leave_errors() {
    let t = TestBus::new();
    let a = t.attach(1000);
    let b = t.attach(1000);
    let c = t.attach(1000);
    t.bind_multipoint(&a.name, 30);
    let id = t.join(&b.name, &a.name, 30).await;

    let err = t
        .bus
        .leave_session(&b.name, SessionId(id.get() + 100))
        .expect_err("unknown id");
    assert_eq!(err.kind, ErrorKind::NoSession);

    let err = t.bus.leave_session(&c.name, id).expect_err("not a member");
    assert_eq!(err.kind, ErrorKind::NotSessionMember);

    t.bus.leave_session(&b.name, id).expect("leave");
    let err = t.bus.leave_session(&b.name, id).expect_err("second leave");
    assert_eq!(err.kind, ErrorKind::NotSessionMember);
}

#[tokio::test]
async fn test_join_errors() {
    let t = TestBus::new();
    let a = t.attach(1000);
    let b = t.attach(1000);
    t.bind_multipoint(&a.name, 40);
    t.bus
        .bind_session_port(&a.name, SessionPort(41), multipoint(), ScriptedPortListener::refusing())
        .expect("bind refusing");

    let err = t
        .bus
        .join_session(&a.name, &a.name, SessionPort(40), multipoint(), None, None)
        .await
        .expect_err("self join");
    assert_eq!(err.kind, ErrorKind::InvalidArgument);

    let err = t
        .bus
        .join_session(&b.name, &a.name, SessionPort(99), multipoint(), None, None)
        .await
        .expect_err("unbound port");
    assert_eq!(err.kind, ErrorKind::NoSession);

    let err = t
        .bus
        .join_session(&b.name, &a.name, SessionPort(41), multipoint(), None, None)
        .await
        .expect_err("refused");
    assert_eq!(err.kind, ErrorKind::Denied);

    t.join(&b.name, &a.name, 40).await;
    let err = t
        .bus
        .join_session(&b.name, &a.name, SessionPort(40), multipoint(), None, None)
        .await
        .expect_err("twice");
    assert_eq!(err.kind, ErrorKind::AlreadyJoined);

    let err = t
        .bus
        .join_session(":test.999", &a.name, SessionPort(40), multipoint(), None, None)
        .await
        .expect_err("unknown joiner");
    assert_eq!(err.kind, ErrorKind::NoEndpoint);
}

#[tokio::test(start_paused = true)]
async fn test_accept_callback_timeout() {
    let t = TestBus::new();
    let a = t.attach(1000);
    let b = t.attach(1000);
    t.bus
        .bind_session_port(&a.name, SessionPort(50), multipoint(), ScriptedPortListener::held())
        .expect("bind");

    let err = t
        .bus
        .join_session(
            &b.name,
            &a.name,
            SessionPort(50),
            multipoint(),
            None,
            Some(Duration::from_millis(200)),
        )
        .await
        .expect_err("accept never answers");
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(t.bus.snapshot().pending_joins, 0);
    assert_eq!(t.bus.snapshot().sessions, 0);
}

#[tokio::test]
async fn test_joiner_disconnect_cancels_pending_join() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    let b = t.attach(1000);
    let gate = ScriptedPortListener::held();
    t.bus
        .bind_session_port(&a.name, SessionPort(60), multipoint(), gate.clone())
        .expect("bind");

    let join = t
        .bus
        .join_session(&b.name, &a.name, SessionPort(60), multipoint(), None, None);
    let drop_joiner = async {
        gate.entered.notified().await;
        t.bus.disconnect(&b.name).expect("disconnect");
        gate.release.notify_one();
    };
    let (result, ()) = tokio::join!(join, drop_joiner);

    assert_eq!(result.expect_err("cancelled").kind, ErrorKind::NoEndpoint);
    t.bus.flush().await;
    assert!(a_events.events().is_empty());
    assert_eq!(t.bus.snapshot().sessions, 0);
    assert_eq!(
        t.bus.sessions.port_state(&a.name, SessionPort(60)),
        SessionState::Bound
    );
}

#[tokio::test]
async fn test_incompatible_options() {
    let t = TestBus::new();
    let a = t.attach(1000);
    let b = t.attach(1000);
    t.bind_multipoint(&a.name, 70);

    let err = t
        .bus
        .join_session(
            &b.name,
            &a.name,
            SessionPort(70),
            SessionOpts::new(false, TransportMask::ANY),
            None,
            None,
        )
        .await
        .expect_err("point-to-point against multipoint");
    assert_eq!(err.kind, ErrorKind::BadSessionOpts);
}

#[tokio::test]
async fn test_bind_any_and_unbind() {
    let t = TestBus::new();
    let a = t.attach(1000);
    let b = t.attach(1000);
    let listener = ScriptedPortListener::accepting();

    let first = t
        .bus
        .bind_session_port(&a.name, SessionPort::ANY, multipoint(), listener.clone())
        .expect("first any");
    let second = t
        .bus
        .bind_session_port(&a.name, SessionPort::ANY, multipoint(), listener.clone())
        .expect("second any");
    assert_eq!(first, SessionPort(1));
    assert_eq!(second, SessionPort(2));

    let err = t
        .bus
        .bind_session_port(&a.name, first, multipoint(), listener)
        .expect_err("bound");
    assert_eq!(err.kind, ErrorKind::PortInUse);

    let id = t.join(&b.name, &a.name, first.get()).await;
    t.bus.unbind_session_port(&a.name, first).expect("unbind");
    assert_eq!(t.bus.session_state(id), SessionState::Active);
    assert_eq!(
        t.bus
            .unbind_session_port(&a.name, first)
            .expect_err("already unbound")
            .kind,
        ErrorKind::NoSession
    );
}

#[tokio::test]
async fn test_concurrent_joins_are_serialized() {
    let t = TestBus::new();
    let (a, a_events) = t.attach_recording(1000);
    t.bind_multipoint(&a.name, 80);

    let joiners: Vec<_> = (0..8).map(|_| t.attach(1000)).collect();
    let joins = joiners
        .iter()
        .map(|j| t.join(&j.name, &a.name, 80));
    let ids = join_all(joins).await;

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    let id = ids[0];
    let members = t.bus.get_session(id).expect("session").members;
    assert_eq!(members.len(), 9);

    let added: Vec<String> = a_events
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Recorded::Added(_, name) => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(added, members[1..].to_vec());
}
