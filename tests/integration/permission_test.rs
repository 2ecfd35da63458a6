//! Integration tests for transport permission decisions made by the bus.

mod helpers;

use std::sync::Arc;

use bytes::Bytes;

use helpers::{ScriptedPortListener, TestBus, multipoint};

use meshbus_core::ErrorKind;
use meshbus_core::types::{SessionOpts, SessionPort, TransportMask, UserId};
use meshbus_router::endpoint::BusEndpoint;
use meshbus_router::{MemoryTransport, Message};

const PLAIN: u32 = 1000;
const NO_IP: u32 = 1001;
const NOTHING: u32 = 1002;

fn restricted_bus() -> TestBus {
    TestBus::with_config(|c| {
        c.permission.ip_denied_users = vec![NO_IP];
        c.permission.all_denied_users = vec![NOTHING];
    })
}

#[tokio::test]
async fn test_ip_stripped_for_denied_user() {
    let t = restricted_bus();
    let denied = t.attach(NO_IP);
    let plain = t.attach(PLAIN);

    let mask = t
        .bus
        .permissions
        .filter_transports(&denied.endpoint, TransportMask::IP | TransportMask::LOCAL, "test")
        .expect("local remains");
    assert_eq!(mask, TransportMask::LOCAL);

    let mask = t
        .bus
        .permissions
        .filter_transports(&plain.endpoint, TransportMask::ANY, "test")
        .expect("unrestricted");
    assert_eq!(mask, TransportMask::ANY);
}

#[tokio::test]
async fn test_all_denied_user_cannot_bind() {
    let t = restricted_bus();
    let denied = t.attach(NOTHING);

    let err = t
        .bus
        .bind_session_port(
            &denied.name,
            SessionPort(5),
            multipoint(),
            ScriptedPortListener::accepting(),
        )
        .expect_err("no transports");
    assert_eq!(err.kind, ErrorKind::NoTransports);
    assert_eq!(t.bus.snapshot().ports, 0);
}

#[tokio::test]
async fn test_join_negotiates_permitted_transports() {
    let t = restricted_bus();
    let host = t.attach(PLAIN);
    let denied = t.attach(NO_IP);
    t.bind_multipoint(&host.name, 9);

    let (_, granted) = t
        .bus
        .join_session(&denied.name, &host.name, SessionPort(9), multipoint(), None, None)
        .await
        .expect("local join");
    assert_eq!(granted.transports, TransportMask::LOCAL);

    let other = t.attach(NO_IP);
    let err = t
        .bus
        .join_session(
            &other.name,
            &host.name,
            SessionPort(9),
            SessionOpts::new(true, TransportMask::TCP),
            None,
            None,
        )
        .await
        .expect_err("ip only");
    assert_eq!(err.kind, ErrorKind::NoTransports);
    assert_eq!(t.bus.snapshot().pending_joins, 0);
}

#[tokio::test]
async fn test_alias_assumes_permissions_of_target_user() {
    let t = restricted_bus();
    let app = t.attach(PLAIN);

    t.bus.alias_unix_user(&app.name, NO_IP).expect("alias");
    let mask = t
        .bus
        .permissions
        .filter_transports(&app.endpoint, TransportMask::ANY, "test")
        .expect("local remains");
    assert_eq!(mask, TransportMask::LOCAL);

    let err = t
        .bus
        .alias_unix_user(&app.name, UserId::INVALID.get())
        .expect_err("invalid alias");
    assert_eq!(err.kind, ErrorKind::InvalidArgument);

    let err = t
        .bus
        .alias_unix_user(":test.999", NO_IP)
        .expect_err("unknown endpoint");
    assert_eq!(err.kind, ErrorKind::NoEndpoint);
}

#[tokio::test]
async fn test_ip_denied_by_default() {
    let t = TestBus::with_config(|c| c.permission.ip_allowed_by_default = false);
    let app = t.attach(PLAIN);
    t.bus.permission_db().set_allowed(UserId(2000), TransportMask::ANY);
    let trusted = t.attach(2000);

    let mask = t
        .bus
        .permissions
        .filter_transports(&app.endpoint, TransportMask::ANY, "test")
        .expect("local");
    assert_eq!(mask, TransportMask::LOCAL);

    let mask = t
        .bus
        .permissions
        .filter_transports(&trusted.endpoint, TransportMask::ANY, "test")
        .expect("explicit entry");
    assert_eq!(mask, TransportMask::ANY);
}

#[tokio::test]
async fn test_denied_sender_cannot_reach_remote_peer() {
    let t = restricted_bus();
    let denied = t.attach(NO_IP);
    let plain = t.attach(PLAIN);
    let transport = Arc::new(MemoryTransport::new(TransportMask::TCP, 4));
    let peer = t
        .bus
        .connect_remote(None, UserId(3000), transport.clone())
        .expect("remote");

    let err = t
        .bus
        .push_message(Message::method_call(peer.clone(), Bytes::new()), &denied.name)
        .expect_err("ip denied");
    assert_eq!(err.kind, ErrorKind::NoTransports);

    t.bus
        .push_message(Message::method_call(peer, Bytes::new()), &plain.name)
        .expect("allowed");
}

#[tokio::test]
async fn test_null_endpoint_rejected() {
    let t = TestBus::new();
    let err = t
        .bus
        .permissions
        .filter_transports(&BusEndpoint::null(":test.0"), TransportMask::ANY, "test")
        .expect_err("null");
    assert_eq!(err.kind, ErrorKind::NoEndpoint);
}
