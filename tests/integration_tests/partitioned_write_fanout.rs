// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! With `P=2, G=2, N=4` and a key hashing to slot 1, `set` must touch
//! backend indices `1` and `3` (`slot + P*group`). If index 3 fails, the
//! whole write fails and `last_error` is tagged with that backend's
//! `host:port`.

use std::net::TcpListener;

use redis_client_rs::partition::{Endpoint, PartitionedClient};

use crate::integration_tests::common::FakeServer;

/// `time33_hash_32(b"b") % 2 == 1`: this key always routes to slot 1 for
/// `partitions = 2`, so the touched replica indices are exactly `1` and
/// `3` (`1 + 2*0` and `1 + 2*1`).
const SLOT1_KEY: &[u8] = b"b";

/// A listener bound but never accepted from, so a connect to it hangs
/// until the other end resets — used for partition slots the test must
/// not touch.
fn unused_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    // Leak the listener so the port stays reserved (and refuses
    // connections after drop) for the test's duration.
    std::mem::forget(listener);
    Endpoint { host: "127.0.0.1".into(), port }
}

#[test]
fn write_fans_out_to_both_replicas_of_the_targeted_slot() {
    let replica0 = FakeServer::new(vec![b"+OK\r\n"]);
    let replica1 = FakeServer::new(vec![b"+OK\r\n"]);

    let endpoints = vec![
        unused_endpoint(),      // index 0: slot 0, group 0 — untouched
        Endpoint { host: "127.0.0.1".into(), port: replica0.port }, // index 1: slot 1, group 0
        unused_endpoint(),      // index 2: slot 0, group 1 — untouched
        Endpoint { host: "127.0.0.1".into(), port: replica1.port }, // index 3: slot 1, group 1
    ];

    let mut client = PartitionedClient::new(endpoints, 2, 2, 0, 1_000, None).expect("construct partitioned client");
    assert_eq!(client.slot(SLOT1_KEY), 1);

    let ok = client.set(SLOT1_KEY, b"v").expect("fan-out SET should succeed when every replica acks");
    assert!(ok);

    replica0.join_captured();
    replica1.join_captured();
}

#[test]
fn setnx_and_incrby_fan_out_the_identical_command_to_every_replica() {
    let replica0 = FakeServer::new(vec![b":1\r\n".as_slice(), b":4\r\n"]);
    let replica1 = FakeServer::new(vec![b":1\r\n".as_slice(), b":4\r\n"]);

    let endpoints = vec![
        unused_endpoint(),
        Endpoint { host: "127.0.0.1".into(), port: replica0.port },
        unused_endpoint(),
        Endpoint { host: "127.0.0.1".into(), port: replica1.port },
    ];

    let mut client = PartitionedClient::new(endpoints, 2, 2, 0, 1_000, None).expect("construct partitioned client");
    assert_eq!(client.slot(SLOT1_KEY), 1);

    let set = client.setnx(SLOT1_KEY, b"v").expect("fan-out SETNX should succeed when every replica acks");
    assert_eq!(set, 1);
    let incremented = client.incrby(SLOT1_KEY, 4).expect("fan-out INCRBY should succeed when every replica acks");
    assert_eq!(incremented, 4);

    let captured0 = replica0.join_captured();
    let captured1 = replica1.join_captured();
    let body0 = String::from_utf8_lossy(&captured0);
    let body1 = String::from_utf8_lossy(&captured1);

    // Both replicas must see the literal SETNX and INCRBY commands, never a
    // derived SET carrying a primary-computed value.
    for body in [&body0, &body1] {
        assert!(body.to_uppercase().contains("SETNX"), "expected SETNX on every replica, got: {body}");
        assert!(body.to_uppercase().contains("INCRBY"), "expected INCRBY on every replica, got: {body}");
    }
}

#[test]
fn write_fan_out_failure_is_tagged_with_the_failing_replicas_address() {
    let replica0 = FakeServer::new(vec![b"+OK\r\n"]);
    // A listener that accepts then immediately closes, simulating a
    // mid-frame EOF on whichever replica it represents.
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let failing_port = listener.local_addr().expect("local addr").port();
    std::thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            drop(stream);
        }
    });

    let endpoints = vec![
        unused_endpoint(),
        Endpoint { host: "127.0.0.1".into(), port: replica0.port },
        unused_endpoint(),
        Endpoint { host: "127.0.0.1".into(), port: failing_port },
    ];

    let mut client = PartitionedClient::new(endpoints, 2, 2, 0, 500, None).expect("construct partitioned client");
    assert_eq!(client.slot(SLOT1_KEY), 1);

    let err = client.set(SLOT1_KEY, b"v").expect_err("one failing replica must fail the whole write");
    let message = err.to_string();
    assert!(
        message.contains(&format!("[127.0.0.1:{failing_port}]")),
        "expected the failing replica's address tagged in: {message}"
    );
}
