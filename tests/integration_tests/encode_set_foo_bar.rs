// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `SET foo bar` encodes to the exact documented wire bytes, and a `+OK`
//! reply is reported as success with `last_error` untouched.

use redis_client_rs::client::RedisClient;

use crate::integration_tests::common::FakeServer;

#[test]
fn set_foo_bar_round_trips_against_a_fake_server() {
    let server = FakeServer::new(vec![b"+OK\r\n"]);
    let mut client = RedisClient::new("127.0.0.1", server.port, 0, 1_000);

    let ok = client.set(b"foo", b"bar").expect("SET should succeed");
    assert!(ok);
    assert!(client.last_error().is_none());

    let captured = server.join_captured();
    assert_eq!(captured, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
}
