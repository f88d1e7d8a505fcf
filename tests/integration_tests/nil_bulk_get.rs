// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `GET missing` against a `$-1\r\n` reply surfaces as `None`, distinct
//! from an empty-but-present value.

use redis_client_rs::client::RedisClient;

use crate::integration_tests::common::FakeServer;

#[test]
fn get_on_nil_bulk_reports_none() {
    let server = FakeServer::new(vec![b"$-1\r\n"]);
    let mut client = RedisClient::new("127.0.0.1", server.port, 0, 1_000);

    let value = client.get(b"missing").expect("GET should succeed");
    assert_eq!(value, None);
}

#[test]
fn get_on_empty_bulk_reports_some_empty() {
    let server = FakeServer::new(vec![b"$0\r\n\r\n"]);
    let mut client = RedisClient::new("127.0.0.1", server.port, 0, 1_000);

    let value = client.get(b"empty").expect("GET should succeed");
    assert_eq!(value, Some(Vec::new()));
}
