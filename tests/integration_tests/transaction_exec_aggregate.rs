// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `MULTI; SET a 1; GET a; EXEC` against canned `+OK`, `+QUEUED`,
//! `+QUEUED`, `*2\r\n+OK\r\n$1\r\n1\r\n` replies distributes the inner
//! results positionally and clears transaction mode.

use redis_client_rs::{client::RedisClient, registry::CommandId, reply::Reply};

use crate::integration_tests::common::FakeServer;

#[test]
fn multi_set_get_exec_distributes_results_and_closes_transaction() {
    let server = FakeServer::new(vec![b"+OK\r\n", b"+QUEUED\r\n", b"+QUEUED\r\n", b"*2\r\n+OK\r\n$1\r\n1\r\n"]);
    let mut client = RedisClient::new("127.0.0.1", server.port, 0, 1_000);

    client.multi().expect("MULTI should succeed");
    assert!(client.in_transaction());

    client.add_command(CommandId::SET, vec![b"a".to_vec(), b"1".to_vec()]).expect("queueing SET should succeed");
    client.add_command(CommandId::GET, vec![b"a".to_vec()]).expect("queueing GET should succeed");

    let results = client.exec().expect("EXEC should succeed");
    assert_eq!(results, vec![Reply::Status("OK".into()), Reply::Bulk(Some(b"1".to_vec()))]);
    assert!(!client.in_transaction());
}
