// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! With `capacity=1`, thread T1 checks out a thread-specific connection and
//! releases it back via `ConnectionPool::put` — without T1's thread ever
//! exiting. A concurrently running thread T2 then checks out a
//! not-thread-specific connection and receives the *same* underlying client
//! instance, identified by its process-unique `instance_id`.

use std::sync::mpsc;

use redis_client_rs::pool::{ConnectionPool, Locality};

#[test]
fn pool_hands_the_same_connection_across_threads_via_explicit_put() {
    let pool = ConnectionPool::new("127.0.0.1", 1, 0, 10, 1);
    let (released_tx, released_rx) = mpsc::channel();
    let (finish_tx, finish_rx) = mpsc::channel::<()>();

    let pool_for_t1 = pool.clone();
    let t1 = std::thread::spawn(move || {
        let conn = pool_for_t1.get(Locality::ThreadSpecific);
        let id = conn.instance_id();
        pool_for_t1.put(conn);
        released_tx.send(id).expect("T1 announces release");
        // Stay alive until T2 has finished, so the handoff can only be
        // explained by `put`, not by T1's slot tearing down on exit.
        finish_rx.recv().expect("wait for T2 to finish");
    });

    let t1_instance_id = released_rx.recv().expect("T1 released its connection");
    assert_eq!(pool.idle_count(), 1, "explicit put must land the connection in the free-list right away, with T1 still running");

    let pool_for_t2 = pool.clone();
    let t2_instance_id = std::thread::spawn(move || {
        let conn = pool_for_t2.get(Locality::NotThreadSpecific);
        conn.instance_id()
    })
    .join()
    .expect("T2 should not panic");

    finish_tx.send(()).expect("release T1");
    t1.join().expect("T1 should not panic");

    assert_eq!(t1_instance_id, t2_instance_id, "T2 must be handed T1's exact connection via the free-list, not a freshly created one");
}
