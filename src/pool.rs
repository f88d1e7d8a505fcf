// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Thread-specific connection pool: a bounded free-list of
//! [`RedisClient`]s behind a mutex, plus an optional thread-local fast
//! path so a thread that consistently asks for "its own" connection skips
//! the lock on every call.
//!
//! The thread-local slot is keyed by pool identity (a pool's `Arc` address)
//! so one thread can hold thread-specific connections from several distinct
//! pools at once. Each slot entry carries a back-reference to its owning
//! pool so that when the thread exits, the slot's destructor returns the
//! connection to that pool's shared free-list instead of just dropping it
//! — a thread-specific checkout is a loan, not a leak. Callers that want a
//! thread-specific connection to become available to *other* threads
//! sooner than that can call [`ConnectionPool::put`] explicitly, which
//! detaches it from the slot and returns it to the free-list right away.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use crate::{client::RedisClient, error::RedisResult};

/// Whether a checked-out connection should be remembered on this thread's
/// local slot for next time, or always returned to the shared free-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locality {
    ThreadSpecific,
    NotThreadSpecific,
}

struct PoolInner {
    host: String,
    port: u16,
    db_index: i64,
    timeout_ms: i64,
    capacity: usize,
    free: Mutex<VecDeque<RedisClient>>,
}

/// Returns `client` to `pool`'s free-list if there's room, else drops it.
fn release(pool: &Arc<PoolInner>, client: RedisClient) {
    let mut free = pool.free.lock().expect("pool lock poisoned");
    if free.len() < pool.capacity {
        free.push_back(client);
    }
}

/// One thread's cached connection for one pool, identified by that pool's
/// `Arc` address. Dropping this (including via thread-exit teardown of
/// [`TLS_SLOTS`]) returns the held client to `pool`'s free-list.
struct TlsEntry {
    pool: Arc<PoolInner>,
    client: Option<RedisClient>,
}

impl Drop for TlsEntry {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            release(&self.pool, client);
        }
    }
}

thread_local! {
    static TLS_SLOTS: RefCell<HashMap<usize, TlsEntry>> = RefCell::new(HashMap::new());
}

fn pool_key(pool: &Arc<PoolInner>) -> usize {
    Arc::as_ptr(pool) as usize
}

/// A bounded pool of connections to one backend. Cheap to clone: clones
/// share the same underlying free-list via `Arc`.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(host: impl Into<String>, port: u16, db_index: i64, timeout_ms: i64, capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                host: host.into(),
                port,
                db_index,
                timeout_ms,
                capacity,
                free: Mutex::new(VecDeque::with_capacity(capacity)),
            }),
        }
    }

    fn new_client(&self) -> RedisClient {
        RedisClient::new(self.inner.host.clone(), self.inner.port, self.inner.db_index, self.inner.timeout_ms)
    }

    /// Checks out a connection. With [`Locality::ThreadSpecific`], the
    /// calling thread's local slot is tried first and filled on return;
    /// otherwise the shared free-list is used and the thread-local slot is
    /// left untouched.
    pub fn get(&self, locality: Locality) -> PooledConnection<'_> {
        if locality == Locality::ThreadSpecific {
            let key = pool_key(&self.inner);
            let cached = TLS_SLOTS.with(|slots| {
                slots.borrow_mut().get_mut(&key).and_then(|entry| entry.client.take())
            });
            if let Some(client) = cached {
                return PooledConnection { pool: self, locality, client: Some(client) };
            }
        }
        let client = self.inner.free.lock().expect("pool lock poisoned").pop_front().unwrap_or_else(|| self.new_client());
        PooledConnection { pool: self, locality, client: Some(client) }
    }

    /// Returns a connection directly, bypassing [`PooledConnection`]'s
    /// drop-based return path. Prefer letting `PooledConnection` go out of
    /// scope; this exists for callers that already hold a bare
    /// `RedisClient` they checked out earlier.
    fn cache(&self, client: RedisClient, locality: Locality) {
        if locality == Locality::ThreadSpecific {
            let key = pool_key(&self.inner);
            TLS_SLOTS.with(|slots| {
                slots.borrow_mut().insert(key, TlsEntry { pool: Arc::clone(&self.inner), client: Some(client) });
            });
            return;
        }
        release(&self.inner, client);
        // Over capacity: `release` drops the connection, closing its socket.
    }

    /// Releases a checked-out connection back to this pool: first detaching
    /// it from the calling thread's local slot (if any), then pushing it
    /// onto the shared free-list. Unlike letting a [`PooledConnection`]
    /// simply drop, this makes a `ThreadSpecific` connection available to
    /// *other* threads immediately, without waiting for the owning thread
    /// to exit.
    pub fn put(&self, mut conn: PooledConnection<'_>) {
        if let Some(client) = conn.client.take() {
            if conn.locality == Locality::ThreadSpecific {
                let key = pool_key(&self.inner);
                TLS_SLOTS.with(|slots| {
                    slots.borrow_mut().remove(&key);
                });
            }
            release(&self.inner, client);
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of idle connections currently sitting in the shared
    /// free-list (does not count thread-local slots).
    pub fn idle_count(&self) -> usize {
        self.inner.free.lock().expect("pool lock poisoned").len()
    }
}

/// A checked-out connection. Returned to its pool automatically on drop.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    locality: Locality,
    client: Option<RedisClient>,
}

impl std::ops::Deref for PooledConnection<'_> {
    type Target = RedisClient;
    fn deref(&self) -> &RedisClient {
        self.client.as_ref().expect("client taken before drop")
    }
}

impl std::ops::DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut RedisClient {
        self.client.as_mut().expect("client taken before drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.cache(client, self.locality);
        }
    }
}

/// Runs `f` with a pooled connection, threading through its `RedisResult`.
/// Convenience wrapper mirroring the one-shot call pattern most callers
/// actually want.
pub fn with_connection<T>(
    pool: &ConnectionPool,
    locality: Locality,
    f: impl FnOnce(&mut RedisClient) -> RedisResult<T>,
) -> RedisResult<T> {
    let mut conn = pool.get(locality);
    f(&mut conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_and_return_reuses_the_same_connection() {
        let pool = ConnectionPool::new("127.0.0.1", 1, 0, 10, 4);
        assert_eq!(pool.idle_count(), 0);
        {
            let _conn = pool.get(Locality::NotThreadSpecific);
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 1);
        {
            let _conn = pool.get(Locality::NotThreadSpecific);
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn over_capacity_connections_are_dropped_not_queued() {
        let pool = ConnectionPool::new("127.0.0.1", 1, 0, 10, 1);
        let a = pool.get(Locality::NotThreadSpecific);
        let b = pool.get(Locality::NotThreadSpecific);
        drop(a);
        drop(b);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn thread_specific_checkout_round_trips_via_thread_local_slot() {
        let pool = ConnectionPool::new("127.0.0.1", 1, 0, 10, 4);
        {
            let _conn = pool.get(Locality::ThreadSpecific);
        }
        // Returned into the thread-local slot, not the shared free-list.
        assert_eq!(pool.idle_count(), 0);
        {
            let _conn = pool.get(Locality::ThreadSpecific);
        }
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn explicit_put_detaches_thread_specific_slot_without_thread_exit() {
        let pool = ConnectionPool::new("127.0.0.1", 1, 0, 10, 4);
        let conn = pool.get(Locality::ThreadSpecific);
        assert_eq!(pool.idle_count(), 0);
        pool.put(conn);
        assert_eq!(pool.idle_count(), 1, "explicit put must detach from the slot and free-list immediately");
        // A fresh thread-specific checkout should come from the free-list,
        // not the (now empty) slot.
        let conn = pool.get(Locality::ThreadSpecific);
        assert_eq!(pool.idle_count(), 0);
        drop(conn);
    }

    #[test]
    fn thread_specific_connection_returns_to_free_list_when_its_thread_exits() {
        let pool = ConnectionPool::new("127.0.0.1", 1, 0, 10, 4);
        let worker_pool = pool.clone();
        std::thread::spawn(move || {
            let _conn = worker_pool.get(Locality::ThreadSpecific);
        })
        .join()
        .expect("worker thread should not panic");

        assert_eq!(pool.idle_count(), 1, "thread-local slot must hand its connection back on thread exit");
    }
}
