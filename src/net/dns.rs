// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! DNS resolution with a reader-writer-locked cache: readers never block
//! each other, only a cache miss takes the exclusive lock to insert.

use std::{
    collections::HashMap,
    net::{SocketAddr, ToSocketAddrs},
    sync::RwLock,
};

use once_cell::sync::Lazy;

static CACHE: Lazy<RwLock<HashMap<(String, u16), SocketAddr>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Resolves `host:port`, consulting the cache first. On a cache miss the
/// system resolver is consulted and the result is cached for subsequent
/// calls; callers that hit a connect failure are expected to call
/// [`evict`] before retrying.
pub fn resolve(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    let key = (host.to_string(), port);

    if let Some(addr) = CACHE.read().expect("dns cache lock poisoned").get(&key) {
        return Ok(*addr);
    }

    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::other(format!("no address found for {host}:{port}")))?;

    CACHE.write().expect("dns cache lock poisoned").insert(key, addr);
    Ok(addr)
}

/// Drops a stale cache entry, e.g. after a connect failure.
pub fn evict(host: &str, port: u16) {
    CACHE
        .write()
        .expect("dns cache lock poisoned")
        .remove(&(host.to_string(), port));
}
