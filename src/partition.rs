// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Partitioned multi-server dispatcher: routes a key to one of `P`
//! partitions by hash, then to one of `G` replica groups within that
//! partition. Writes fan out to every replica in the target partition;
//! reads try replicas in group order and fall back on the first one that
//! answers without a fatal error.
//!
//! Servers are laid out partition-major: server index
//! `slot(key) + partitions * group` for `group` in `0..replica_groups`.

use crate::{
    client::RedisClient,
    error::{RedisError, RedisResult},
    registry::CommandId,
    reply::Reply,
};

/// `time33_hash_32`: Bernstein-style djb2 variant, seed `5381`,
/// `hash = hash.wrapping_mul(33).wrapping_add(byte)`, folded to `u32`.
/// This is the default hash function; callers may substitute their own.
pub fn time33_hash_32(key: &[u8]) -> u32 {
    let mut hash: u32 = 5381;
    for &byte in key {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u32);
    }
    hash
}

pub type HashFn = fn(&[u8]) -> u32;

/// One backend address, `host:port`, as listed in the partitioned client's
/// configuration (see `cfg::config::PartitionedClientConfig`).
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

/// A client spanning `partitions * replica_groups` servers, each reachable
/// as one [`RedisClient`]. Connections are opened lazily on first use.
pub struct PartitionedClient {
    partitions: usize,
    replica_groups: usize,
    hash_fn: HashFn,
    db_index: i64,
    timeout_ms: i64,
    servers: Vec<RedisClient>,
}

impl PartitionedClient {
    /// `endpoints` must have exactly `partitions * replica_groups` entries,
    /// laid out partition-major: `endpoints[slot + partitions * group]`.
    pub fn new(
        endpoints: Vec<Endpoint>,
        partitions: usize,
        replica_groups: usize,
        db_index: i64,
        timeout_ms: i64,
        hash_fn: Option<HashFn>,
    ) -> RedisResult<Self> {
        if partitions == 0 || replica_groups == 0 {
            return Err(RedisError::validation("partitions and replica_groups must be nonzero"));
        }
        if endpoints.len() != partitions * replica_groups {
            return Err(RedisError::validation(format!(
                "expected {} endpoints, got {}",
                partitions * replica_groups,
                endpoints.len()
            )));
        }
        let servers = endpoints
            .into_iter()
            .map(|e| RedisClient::new(e.host, e.port, db_index, timeout_ms))
            .collect();
        Ok(Self {
            partitions,
            replica_groups,
            hash_fn: hash_fn.unwrap_or(time33_hash_32),
            db_index,
            timeout_ms,
            servers,
        })
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn replica_groups(&self) -> usize {
        self.replica_groups
    }

    /// The partition slot a key routes to: `hash(key) mod partitions`.
    pub fn slot(&self, key: &[u8]) -> usize {
        ((self.hash_fn)(key) as usize) % self.partitions
    }

    fn server_index(&self, slot: usize, group: usize) -> usize {
        slot + self.partitions * group
    }

    fn server_label(&self, index: usize) -> (String, u16) {
        (self.servers[index].host().to_string(), self.servers[index].port())
    }

    /// The current thread's identifier, folded into `0..self.replica_groups`.
    /// Stable for the lifetime of the calling thread, so the read-side
    /// group a thread starts from never moves mid-session, while different
    /// threads spread their reads across different replica groups.
    fn seed(&self) -> usize {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        (hasher.finish() as usize) % self.replica_groups
    }

    /// Runs `f` against every replica of `slot`, tagging each error with
    /// `[host:port]`. Visits groups in `[seed, seed+G) mod G` order so the
    /// fan-out does not always hit the same replica first under contention;
    /// aggregates with logical AND for boolean-shaped results (a write
    /// "succeeds" only if every replica acknowledges it). The first fatal
    /// error aborts the fan-out and is returned, tagged.
    fn write_all<T, F>(&mut self, slot: usize, mut f: F) -> RedisResult<Vec<T>>
    where
        F: FnMut(&mut RedisClient) -> RedisResult<T>,
    {
        let seed = self.seed();
        let mut results = Vec::with_capacity(self.replica_groups);
        for offset in 0..self.replica_groups {
            let group = (seed + offset) % self.replica_groups;
            let index = self.server_index(slot, group);
            let (host, port) = self.server_label(index);
            let result = f(&mut self.servers[index]).map_err(|e| e.tag_host(&host, port))?;
            results.push(result);
        }
        Ok(results)
    }

    /// Tries replicas of `slot` starting at group `seed mod G` (the calling
    /// thread's identifier), advancing to the next group on failure, and
    /// returning the first successful result. If every replica fails,
    /// returns the last (tagged) error.
    fn read_one<T, F>(&mut self, slot: usize, mut f: F) -> RedisResult<T>
    where
        F: FnMut(&mut RedisClient) -> RedisResult<T>,
    {
        let seed = self.seed();
        let mut last_err = None;
        for offset in 0..self.replica_groups {
            let group = (seed + offset) % self.replica_groups;
            let index = self.server_index(slot, group);
            let (host, port) = self.server_label(index);
            match f(&mut self.servers[index]) {
                Ok(v) => return Ok(v),
                Err(e) => last_err = Some(e.tag_host(&host, port)),
            }
        }
        Err(last_err.unwrap_or_else(|| RedisError::validation("no replicas configured")))
    }

    /// Runs `f` against every server in the whole cluster (all partitions,
    /// all replica groups), AND-aggregating success. Used for server-wide
    /// commands like `FLUSHALL`.
    fn on_every_server<F>(&mut self, mut f: F) -> RedisResult<bool>
    where
        F: FnMut(&mut RedisClient) -> RedisResult<bool>,
    {
        let mut ok = true;
        for index in 0..self.servers.len() {
            let (host, port) = self.server_label(index);
            let result = f(&mut self.servers[index]).map_err(|e| e.tag_host(&host, port))?;
            ok &= result;
        }
        Ok(ok)
    }

    // ---- Key-addressed commands --------------------------------------------

    pub fn get(&mut self, key: &[u8]) -> RedisResult<Option<Vec<u8>>> {
        let slot = self.slot(key);
        self.read_one(slot, |c| c.get(key))
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) -> RedisResult<bool> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.set(key, value))?.into_iter().all(|ok| ok))
    }

    pub fn setnx(&mut self, key: &[u8], value: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.setnx(key, value))?.into_iter().max().unwrap_or(0))
    }

    pub fn del(&mut self, key: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        let counts = self.write_all(slot, |c| c.del(key))?;
        Ok(counts.into_iter().max().unwrap_or(0))
    }

    pub fn exists(&mut self, key: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        self.read_one(slot, |c| c.exists(key))
    }

    pub fn expire(&mut self, key: &[u8], seconds: i64) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.expire(key, seconds))?.into_iter().max().unwrap_or(0))
    }

    pub fn ttl(&mut self, key: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        self.read_one(slot, |c| c.ttl(key))
    }

    pub fn incr(&mut self, key: &[u8]) -> RedisResult<i64> {
        self.incrby(key, 1)
    }

    pub fn incrby(&mut self, key: &[u8], delta: i64) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.incrby(key, delta))?.into_iter().max().unwrap_or(0))
    }

    pub fn hget(&mut self, key: &[u8], field: &[u8]) -> RedisResult<Option<Vec<u8>>> {
        let slot = self.slot(key);
        self.read_one(slot, |c| c.hget(key, field))
    }

    pub fn hset(&mut self, key: &[u8], field: &[u8], value: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.hset(key, field, value))?.into_iter().max().unwrap_or(0))
    }

    /// Delegates to `HSETNX`, not `HSET`, on every replica — a naive
    /// generated wrapper that reused the plain `HSET` path after the first
    /// replica would silently turn `NX` into an unconditional overwrite.
    pub fn hsetnx(&mut self, key: &[u8], field: &[u8], value: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        let primary = self.server_index(slot, 0);
        let (host, port) = self.server_label(primary);
        let set = self.servers[primary].hsetnx(key, field, value).map_err(|e| e.tag_host(&host, port))?;
        if set == 0 || self.replica_groups == 1 {
            return Ok(set);
        }
        for group in 1..self.replica_groups {
            let index = self.server_index(slot, group);
            let (host, port) = self.server_label(index);
            self.servers[index].hset(key, field, value).map_err(|e| e.tag_host(&host, port))?;
        }
        Ok(set)
    }

    pub fn hdel(&mut self, key: &[u8], field: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.hdel(key, field))?.into_iter().max().unwrap_or(0))
    }

    pub fn hgetall(&mut self, key: &[u8]) -> RedisResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let slot = self.slot(key);
        self.read_one(slot, |c| c.hgetall(key))
    }

    pub fn lpush(&mut self, key: &[u8], value: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.lpush(key, value))?.into_iter().max().unwrap_or(0))
    }

    pub fn rpush(&mut self, key: &[u8], value: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.rpush(key, value))?.into_iter().max().unwrap_or(0))
    }

    pub fn lrange(&mut self, key: &[u8], start: i64, stop: i64) -> RedisResult<Vec<Vec<u8>>> {
        let slot = self.slot(key);
        self.read_one(slot, |c| c.lrange(key, start, stop))
    }

    pub fn sadd(&mut self, key: &[u8], member: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.sadd(key, member))?.into_iter().max().unwrap_or(0))
    }

    pub fn srem(&mut self, key: &[u8], member: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.srem(key, member))?.into_iter().max().unwrap_or(0))
    }

    pub fn smembers(&mut self, key: &[u8]) -> RedisResult<Vec<Vec<u8>>> {
        let slot = self.slot(key);
        self.read_one(slot, |c| c.smembers(key))
    }

    pub fn zadd(&mut self, key: &[u8], score: f64, member: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.zadd(key, score, member))?.into_iter().max().unwrap_or(0))
    }

    pub fn zrem(&mut self, key: &[u8], member: &[u8]) -> RedisResult<i64> {
        let slot = self.slot(key);
        Ok(self.write_all(slot, |c| c.zrem(key, member))?.into_iter().max().unwrap_or(0))
    }

    pub fn zrange(&mut self, key: &[u8], start: i64, stop: i64, withscores: bool) -> RedisResult<Vec<Vec<u8>>> {
        let slot = self.slot(key);
        self.read_one(slot, |c| c.zrange(key, start, stop, withscores))
    }

    /// Multi-key read: decomposes `keys` by slot, issuing one `MGET` per
    /// touched partition, then reassembles results in the caller's order.
    pub fn mget(&mut self, keys: &[Vec<u8>]) -> RedisResult<Vec<Option<Vec<u8>>>> {
        let mut by_slot: Vec<Vec<(usize, Vec<u8>)>> = vec![Vec::new(); self.partitions];
        for (i, key) in keys.iter().enumerate() {
            by_slot[self.slot(key)].push((i, key.clone()));
        }

        let mut out: Vec<Option<Vec<u8>>> = vec![None; keys.len()];
        for (slot, group) in by_slot.into_iter().enumerate() {
            if group.is_empty() {
                continue;
            }
            let slot_keys: Vec<Vec<u8>> = group.iter().map(|(_, k)| k.clone()).collect();
            let values = self.read_one(slot, |c| {
                let reply = c.mget(&slot_keys)?;
                Ok(reply.unwrap_or_default())
            })?;
            for ((i, _), value) in group.into_iter().zip(values.into_iter()) {
                out[i] = value;
            }
        }
        Ok(out)
    }

    // ---- Server-wide commands -----------------------------------------------

    pub fn flushall(&mut self) -> RedisResult<bool> {
        self.on_every_server(|c| c.flushall())
    }

    pub fn flushdb(&mut self) -> RedisResult<bool> {
        self.on_every_server(|c| c.flushdb())
    }

    pub fn ping_all(&mut self) -> RedisResult<bool> {
        self.on_every_server(|c| c.ping())
    }

    /// Raw escape hatch on a specific server, addressed by `(partition,
    /// replica_group)`, for callers needing a command this surface does
    /// not route automatically.
    pub fn exec_command_on(
        &mut self,
        slot: usize,
        group: usize,
        id: CommandId,
        args: Vec<Vec<u8>>,
    ) -> RedisResult<Reply> {
        if slot >= self.partitions || group >= self.replica_groups {
            return Err(RedisError::validation("slot/group out of range"));
        }
        let index = self.server_index(slot, group);
        let (host, port) = self.server_label(index);
        self.servers[index].exec_command(id, args).map_err(|e| e.tag_host(&host, port))
    }

    pub fn db_index(&self) -> i64 {
        self.db_index
    }

    pub fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time33_hash_matches_djb2_variant() {
        let mut hash: u32 = 5381;
        for b in b"foo" {
            hash = hash.wrapping_mul(33).wrapping_add(*b as u32);
        }
        assert_eq!(time33_hash_32(b"foo"), hash);
    }

    #[test]
    fn hash_is_stable_and_key_dependent() {
        assert_eq!(time33_hash_32(b"same"), time33_hash_32(b"same"));
        assert_ne!(time33_hash_32(b"a"), time33_hash_32(b"b"));
    }

    fn endpoints(n: usize) -> Vec<Endpoint> {
        (0..n).map(|i| Endpoint { host: "127.0.0.1".into(), port: 10000 + i as u16 }).collect()
    }

    #[test]
    fn rejects_mismatched_endpoint_count() {
        let err = PartitionedClient::new(endpoints(3), 4, 1, 0, 50, None).unwrap_err();
        assert!(matches!(err, RedisError::Validation(_)));
    }

    #[test]
    fn server_index_is_partition_major() {
        let client = PartitionedClient::new(endpoints(6), 3, 2, 0, 50, None).unwrap();
        assert_eq!(client.server_index(0, 0), 0);
        assert_eq!(client.server_index(2, 0), 2);
        assert_eq!(client.server_index(0, 1), 3);
        assert_eq!(client.server_index(2, 1), 5);
    }

    #[test]
    fn slot_is_bounded_by_partition_count() {
        let client = PartitionedClient::new(endpoints(4), 4, 1, 0, 50, None).unwrap();
        for key in [b"a".as_slice(), b"bb", b"ccc", b"dddd", b""] {
            assert!(client.slot(key) < 4);
        }
    }

    #[test]
    fn seed_is_stable_within_one_thread() {
        let client = PartitionedClient::new(endpoints(4), 2, 2, 0, 50, None).unwrap();
        let first = client.seed();
        let second = client.seed();
        assert_eq!(first, second);
        assert!(first < 2);
    }
}
