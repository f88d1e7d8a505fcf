// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Static command registry: name/id/arity/expected-reply-kind table.
//!
//! Lookup never allocates: the name→id map is built once behind a
//! `once_cell::sync::Lazy` and every other accessor is a match over a
//! `'static` slice indexed by `CommandId`.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Arity check for a command's argument count (excluding the command name
/// itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No arity check is performed.
    Any,
    /// Exactly `n` arguments are required.
    Exact(u32),
    /// At least `n` arguments are required.
    AtLeast(u32),
}

impl Arity {
    /// Whether `n` arguments satisfy this arity.
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Any => true,
            Arity::Exact(k) => n as u32 == k,
            Arity::AtLeast(k) => n as u32 >= k,
        }
    }
}

/// The reply kind the server is expected to return for a given command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Status,
    Error,
    Integer,
    Bulk,
    MultiBulk,
    SpecialMultiBulk,
    /// The actual kind depends on arguments or server state (e.g. `CONFIG`,
    /// scripting); no mismatch is ever raised against this kind.
    Depends,
    /// No reply is expected at all (e.g. `SHUTDOWN` on success).
    None,
}

/// A command understood by the registry, including the `NOOP` sentinel for
/// unknown names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CommandId {
    NOOP,
    // Connection
    AUTH,
    ECHO,
    PING,
    QUIT,
    SELECT,
    // Server
    BGREWRITEAOF,
    BGSAVE,
    CONFIG,
    DBSIZE,
    DEBUG,
    FLUSHALL,
    FLUSHDB,
    INFO,
    LASTSAVE,
    MONITOR,
    SAVE,
    SHUTDOWN,
    SLAVEOF,
    SYNC,
    TIME,
    // Transactions
    DISCARD,
    EXEC,
    MULTI,
    UNWATCH,
    WATCH,
    // Pub/Sub (tolerated, not consumed)
    PSUBSCRIBE,
    PUBLISH,
    PUNSUBSCRIBE,
    SUBSCRIBE,
    UNSUBSCRIBE,
    // Scripting (raw escape hatch only)
    EVAL,
    EVALSHA,
    SCRIPT,
    // KEYS
    DEL,
    DUMP,
    EXISTS,
    EXPIRE,
    EXPIREAT,
    KEYS,
    MIGRATE,
    MOVE,
    OBJECT,
    PERSIST,
    PEXPIRE,
    PEXPIREAT,
    PTTL,
    RANDOMKEY,
    RENAME,
    RENAMENX,
    RESTORE,
    SORT,
    TTL,
    TYPE,
    // String
    APPEND,
    BITCOUNT,
    BITOP,
    BITPOS,
    DECR,
    DECRBY,
    GET,
    GETBIT,
    GETRANGE,
    GETSET,
    INCR,
    INCRBY,
    INCRBYFLOAT,
    MGET,
    MSET,
    MSETNX,
    PSETEX,
    SET,
    SETBIT,
    SETEX,
    SETNX,
    SETRANGE,
    STRLEN,
    // Hashes
    HDEL,
    HEXISTS,
    HGET,
    HGETALL,
    HINCRBY,
    HINCRBYFLOAT,
    HKEYS,
    HLEN,
    HMGET,
    HMSET,
    HSCAN,
    HSET,
    HSETNX,
    HVALS,
    // Lists
    BLPOP,
    BRPOP,
    BRPOPLPUSH,
    LINDEX,
    LINSERT,
    LLEN,
    LPOP,
    LPUSH,
    LPUSHX,
    LRANGE,
    LREM,
    LSET,
    LTRIM,
    RPOP,
    RPOPLPUSH,
    RPUSH,
    RPUSHX,
    // Sets
    SADD,
    SCARD,
    SDIFF,
    SDIFFSTORE,
    SINTER,
    SINTERSTORE,
    SISMEMBER,
    SMEMBERS,
    SMOVE,
    SPOP,
    SRANDMEMBER,
    SREM,
    SSCAN,
    SUNION,
    SUNIONSTORE,
    // Sorted sets
    ZADD,
    ZCARD,
    ZCOUNT,
    ZINCRBY,
    ZINTERSTORE,
    ZRANGE,
    ZRANGEBYSCORE,
    ZRANK,
    ZREM,
    ZREMRANGEBYRANK,
    ZREMRANGEBYSCORE,
    ZREVRANGE,
    ZREVRANGEBYSCORE,
    ZREVRANK,
    ZSCAN,
    ZSCORE,
    ZUNIONSTORE,
}

/// One row of the static command table.
#[derive(Debug, Clone, Copy)]
pub struct CommandInfo {
    pub id: CommandId,
    pub name: &'static str,
    pub arity: Arity,
    pub reply_kind: ReplyKind,
}

macro_rules! table {
    ($(($id:ident, $name:literal, $arity:expr, $kind:ident)),* $(,)?) => {
        &[
            $(CommandInfo { id: CommandId::$id, name: $name, arity: $arity, reply_kind: ReplyKind::$kind },)*
        ]
    };
}

use Arity::{AtLeast as AL, Exact as EX};

/// The full static command table. `NOOP` is intentionally absent: it is
/// never sendable.
pub static COMMAND_TABLE: &[CommandInfo] = table![
    (AUTH, "AUTH", AL(1), Status),
    (ECHO, "ECHO", EX(1), Bulk),
    (PING, "PING", Arity::Any, Status),
    (QUIT, "QUIT", EX(0), Status),
    (SELECT, "SELECT", EX(1), Status),
    (BGREWRITEAOF, "BGREWRITEAOF", EX(0), Status),
    (BGSAVE, "BGSAVE", EX(0), Status),
    (CONFIG, "CONFIG", AL(1), Depends),
    (DBSIZE, "DBSIZE", EX(0), Integer),
    (DEBUG, "DEBUG", AL(1), Depends),
    (FLUSHALL, "FLUSHALL", EX(0), Status),
    (FLUSHDB, "FLUSHDB", EX(0), Status),
    (INFO, "INFO", EX(0), Bulk),
    (LASTSAVE, "LASTSAVE", EX(0), Integer),
    (MONITOR, "MONITOR", EX(0), Status),
    (SAVE, "SAVE", EX(0), Status),
    (SHUTDOWN, "SHUTDOWN", Arity::Any, None),
    (SLAVEOF, "SLAVEOF", EX(2), Status),
    (SYNC, "SYNC", EX(0), None),
    (TIME, "TIME", EX(0), MultiBulk),
    (DISCARD, "DISCARD", EX(0), Status),
    (EXEC, "EXEC", EX(0), SpecialMultiBulk),
    (MULTI, "MULTI", EX(0), Status),
    (UNWATCH, "UNWATCH", EX(0), Status),
    (WATCH, "WATCH", AL(1), Status),
    (PSUBSCRIBE, "PSUBSCRIBE", AL(1), Depends),
    (PUBLISH, "PUBLISH", EX(2), Integer),
    (PUNSUBSCRIBE, "PUNSUBSCRIBE", Arity::Any, Depends),
    (SUBSCRIBE, "SUBSCRIBE", AL(1), Depends),
    (UNSUBSCRIBE, "UNSUBSCRIBE", Arity::Any, Depends),
    (EVAL, "EVAL", AL(2), Depends),
    (EVALSHA, "EVALSHA", AL(2), Depends),
    (SCRIPT, "SCRIPT", AL(1), Depends),
    (DEL, "DEL", AL(1), Integer),
    (DUMP, "DUMP", EX(1), Bulk),
    (EXISTS, "EXISTS", EX(1), Integer),
    (EXPIRE, "EXPIRE", EX(2), Integer),
    (EXPIREAT, "EXPIREAT", EX(2), Integer),
    (KEYS, "KEYS", EX(1), MultiBulk),
    (MIGRATE, "MIGRATE", Arity::Any, Status),
    (MOVE, "MOVE", EX(2), Integer),
    (OBJECT, "OBJECT", AL(1), Depends),
    (PERSIST, "PERSIST", EX(1), Integer),
    (PEXPIRE, "PEXPIRE", EX(2), Integer),
    (PEXPIREAT, "PEXPIREAT", EX(2), Integer),
    (PTTL, "PTTL", EX(1), Integer),
    (RANDOMKEY, "RANDOMKEY", EX(0), Bulk),
    (RENAME, "RENAME", EX(2), Status),
    (RENAMENX, "RENAMENX", EX(2), Integer),
    (RESTORE, "RESTORE", EX(3), Status),
    (SORT, "SORT", AL(1), Depends),
    (TTL, "TTL", EX(1), Integer),
    (TYPE, "TYPE", EX(1), Status),
    (APPEND, "APPEND", EX(2), Integer),
    (BITCOUNT, "BITCOUNT", AL(1), Integer),
    (BITOP, "BITOP", AL(2), Integer),
    (BITPOS, "BITPOS", AL(2), Integer),
    (DECR, "DECR", EX(1), Integer),
    (DECRBY, "DECRBY", EX(2), Integer),
    (GET, "GET", EX(1), Bulk),
    (GETBIT, "GETBIT", EX(2), Integer),
    (GETRANGE, "GETRANGE", EX(3), Bulk),
    (GETSET, "GETSET", EX(2), Bulk),
    (INCR, "INCR", EX(1), Integer),
    (INCRBY, "INCRBY", EX(2), Integer),
    (INCRBYFLOAT, "INCRBYFLOAT", EX(2), Bulk),
    (MGET, "MGET", AL(1), MultiBulk),
    (MSET, "MSET", AL(2), Status),
    (MSETNX, "MSETNX", AL(2), Integer),
    (PSETEX, "PSETEX", EX(3), Status),
    (SET, "SET", AL(2), Status),
    (SETBIT, "SETBIT", EX(3), Integer),
    (SETEX, "SETEX", EX(3), Status),
    (SETNX, "SETNX", EX(2), Integer),
    (SETRANGE, "SETRANGE", EX(3), Integer),
    (STRLEN, "STRLEN", EX(1), Integer),
    (HDEL, "HDEL", AL(2), Integer),
    (HEXISTS, "HEXISTS", EX(2), Integer),
    (HGET, "HGET", EX(2), Bulk),
    (HGETALL, "HGETALL", EX(1), MultiBulk),
    (HINCRBY, "HINCRBY", EX(3), Integer),
    (HINCRBYFLOAT, "HINCRBYFLOAT", EX(3), Bulk),
    (HKEYS, "HKEYS", EX(1), MultiBulk),
    (HLEN, "HLEN", EX(1), Integer),
    (HMGET, "HMGET", AL(2), MultiBulk),
    (HMSET, "HMSET", AL(3), Status),
    (HSCAN, "HSCAN", AL(2), MultiBulk),
    (HSET, "HSET", EX(3), Integer),
    (HSETNX, "HSETNX", EX(3), Integer),
    (HVALS, "HVALS", EX(1), MultiBulk),
    (BLPOP, "BLPOP", AL(2), Depends),
    (BRPOP, "BRPOP", AL(2), Depends),
    (BRPOPLPUSH, "BRPOPLPUSH", EX(3), Depends),
    (LINDEX, "LINDEX", EX(2), Bulk),
    (LINSERT, "LINSERT", EX(4), Integer),
    (LLEN, "LLEN", EX(1), Integer),
    (LPOP, "LPOP", EX(1), Bulk),
    (LPUSH, "LPUSH", AL(2), Integer),
    (LPUSHX, "LPUSHX", EX(2), Integer),
    (LRANGE, "LRANGE", EX(3), MultiBulk),
    (LREM, "LREM", EX(3), Integer),
    (LSET, "LSET", EX(3), Status),
    (LTRIM, "LTRIM", EX(3), Status),
    (RPOP, "RPOP", EX(1), Bulk),
    (RPOPLPUSH, "RPOPLPUSH", EX(2), Bulk),
    (RPUSH, "RPUSH", AL(2), Integer),
    (RPUSHX, "RPUSHX", EX(2), Integer),
    (SADD, "SADD", AL(2), Integer),
    (SCARD, "SCARD", EX(1), Integer),
    (SDIFF, "SDIFF", AL(1), MultiBulk),
    (SDIFFSTORE, "SDIFFSTORE", AL(2), Integer),
    (SINTER, "SINTER", AL(1), MultiBulk),
    (SINTERSTORE, "SINTERSTORE", AL(2), Integer),
    (SISMEMBER, "SISMEMBER", EX(2), Integer),
    (SMEMBERS, "SMEMBERS", EX(1), MultiBulk),
    (SMOVE, "SMOVE", EX(3), Integer),
    (SPOP, "SPOP", EX(1), Bulk),
    (SRANDMEMBER, "SRANDMEMBER", EX(1), Bulk),
    (SREM, "SREM", AL(2), Integer),
    (SSCAN, "SSCAN", AL(2), MultiBulk),
    (SUNION, "SUNION", AL(1), MultiBulk),
    (SUNIONSTORE, "SUNIONSTORE", AL(2), Integer),
    (ZADD, "ZADD", AL(3), Integer),
    (ZCARD, "ZCARD", EX(1), Integer),
    (ZCOUNT, "ZCOUNT", EX(3), Integer),
    (ZINCRBY, "ZINCRBY", EX(3), Bulk),
    (ZINTERSTORE, "ZINTERSTORE", AL(3), Integer),
    (ZRANGE, "ZRANGE", AL(3), MultiBulk),
    (ZRANGEBYSCORE, "ZRANGEBYSCORE", AL(3), MultiBulk),
    (ZRANK, "ZRANK", EX(2), Depends),
    (ZREM, "ZREM", AL(2), Integer),
    (ZREMRANGEBYRANK, "ZREMRANGEBYRANK", EX(3), Integer),
    (ZREMRANGEBYSCORE, "ZREMRANGEBYSCORE", EX(3), Integer),
    (ZREVRANGE, "ZREVRANGE", AL(3), MultiBulk),
    (ZREVRANGEBYSCORE, "ZREVRANGEBYSCORE", AL(3), MultiBulk),
    (ZREVRANK, "ZREVRANK", EX(2), Depends),
    (ZSCAN, "ZSCAN", AL(2), MultiBulk),
    (ZSCORE, "ZSCORE", EX(2), Bulk),
    (ZUNIONSTORE, "ZUNIONSTORE", AL(3), Integer),
];

static NAME_TO_ID: Lazy<HashMap<&'static str, CommandId>> = Lazy::new(|| {
    COMMAND_TABLE
        .iter()
        .map(|info| (info.name, info.id))
        .collect()
});

static ID_TO_INFO: Lazy<HashMap<CommandId, &'static CommandInfo>> = Lazy::new(|| {
    COMMAND_TABLE
        .iter()
        .map(|info| (info.id, info))
        .collect()
});

/// Looks up a command by its (case-insensitive) name. Unknown names resolve
/// to `CommandId::NOOP`, which callers must reject before sending.
pub fn lookup(name: &str) -> CommandId {
    let upper = name.to_ascii_uppercase();
    NAME_TO_ID.get(upper.as_str()).copied().unwrap_or(CommandId::NOOP)
}

/// Returns the static `CommandInfo` row for a command, or `None` for `NOOP`.
pub fn info(id: CommandId) -> Option<&'static CommandInfo> {
    ID_TO_INFO.get(&id).copied()
}
