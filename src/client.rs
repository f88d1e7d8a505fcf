// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Single-server client: one typed method per known command, each
//! encoding its arguments, sending, waiting for the reply, and projecting
//! it into the caller's output shape.
//!
//! Two escape hatches remain for callers who need a command this surface
//! does not wrap: [`RedisClient::exec_command`] (raw `Request`) and
//! [`RedisClient::exec_command_text`] (printf-style, whitespace-split,
//! *not* binary-safe).

use crate::{
    connection::Connection,
    error::{RedisError, RedisResult},
    registry::CommandId,
    reply::Reply,
};

fn s(v: impl Into<String>) -> Vec<u8> {
    v.into().into_bytes()
}

fn int_arg(v: i64) -> Vec<u8> {
    v.to_string().into_bytes()
}

fn float_arg(v: f64) -> Vec<u8> {
    v.to_string().into_bytes()
}

fn as_integer(id: CommandId, reply: Reply) -> RedisResult<i64> {
    match reply {
        Reply::Integer(i) => Ok(i),
        other => Err(RedisError::ReplyMismatch(format!("{id:?}: expected Integer, got {other:?}"))),
    }
}

/// True on `OK`/`PONG`; any other status text also counts as success since
/// error replies already short-circuited before reaching here.
fn as_ok_bool(reply: Reply) -> RedisResult<bool> {
    match reply {
        Reply::Status(_) => Ok(true),
        other => Err(RedisError::ReplyMismatch(format!("expected Status, got {other:?}"))),
    }
}

fn as_status_text(id: CommandId, reply: Reply) -> RedisResult<String> {
    match reply {
        Reply::Status(text) => Ok(text),
        other => Err(RedisError::ReplyMismatch(format!("{id:?}: expected Status, got {other:?}"))),
    }
}

/// `(bytes, is_nil)` projection for commands whose reply is `Bulk`.
fn as_bulk_nilable(id: CommandId, reply: Reply) -> RedisResult<(Vec<u8>, bool)> {
    match reply {
        Reply::Bulk(Some(bytes)) => Ok((bytes, false)),
        Reply::Bulk(None) => Ok((Vec::new(), true)),
        other => Err(RedisError::ReplyMismatch(format!("{id:?}: expected Bulk, got {other:?}"))),
    }
}

/// For commands that cannot legitimately return nil (e.g. `INFO`).
fn as_bulk_required(id: CommandId, reply: Reply) -> RedisResult<Vec<u8>> {
    let (bytes, is_nil) = as_bulk_nilable(id, reply)?;
    if is_nil {
        return Err(RedisError::Protocol(format!("{id:?}: unexpected nil bulk")));
    }
    Ok(bytes)
}

fn as_float_bulk(id: CommandId, reply: Reply) -> RedisResult<f64> {
    let bytes = as_bulk_required(id, reply)?;
    std::str::from_utf8(&bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| RedisError::ReplyMismatch(format!("{id:?}: malformed float bulk")))
}

/// `None` for the nil multi-bulk, `Some(items)` (each possibly nil)
/// otherwise.
fn as_multi_bulk(id: CommandId, reply: Reply) -> RedisResult<Option<Vec<Option<Vec<u8>>>>> {
    match reply {
        Reply::MultiBulk(items) => Ok(items),
        other => Err(RedisError::ReplyMismatch(format!("{id:?}: expected MultiBulk, got {other:?}"))),
    }
}

fn flatten_multi_bulk(items: Option<Vec<Option<Vec<u8>>>>) -> Vec<Vec<u8>> {
    items.unwrap_or_default().into_iter().flatten().collect()
}

static NEXT_INSTANCE_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

/// A typed façade over one `Connection`, exposing one method per known
/// command plus the raw/text escape hatches and transaction helpers.
pub struct RedisClient {
    conn: Connection,
    instance_id: u64,
}

impl RedisClient {
    pub fn new(host: impl Into<String>, port: u16, db_index: i64, timeout_ms: i64) -> Self {
        let instance_id = NEXT_INSTANCE_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Self { conn: Connection::new(host, port, db_index, timeout_ms), instance_id }
    }

    /// A process-unique tag assigned at construction, identity-observable
    /// across pool checkout/checkin without exposing the underlying
    /// connection. Used by pool tests to confirm reuse rather than
    /// re-creation.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn last_error(&self) -> Option<&RedisError> {
        self.conn.last_error()
    }

    pub fn host(&self) -> &str {
        self.conn.host()
    }

    pub fn port(&self) -> u16 {
        self.conn.port()
    }

    fn call(&mut self, id: CommandId, args: Vec<Vec<u8>>) -> RedisResult<Reply> {
        self.conn.exec_command(id, &args, false)
    }

    fn call_blocking(&mut self, id: CommandId, args: Vec<Vec<u8>>) -> RedisResult<Reply> {
        self.conn.exec_command(id, &args, true)
    }

    /// Raw escape hatch: send any registered command with pre-encoded
    /// arguments and get the parsed `Reply` back unprojected.
    pub fn exec_command(&mut self, id: CommandId, args: Vec<Vec<u8>>) -> RedisResult<Reply> {
        self.call(id, args)
    }

    /// Printf-style escape hatch: whitespace-split `line` into argv. Not
    /// binary-safe — arguments containing whitespace cannot be expressed.
    pub fn exec_command_text(&mut self, line: &str) -> RedisResult<Reply> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or_else(|| RedisError::validation("empty command line"))?;
        let id = crate::registry::lookup(name);
        if id == CommandId::NOOP {
            return Err(RedisError::validation(format!("unknown command {name}")));
        }
        let args = parts.map(|p| p.as_bytes().to_vec()).collect();
        self.call(id, args)
    }

    // ---- Connection ---------------------------------------------------------

    pub fn auth(&mut self, password: &str) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::AUTH, vec![s(password)])?)
    }

    pub fn echo(&mut self, msg: &[u8]) -> RedisResult<Vec<u8>> {
        as_bulk_required(CommandId::ECHO, self.call(CommandId::ECHO, vec![msg.to_vec()])?)
    }

    pub fn ping(&mut self) -> RedisResult<bool> {
        let reply = self.call(CommandId::PING, vec![])?;
        Ok(reply.is_status_pong() || matches!(reply, Reply::Status(_)))
    }

    pub fn select(&mut self, index: i64) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::SELECT, vec![int_arg(index)])?)
    }

    // ---- Server ---------------------------------------------------------------

    pub fn flushall(&mut self) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::FLUSHALL, vec![])?)
    }

    pub fn flushdb(&mut self) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::FLUSHDB, vec![])?)
    }

    pub fn dbsize(&mut self) -> RedisResult<i64> {
        as_integer(CommandId::DBSIZE, self.call(CommandId::DBSIZE, vec![])?)
    }

    /// Server info text, returned verbatim.
    pub fn info(&mut self) -> RedisResult<Vec<u8>> {
        as_bulk_required(CommandId::INFO, self.call(CommandId::INFO, vec![])?)
    }

    pub fn time(&mut self) -> RedisResult<(i64, i64)> {
        let items = flatten_multi_bulk(as_multi_bulk(CommandId::TIME, self.call(CommandId::TIME, vec![])?)?);
        if items.len() != 2 {
            return Err(RedisError::Protocol("TIME: expected 2-element multi-bulk".into()));
        }
        let parse = |b: &[u8]| {
            std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| RedisError::Protocol("TIME: malformed integer component".into()))
        };
        Ok((parse(&items[0])?, parse(&items[1])?))
    }

    // ---- KEYS -----------------------------------------------------------------

    pub fn del(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::DEL, self.call(CommandId::DEL, vec![key.to_vec()])?)
    }

    pub fn del_many(&mut self, keys: &[Vec<u8>]) -> RedisResult<i64> {
        as_integer(CommandId::DEL, self.call(CommandId::DEL, keys.to_vec())?)
    }

    pub fn exists(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::EXISTS, self.call(CommandId::EXISTS, vec![key.to_vec()])?)
    }

    pub fn expire(&mut self, key: &[u8], seconds: i64) -> RedisResult<i64> {
        as_integer(CommandId::EXPIRE, self.call(CommandId::EXPIRE, vec![key.to_vec(), int_arg(seconds)])?)
    }

    pub fn expireat(&mut self, key: &[u8], abs_seconds: i64) -> RedisResult<i64> {
        as_integer(
            CommandId::EXPIREAT,
            self.call(CommandId::EXPIREAT, vec![key.to_vec(), int_arg(abs_seconds)])?,
        )
    }

    pub fn keys(&mut self, pattern: &[u8]) -> RedisResult<Vec<Vec<u8>>> {
        Ok(flatten_multi_bulk(as_multi_bulk(
            CommandId::KEYS,
            self.call(CommandId::KEYS, vec![pattern.to_vec()])?,
        )?))
    }

    pub fn persist(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::PERSIST, self.call(CommandId::PERSIST, vec![key.to_vec()])?)
    }

    pub fn pttl(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::PTTL, self.call(CommandId::PTTL, vec![key.to_vec()])?)
    }

    pub fn ttl(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::TTL, self.call(CommandId::TTL, vec![key.to_vec()])?)
    }

    pub fn rename(&mut self, key: &[u8], new_key: &[u8]) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::RENAME, vec![key.to_vec(), new_key.to_vec()])?)
    }

    pub fn renamenx(&mut self, key: &[u8], new_key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::RENAMENX, self.call(CommandId::RENAMENX, vec![key.to_vec(), new_key.to_vec()])?)
    }

    pub fn type_of(&mut self, key: &[u8]) -> RedisResult<String> {
        as_status_text(CommandId::TYPE, self.call(CommandId::TYPE, vec![key.to_vec()])?)
    }

    pub fn randomkey(&mut self) -> RedisResult<Option<Vec<u8>>> {
        let (bytes, is_nil) = as_bulk_nilable(CommandId::RANDOMKEY, self.call(CommandId::RANDOMKEY, vec![])?)?;
        Ok((!is_nil).then_some(bytes))
    }

    // ---- String -----------------------------------------------------------

    pub fn get(&mut self, key: &[u8]) -> RedisResult<Option<Vec<u8>>> {
        let (bytes, is_nil) = as_bulk_nilable(CommandId::GET, self.call(CommandId::GET, vec![key.to_vec()])?)?;
        Ok((!is_nil).then_some(bytes))
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::SET, vec![key.to_vec(), value.to_vec()])?)
    }

    pub fn setnx(&mut self, key: &[u8], value: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::SETNX, self.call(CommandId::SETNX, vec![key.to_vec(), value.to_vec()])?)
    }

    pub fn setex(&mut self, key: &[u8], seconds: i64, value: &[u8]) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::SETEX, vec![key.to_vec(), int_arg(seconds), value.to_vec()])?)
    }

    pub fn psetex(&mut self, key: &[u8], milliseconds: i64, value: &[u8]) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::PSETEX, vec![key.to_vec(), int_arg(milliseconds), value.to_vec()])?)
    }

    pub fn append(&mut self, key: &[u8], value: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::APPEND, self.call(CommandId::APPEND, vec![key.to_vec(), value.to_vec()])?)
    }

    pub fn strlen(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::STRLEN, self.call(CommandId::STRLEN, vec![key.to_vec()])?)
    }

    pub fn getset(&mut self, key: &[u8], value: &[u8]) -> RedisResult<Option<Vec<u8>>> {
        let (bytes, is_nil) =
            as_bulk_nilable(CommandId::GETSET, self.call(CommandId::GETSET, vec![key.to_vec(), value.to_vec()])?)?;
        Ok((!is_nil).then_some(bytes))
    }

    pub fn getrange(&mut self, key: &[u8], start: i64, end: i64) -> RedisResult<Vec<u8>> {
        as_bulk_required(
            CommandId::GETRANGE,
            self.call(CommandId::GETRANGE, vec![key.to_vec(), int_arg(start), int_arg(end)])?,
        )
    }

    pub fn setrange(&mut self, key: &[u8], offset: i64, value: &[u8]) -> RedisResult<i64> {
        as_integer(
            CommandId::SETRANGE,
            self.call(CommandId::SETRANGE, vec![key.to_vec(), int_arg(offset), value.to_vec()])?,
        )
    }

    pub fn getbit(&mut self, key: &[u8], offset: i64) -> RedisResult<i64> {
        as_integer(CommandId::GETBIT, self.call(CommandId::GETBIT, vec![key.to_vec(), int_arg(offset)])?)
    }

    pub fn setbit(&mut self, key: &[u8], offset: i64, value: i64) -> RedisResult<i64> {
        as_integer(
            CommandId::SETBIT,
            self.call(CommandId::SETBIT, vec![key.to_vec(), int_arg(offset), int_arg(value)])?,
        )
    }

    pub fn incr(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::INCR, self.call(CommandId::INCR, vec![key.to_vec()])?)
    }

    pub fn incrby(&mut self, key: &[u8], inc: i64) -> RedisResult<i64> {
        as_integer(CommandId::INCRBY, self.call(CommandId::INCRBY, vec![key.to_vec(), int_arg(inc)])?)
    }

    pub fn incrbyfloat(&mut self, key: &[u8], inc: f64) -> RedisResult<f64> {
        as_float_bulk(
            CommandId::INCRBYFLOAT,
            self.call(CommandId::INCRBYFLOAT, vec![key.to_vec(), float_arg(inc)])?,
        )
    }

    pub fn decr(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::DECR, self.call(CommandId::DECR, vec![key.to_vec()])?)
    }

    pub fn decrby(&mut self, key: &[u8], dec: i64) -> RedisResult<i64> {
        as_integer(CommandId::DECRBY, self.call(CommandId::DECRBY, vec![key.to_vec(), int_arg(dec)])?)
    }

    pub fn mget(&mut self, keys: &[Vec<u8>]) -> RedisResult<Option<Vec<Option<Vec<u8>>>>> {
        as_multi_bulk(CommandId::MGET, self.call(CommandId::MGET, keys.to_vec())?)
    }

    pub fn mset(&mut self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> RedisResult<bool> {
        if keys.len() != values.len() {
            return Err(RedisError::validation("mset: keys and values length mismatch"));
        }
        let args = keys.iter().cloned().zip(values.iter().cloned()).flat_map(|(k, v)| [k, v]).collect();
        as_ok_bool(self.call(CommandId::MSET, args)?)
    }

    // ---- Hashes -----------------------------------------------------------

    pub fn hget(&mut self, key: &[u8], field: &[u8]) -> RedisResult<Option<Vec<u8>>> {
        let (bytes, is_nil) =
            as_bulk_nilable(CommandId::HGET, self.call(CommandId::HGET, vec![key.to_vec(), field.to_vec()])?)?;
        Ok((!is_nil).then_some(bytes))
    }

    pub fn hset(&mut self, key: &[u8], field: &[u8], value: &[u8]) -> RedisResult<i64> {
        as_integer(
            CommandId::HSET,
            self.call(CommandId::HSET, vec![key.to_vec(), field.to_vec(), value.to_vec()])?,
        )
    }

    pub fn hsetnx(&mut self, key: &[u8], field: &[u8], value: &[u8]) -> RedisResult<i64> {
        as_integer(
            CommandId::HSETNX,
            self.call(CommandId::HSETNX, vec![key.to_vec(), field.to_vec(), value.to_vec()])?,
        )
    }

    pub fn hdel(&mut self, key: &[u8], field: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::HDEL, self.call(CommandId::HDEL, vec![key.to_vec(), field.to_vec()])?)
    }

    pub fn hdel_many(&mut self, key: &[u8], fields: &[Vec<u8>]) -> RedisResult<i64> {
        let mut args = vec![key.to_vec()];
        args.extend_from_slice(fields);
        as_integer(CommandId::HDEL, self.call(CommandId::HDEL, args)?)
    }

    pub fn hexists(&mut self, key: &[u8], field: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::HEXISTS, self.call(CommandId::HEXISTS, vec![key.to_vec(), field.to_vec()])?)
    }

    pub fn hlen(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::HLEN, self.call(CommandId::HLEN, vec![key.to_vec()])?)
    }

    pub fn hincrby(&mut self, key: &[u8], field: &[u8], inc: i64) -> RedisResult<i64> {
        as_integer(
            CommandId::HINCRBY,
            self.call(CommandId::HINCRBY, vec![key.to_vec(), field.to_vec(), int_arg(inc)])?,
        )
    }

    pub fn hincrbyfloat(&mut self, key: &[u8], field: &[u8], inc: f64) -> RedisResult<f64> {
        as_float_bulk(
            CommandId::HINCRBYFLOAT,
            self.call(CommandId::HINCRBYFLOAT, vec![key.to_vec(), field.to_vec(), float_arg(inc)])?,
        )
    }

    pub fn hkeys(&mut self, key: &[u8]) -> RedisResult<Vec<Vec<u8>>> {
        Ok(flatten_multi_bulk(as_multi_bulk(CommandId::HKEYS, self.call(CommandId::HKEYS, vec![key.to_vec()])?)?))
    }

    pub fn hvals(&mut self, key: &[u8]) -> RedisResult<Vec<Vec<u8>>> {
        Ok(flatten_multi_bulk(as_multi_bulk(CommandId::HVALS, self.call(CommandId::HVALS, vec![key.to_vec()])?)?))
    }

    pub fn hmget(&mut self, key: &[u8], fields: &[Vec<u8>]) -> RedisResult<Option<Vec<Option<Vec<u8>>>>> {
        let mut args = vec![key.to_vec()];
        args.extend_from_slice(fields);
        as_multi_bulk(CommandId::HMGET, self.call(CommandId::HMGET, args)?)
    }

    pub fn hmset(&mut self, key: &[u8], fields: &[Vec<u8>], values: &[Vec<u8>]) -> RedisResult<bool> {
        if fields.len() != values.len() {
            return Err(RedisError::validation("hmset: fields and values length mismatch"));
        }
        let mut args = vec![key.to_vec()];
        args.extend(fields.iter().cloned().zip(values.iter().cloned()).flat_map(|(f, v)| [f, v]));
        as_ok_bool(self.call(CommandId::HMSET, args)?)
    }

    /// `hgetall` as an ordered field/value pair vector.
    pub fn hgetall(&mut self, key: &[u8]) -> RedisResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let flat = flatten_multi_bulk(as_multi_bulk(CommandId::HGETALL, self.call(CommandId::HGETALL, vec![key.to_vec()])?)?);
        if flat.len() % 2 != 0 {
            return Err(RedisError::Protocol("HGETALL: odd number of elements".into()));
        }
        Ok(flat.chunks_exact(2).map(|c| (c[0].clone(), c[1].clone())).collect())
    }

    /// `hgetall` as a map, for callers that do not need field order.
    pub fn hgetall_map(&mut self, key: &[u8]) -> RedisResult<std::collections::HashMap<Vec<u8>, Vec<u8>>> {
        Ok(self.hgetall(key)?.into_iter().collect())
    }

    // ---- Lists --------------------------------------------------------------

    pub fn llen(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::LLEN, self.call(CommandId::LLEN, vec![key.to_vec()])?)
    }

    pub fn lpush(&mut self, key: &[u8], value: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::LPUSH, self.call(CommandId::LPUSH, vec![key.to_vec(), value.to_vec()])?)
    }

    pub fn lpush_many(&mut self, key: &[u8], values: &[Vec<u8>]) -> RedisResult<i64> {
        let mut args = vec![key.to_vec()];
        args.extend_from_slice(values);
        as_integer(CommandId::LPUSH, self.call(CommandId::LPUSH, args)?)
    }

    pub fn lpushx(&mut self, key: &[u8], value: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::LPUSHX, self.call(CommandId::LPUSHX, vec![key.to_vec(), value.to_vec()])?)
    }

    pub fn rpush(&mut self, key: &[u8], value: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::RPUSH, self.call(CommandId::RPUSH, vec![key.to_vec(), value.to_vec()])?)
    }

    pub fn rpush_many(&mut self, key: &[u8], values: &[Vec<u8>]) -> RedisResult<i64> {
        let mut args = vec![key.to_vec()];
        args.extend_from_slice(values);
        as_integer(CommandId::RPUSH, self.call(CommandId::RPUSH, args)?)
    }

    pub fn rpushx(&mut self, key: &[u8], value: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::RPUSHX, self.call(CommandId::RPUSHX, vec![key.to_vec(), value.to_vec()])?)
    }

    pub fn lpop(&mut self, key: &[u8]) -> RedisResult<Option<Vec<u8>>> {
        let (bytes, is_nil) = as_bulk_nilable(CommandId::LPOP, self.call(CommandId::LPOP, vec![key.to_vec()])?)?;
        Ok((!is_nil).then_some(bytes))
    }

    pub fn rpop(&mut self, key: &[u8]) -> RedisResult<Option<Vec<u8>>> {
        let (bytes, is_nil) = as_bulk_nilable(CommandId::RPOP, self.call(CommandId::RPOP, vec![key.to_vec()])?)?;
        Ok((!is_nil).then_some(bytes))
    }

    /// Blocks server-side with no client read timeout (the `Blocking`
    /// overlay), scoped to this one call.
    pub fn blpop(&mut self, keys: &[Vec<u8>], timeout_seconds: i64) -> RedisResult<Option<Vec<Option<Vec<u8>>>>> {
        let mut args = keys.to_vec();
        args.push(int_arg(timeout_seconds));
        as_multi_bulk(CommandId::BLPOP, self.call_blocking(CommandId::BLPOP, args)?)
    }

    pub fn brpop(&mut self, keys: &[Vec<u8>], timeout_seconds: i64) -> RedisResult<Option<Vec<Option<Vec<u8>>>>> {
        let mut args = keys.to_vec();
        args.push(int_arg(timeout_seconds));
        as_multi_bulk(CommandId::BRPOP, self.call_blocking(CommandId::BRPOP, args)?)
    }

    pub fn lindex(&mut self, key: &[u8], index: i64) -> RedisResult<Option<Vec<u8>>> {
        let (bytes, is_nil) =
            as_bulk_nilable(CommandId::LINDEX, self.call(CommandId::LINDEX, vec![key.to_vec(), int_arg(index)])?)?;
        Ok((!is_nil).then_some(bytes))
    }

    pub fn lset(&mut self, key: &[u8], index: i64, value: &[u8]) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::LSET, vec![key.to_vec(), int_arg(index), value.to_vec()])?)
    }

    pub fn lrange(&mut self, key: &[u8], start: i64, stop: i64) -> RedisResult<Vec<Vec<u8>>> {
        Ok(flatten_multi_bulk(as_multi_bulk(
            CommandId::LRANGE,
            self.call(CommandId::LRANGE, vec![key.to_vec(), int_arg(start), int_arg(stop)])?,
        )?))
    }

    pub fn ltrim(&mut self, key: &[u8], start: i64, stop: i64) -> RedisResult<bool> {
        as_ok_bool(self.call(CommandId::LTRIM, vec![key.to_vec(), int_arg(start), int_arg(stop)])?)
    }

    pub fn lrem(&mut self, key: &[u8], count: i64, value: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::LREM, self.call(CommandId::LREM, vec![key.to_vec(), int_arg(count), value.to_vec()])?)
    }

    pub fn linsert(&mut self, key: &[u8], before: bool, pivot: &[u8], value: &[u8]) -> RedisResult<i64> {
        let where_arg = if before { "BEFORE" } else { "AFTER" };
        as_integer(
            CommandId::LINSERT,
            self.call(CommandId::LINSERT, vec![key.to_vec(), s(where_arg), pivot.to_vec(), value.to_vec()])?,
        )
    }

    // ---- Sets ---------------------------------------------------------------

    pub fn sadd(&mut self, key: &[u8], member: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::SADD, self.call(CommandId::SADD, vec![key.to_vec(), member.to_vec()])?)
    }

    pub fn sadd_many(&mut self, key: &[u8], members: &[Vec<u8>]) -> RedisResult<i64> {
        let mut args = vec![key.to_vec()];
        args.extend_from_slice(members);
        as_integer(CommandId::SADD, self.call(CommandId::SADD, args)?)
    }

    pub fn srem(&mut self, key: &[u8], member: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::SREM, self.call(CommandId::SREM, vec![key.to_vec(), member.to_vec()])?)
    }

    pub fn srem_many(&mut self, key: &[u8], members: &[Vec<u8>]) -> RedisResult<i64> {
        let mut args = vec![key.to_vec()];
        args.extend_from_slice(members);
        as_integer(CommandId::SREM, self.call(CommandId::SREM, args)?)
    }

    pub fn scard(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::SCARD, self.call(CommandId::SCARD, vec![key.to_vec()])?)
    }

    pub fn sismember(&mut self, key: &[u8], member: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::SISMEMBER, self.call(CommandId::SISMEMBER, vec![key.to_vec(), member.to_vec()])?)
    }

    pub fn smembers(&mut self, key: &[u8]) -> RedisResult<Vec<Vec<u8>>> {
        Ok(flatten_multi_bulk(as_multi_bulk(
            CommandId::SMEMBERS,
            self.call(CommandId::SMEMBERS, vec![key.to_vec()])?,
        )?))
    }

    pub fn spop(&mut self, key: &[u8]) -> RedisResult<Option<Vec<u8>>> {
        let (bytes, is_nil) = as_bulk_nilable(CommandId::SPOP, self.call(CommandId::SPOP, vec![key.to_vec()])?)?;
        Ok((!is_nil).then_some(bytes))
    }

    pub fn srandmember(&mut self, key: &[u8]) -> RedisResult<Option<Vec<u8>>> {
        let (bytes, is_nil) =
            as_bulk_nilable(CommandId::SRANDMEMBER, self.call(CommandId::SRANDMEMBER, vec![key.to_vec()])?)?;
        Ok((!is_nil).then_some(bytes))
    }

    // ---- Sorted sets ----------------------------------------------------------

    pub fn zadd(&mut self, key: &[u8], score: f64, member: &[u8]) -> RedisResult<i64> {
        as_integer(
            CommandId::ZADD,
            self.call(CommandId::ZADD, vec![key.to_vec(), float_arg(score), member.to_vec()])?,
        )
    }

    pub fn zadd_many(&mut self, key: &[u8], scores: &[f64], members: &[Vec<u8>]) -> RedisResult<i64> {
        if scores.len() != members.len() {
            return Err(RedisError::validation("zadd_many: scores and members length mismatch"));
        }
        let mut args = vec![key.to_vec()];
        args.extend(scores.iter().zip(members.iter()).flat_map(|(sc, m)| [float_arg(*sc), m.clone()]));
        as_integer(CommandId::ZADD, self.call(CommandId::ZADD, args)?)
    }

    pub fn zcard(&mut self, key: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::ZCARD, self.call(CommandId::ZCARD, vec![key.to_vec()])?)
    }

    pub fn zscore(&mut self, key: &[u8], member: &[u8]) -> RedisResult<Option<f64>> {
        let reply = self.call(CommandId::ZSCORE, vec![key.to_vec(), member.to_vec()])?;
        let (bytes, is_nil) = as_bulk_nilable(CommandId::ZSCORE, reply)?;
        if is_nil {
            return Ok(None);
        }
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .map(Some)
            .ok_or_else(|| RedisError::ReplyMismatch("ZSCORE: malformed float bulk".into()))
    }

    pub fn zincrby(&mut self, key: &[u8], increment: f64, member: &[u8]) -> RedisResult<f64> {
        as_float_bulk(
            CommandId::ZINCRBY,
            self.call(CommandId::ZINCRBY, vec![key.to_vec(), float_arg(increment), member.to_vec()])?,
        )
    }

    pub fn zrem(&mut self, key: &[u8], member: &[u8]) -> RedisResult<i64> {
        as_integer(CommandId::ZREM, self.call(CommandId::ZREM, vec![key.to_vec(), member.to_vec()])?)
    }

    pub fn zrem_many(&mut self, key: &[u8], members: &[Vec<u8>]) -> RedisResult<i64> {
        let mut args = vec![key.to_vec()];
        args.extend_from_slice(members);
        as_integer(CommandId::ZREM, self.call(CommandId::ZREM, args)?)
    }

    pub fn zcount(&mut self, key: &[u8], min: &str, max: &str) -> RedisResult<i64> {
        as_integer(CommandId::ZCOUNT, self.call(CommandId::ZCOUNT, vec![key.to_vec(), s(min), s(max)])?)
    }

    pub fn zremrangebyrank(&mut self, key: &[u8], start: i64, stop: i64) -> RedisResult<i64> {
        as_integer(
            CommandId::ZREMRANGEBYRANK,
            self.call(CommandId::ZREMRANGEBYRANK, vec![key.to_vec(), int_arg(start), int_arg(stop)])?,
        )
    }

    pub fn zremrangebyscore(&mut self, key: &[u8], min: &str, max: &str) -> RedisResult<i64> {
        as_integer(
            CommandId::ZREMRANGEBYSCORE,
            self.call(CommandId::ZREMRANGEBYSCORE, vec![key.to_vec(), s(min), s(max)])?,
        )
    }

    fn zrange_impl(&mut self, id: CommandId, key: &[u8], start: i64, stop: i64, withscores: bool) -> RedisResult<Vec<Vec<u8>>> {
        let mut args = vec![key.to_vec(), int_arg(start), int_arg(stop)];
        if withscores {
            args.push(s("WITHSCORES"));
        }
        Ok(flatten_multi_bulk(as_multi_bulk(id, self.call(id, args)?)?))
    }

    pub fn zrange(&mut self, key: &[u8], start: i64, stop: i64, withscores: bool) -> RedisResult<Vec<Vec<u8>>> {
        self.zrange_impl(CommandId::ZRANGE, key, start, stop, withscores)
    }

    pub fn zrevrange(&mut self, key: &[u8], start: i64, stop: i64, withscores: bool) -> RedisResult<Vec<Vec<u8>>> {
        self.zrange_impl(CommandId::ZREVRANGE, key, start, stop, withscores)
    }

    fn zrangebyscore_impl(
        &mut self,
        id: CommandId,
        key: &[u8],
        min: &str,
        max: &str,
        withscores: bool,
        limit: Option<(i64, i64)>,
    ) -> RedisResult<Vec<Vec<u8>>> {
        let mut args = vec![key.to_vec(), s(min), s(max)];
        if withscores {
            args.push(s("WITHSCORES"));
        }
        if let Some((offset, count)) = limit {
            args.push(s("LIMIT"));
            args.push(int_arg(offset));
            args.push(int_arg(count));
        }
        Ok(flatten_multi_bulk(as_multi_bulk(id, self.call(id, args)?)?))
    }

    pub fn zrangebyscore(
        &mut self,
        key: &[u8],
        min: &str,
        max: &str,
        withscores: bool,
        limit: Option<(i64, i64)>,
    ) -> RedisResult<Vec<Vec<u8>>> {
        self.zrangebyscore_impl(CommandId::ZRANGEBYSCORE, key, min, max, withscores, limit)
    }

    pub fn zrevrangebyscore(
        &mut self,
        key: &[u8],
        max: &str,
        min: &str,
        withscores: bool,
        limit: Option<(i64, i64)>,
    ) -> RedisResult<Vec<Vec<u8>>> {
        self.zrangebyscore_impl(CommandId::ZREVRANGEBYSCORE, key, max, min, withscores, limit)
    }

    fn zrank_impl(&mut self, id: CommandId, key: &[u8], member: &[u8]) -> RedisResult<Option<i64>> {
        let reply = self.call(id, vec![key.to_vec(), member.to_vec()])?;
        match reply {
            Reply::Integer(i) => Ok(Some(i)),
            Reply::Bulk(None) => Ok(None),
            other => Err(RedisError::ReplyMismatch(format!("{id:?}: unexpected reply {other:?}"))),
        }
    }

    pub fn zrank(&mut self, key: &[u8], member: &[u8]) -> RedisResult<Option<i64>> {
        self.zrank_impl(CommandId::ZRANK, key, member)
    }

    pub fn zrevrank(&mut self, key: &[u8], member: &[u8]) -> RedisResult<Option<i64>> {
        self.zrank_impl(CommandId::ZREVRANK, key, member)
    }

    // ---- Transactions (delegate to the connection's state machine) --------

    pub fn multi(&mut self) -> RedisResult<()> {
        self.conn.multi()
    }

    pub fn watch(&mut self, keys: &[Vec<u8>]) -> RedisResult<()> {
        self.conn.watch(keys)
    }

    pub fn unwatch(&mut self) -> RedisResult<()> {
        self.conn.unwatch()
    }

    pub fn add_command(&mut self, id: CommandId, args: Vec<Vec<u8>>) -> RedisResult<()> {
        self.conn.add_command(id, args)
    }

    pub fn exec(&mut self) -> RedisResult<Vec<Reply>> {
        self.conn.exec()
    }

    pub fn discard(&mut self) -> RedisResult<()> {
        self.conn.discard()
    }

    pub fn in_transaction(&self) -> bool {
        self.conn.in_transaction()
    }

    /// Access to the underlying connection, for pipeline execution and
    /// anything this façade does not wrap.
    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
