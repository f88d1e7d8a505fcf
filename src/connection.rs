// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connection state machine: connect, database reselection, the
//! blocking-mode overlay, transaction-mode tracking, and pipelined
//! execution, layered on the wire codec and socket primitives.

use std::time::Instant;

use tracing::{debug, warn};

use crate::{
    buffer::ReadBuffer,
    codec::{encode_request, parse_reply},
    error::{RedisError, RedisResult},
    net::socket::ConnSocket,
    registry::{self, CommandId, ReplyKind},
    reply::Reply,
};

/// Three-valued outcome of [`Connection::assure_connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    AlreadyOpen,
    NewlyOpened,
}

/// One command queued inside a `MULTI`/`EXEC` block.
struct QueuedCommand {
    id: CommandId,
    args: Vec<Vec<u8>>,
}

/// A single, single-threaded connection to one backend.
pub struct Connection {
    host: String,
    port: u16,
    timeout_ms: i64,
    db_index: i64,

    socket: Option<ConnSocket>,
    read_buf: ReadBuffer,
    last_error: Option<RedisError>,

    in_transaction: bool,
    queued: Vec<QueuedCommand>,
    db_index_dirty: bool,
}

impl Connection {
    pub fn new(host: impl Into<String>, port: u16, db_index: i64, timeout_ms: i64) -> Self {
        Self {
            host: host.into(),
            port,
            timeout_ms,
            db_index,
            socket: None,
            read_buf: ReadBuffer::new(),
            last_error: None,
            in_transaction: false,
            queued: Vec::new(),
            db_index_dirty: db_index != 0,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn last_error(&self) -> Option<&RedisError> {
        self.last_error.as_ref()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Fast check always; the expensive peek at most once per 180s
    /// (delegated to [`ConnSocket::is_open_slow`]).
    pub fn is_open(&mut self) -> bool {
        match &mut self.socket {
            Some(sock) => sock.is_open_fast() && sock.is_open_slow(Instant::now()),
            None => false,
        }
    }

    /// Closes the socket and resets per-connection session state. Called
    /// on any fatal I/O/protocol error.
    fn close(&mut self) {
        self.socket = None;
        self.in_transaction = false;
        self.queued.clear();
    }

    /// Ensures the socket is open, transparently reconnecting (and
    /// reselecting the database) if needed.
    pub fn assure_connect(&mut self) -> RedisResult<ConnectOutcome> {
        if self.socket.is_some() && self.is_open() {
            return Ok(ConnectOutcome::AlreadyOpen);
        }

        self.close();
        debug!(host = %self.host, port = self.port, "connecting");
        let sock = ConnSocket::connect(&self.host, self.port, self.timeout_ms)
            .map_err(|e| e.tag_host(&self.host, self.port))?;
        self.socket = Some(sock);
        self.db_index_dirty = self.db_index != 0;

        if self.db_index_dirty {
            self.select_internal(self.db_index)?;
            self.db_index_dirty = false;
        }

        Ok(ConnectOutcome::NewlyOpened)
    }

    /// Issues `SELECT` directly, bypassing the public command surface
    /// (used internally for reconnect reselection).
    fn select_internal(&mut self, index: i64) -> RedisResult<()> {
        let reply = self.send_and_parse(CommandId::SELECT, &[index.to_string().into_bytes()], false)?;
        if !reply.is_status_ok() {
            let err = RedisError::Protocol(format!("SELECT {index} failed: {reply:?}"));
            self.last_error = Some(err.clone());
            self.close();
            return Err(err);
        }
        Ok(())
    }

    fn effective_timeout(&self, blocking: bool) -> i64 {
        if blocking { -1 } else { self.timeout_ms }
    }

    fn expected_kind(&self, id: CommandId) -> RedisResult<ReplyKind> {
        let info = registry::info(id).ok_or_else(|| RedisError::validation("unknown command"))?;
        if self.in_transaction && !matches!(id, CommandId::MULTI | CommandId::EXEC | CommandId::DISCARD) {
            Ok(ReplyKind::Status)
        } else {
            Ok(info.reply_kind)
        }
    }

    fn check_reply_kind(&self, id: CommandId, reply: &Reply) -> RedisResult<()> {
        if let Reply::Error(text) = reply {
            // Server errors are recorded by the caller; never fatal here.
            return Err(RedisError::Server(text.clone()));
        }
        let expected = self.expected_kind(id)?;
        if expected == ReplyKind::Depends || expected == ReplyKind::None {
            return Ok(());
        }
        if reply.kind() != expected {
            return Err(RedisError::ReplyMismatch(format!(
                "command {id:?} expected {expected:?}, got {:?}",
                reply.kind()
            )));
        }
        Ok(())
    }

    /// Transitions `in_transaction` based on the observed reply: flips
    /// happen on replies, never on request emission.
    fn apply_transaction_flip(&mut self, id: CommandId, reply: &Reply) {
        match id {
            CommandId::MULTI if reply.is_status_ok() => self.in_transaction = true,
            CommandId::DISCARD if reply.is_status_ok() => {
                self.in_transaction = false;
                self.queued.clear();
            },
            CommandId::EXEC => {
                self.in_transaction = false;
                self.queued.clear();
            },
            _ => {},
        }
    }

    /// Validates arity, encodes, sends, and parses exactly one reply.
    /// `blocking` disables the read timeout for this call only.
    pub fn exec_command(
        &mut self,
        id: CommandId,
        args: &[Vec<u8>],
        blocking: bool,
    ) -> RedisResult<Reply> {
        let info = registry::info(id)
            .ok_or_else(|| RedisError::validation(format!("unknown command id {id:?}")))?;
        if !info.arity.accepts(args.len()) {
            return Err(RedisError::validation(format!(
                "{} expects arity {:?}, got {} args",
                info.name,
                info.arity,
                args.len()
            )));
        }

        self.assure_connect()?;
        let reply = self.send_and_parse(id, args, blocking)?;
        self.apply_transaction_flip(id, &reply);
        if let Err(e) = self.check_reply_kind(id, &reply) {
            self.last_error = Some(e.clone());
            if e.is_fatal() {
                self.close();
            }
            return Err(e);
        }
        Ok(reply)
    }

    fn send_and_parse(&mut self, id: CommandId, args: &[Vec<u8>], blocking: bool) -> RedisResult<Reply> {
        let info = registry::info(id)
            .ok_or_else(|| RedisError::validation(format!("unknown command id {id:?}")))?;
        let mut tokens: Vec<Vec<u8>> = Vec::with_capacity(args.len() + 1);
        tokens.push(info.name.as_bytes().to_vec());
        tokens.extend_from_slice(args);
        let frame = encode_request(tokens);

        let special = self.expected_kind(id)? == ReplyKind::SpecialMultiBulk;
        let timeout = self.effective_timeout(blocking);

        let socket = self.socket.as_mut().ok_or_else(|| RedisError::Io("not connected".into()))?;
        if let Err(e) = socket.write_all(&frame, timeout) {
            warn!(host = %self.host, port = self.port, error = %e, "write failed");
            self.last_error = Some(e.clone().tag_host(&self.host, self.port));
            self.close();
            return Err(e);
        }

        let socket = self.socket.as_mut().ok_or_else(|| RedisError::Io("not connected".into()))?;
        match parse_reply(&mut self.read_buf, socket, timeout, special) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(host = %self.host, port = self.port, error = %e, "read failed");
                self.last_error = Some(e.clone().tag_host(&self.host, self.port));
                self.close();
                Err(e)
            },
        }
    }

    /// Writes all `commands` back-to-back, then reads all replies
    /// back-to-back. If the peer closes mid-pipeline, every not-yet-matched
    /// request fails (the whole batch fails atomically).
    pub fn exec_pipeline(
        &mut self,
        commands: &[(CommandId, Vec<Vec<u8>>)],
    ) -> RedisResult<Vec<RedisResult<Reply>>> {
        self.assure_connect()?;

        for (id, args) in commands {
            let info = registry::info(*id)
                .ok_or_else(|| RedisError::validation(format!("unknown command id {id:?}")))?;
            if !info.arity.accepts(args.len()) {
                return Err(RedisError::validation(format!(
                    "{} expects arity {:?}, got {} args",
                    info.name,
                    info.arity,
                    args.len()
                )));
            }
        }

        for (id, args) in commands {
            if !self.is_open() {
                self.close();
                let err = RedisError::Io("connection closed mid-pipeline (write phase)".into());
                return Ok(commands.iter().map(|_| Err(err.clone())).collect());
            }
            let info = registry::info(*id).expect("validated above");
            let mut tokens: Vec<Vec<u8>> = Vec::with_capacity(args.len() + 1);
            tokens.push(info.name.as_bytes().to_vec());
            tokens.extend_from_slice(args);
            let frame = encode_request(tokens);
            let socket = self.socket.as_mut().expect("assured above");
            if let Err(e) = socket.write_all(&frame, self.timeout_ms) {
                self.last_error = Some(e.clone().tag_host(&self.host, self.port));
                self.close();
                return Ok(commands.iter().map(|_| Err(e.clone())).collect());
            }
        }

        let mut results = Vec::with_capacity(commands.len());
        for (id, _) in commands {
            if !self.is_open() {
                let err = RedisError::Io("connection closed mid-pipeline (read phase)".into());
                self.close();
                results.push(Err(err));
                continue;
            }
            let special = self.expected_kind(*id)? == ReplyKind::SpecialMultiBulk;
            let socket = match self.socket.as_mut() {
                Some(s) => s,
                None => {
                    results.push(Err(RedisError::Io("connection closed mid-pipeline".into())));
                    continue;
                },
            };
            match parse_reply(&mut self.read_buf, socket, self.timeout_ms, special) {
                Ok(reply) => {
                    self.apply_transaction_flip(*id, &reply);
                    results.push(self.check_reply_kind(*id, &reply).map(|_| reply));
                },
                Err(e) => {
                    self.last_error = Some(e.clone().tag_host(&self.host, self.port));
                    self.close();
                    results.push(Err(e));
                },
            }
        }

        Ok(results)
    }

    // ---- Transaction helpers ------------------------------------------------

    pub fn multi(&mut self) -> RedisResult<()> {
        self.exec_command(CommandId::MULTI, &[], false)?;
        Ok(())
    }

    pub fn watch(&mut self, keys: &[Vec<u8>]) -> RedisResult<()> {
        self.exec_command(CommandId::WATCH, keys, false)?;
        Ok(())
    }

    pub fn unwatch(&mut self) -> RedisResult<()> {
        self.exec_command(CommandId::UNWATCH, &[], false)?;
        Ok(())
    }

    /// Buffers `id`/`args` for the pending transaction after the server's
    /// queue acknowledgement (`QUEUED` status). Unlike the reference
    /// implementation's non-`format` overload — which always returns
    /// failure despite enqueuing successfully — this returns `Ok(())`
    /// whenever the enqueue itself succeeds; see `DESIGN.md`.
    pub fn add_command(&mut self, id: CommandId, args: Vec<Vec<u8>>) -> RedisResult<()> {
        if !self.in_transaction {
            return Err(RedisError::validation("add_command called outside MULTI"));
        }
        self.exec_command(id, &args, false)?;
        self.queued.push(QueuedCommand { id, args });
        Ok(())
    }

    /// Issues `EXEC`, distributes the `SpecialMultiBulk` results
    /// positionally back over the queued commands, and downgrades any
    /// pure-`Bulk` inner `SpecialMultiBulk` to a `MultiBulk`.
    pub fn exec(&mut self) -> RedisResult<Vec<Reply>> {
        let queued_len = self.queued.len();
        let reply = self.exec_command(CommandId::EXEC, &[], false)?;
        match reply {
            Reply::SpecialMultiBulk(Some(children)) => {
                if children.len() != queued_len {
                    return Err(RedisError::Protocol(format!(
                        "EXEC returned {} results for {queued_len} queued commands",
                        children.len()
                    )));
                }
                Ok(children.into_iter().map(Reply::downgrade_special_multi_bulk).collect())
            },
            Reply::SpecialMultiBulk(None) => {
                Err(RedisError::Server("EXEC aborted (watched key modified)".into()))
            },
            other => Err(RedisError::Protocol(format!("EXEC returned unexpected reply: {other:?}"))),
        }
    }

    pub fn discard(&mut self) -> RedisResult<()> {
        self.exec_command(CommandId::DISCARD, &[], false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connection_starts_closed() {
        let mut conn = Connection::new("127.0.0.1", 1, 0, 50);
        assert!(!conn.is_open());
        assert!(!conn.in_transaction());
    }

    #[test]
    fn transaction_flip_on_multi_and_exec() {
        let mut conn = Connection::new("127.0.0.1", 1, 0, 50);
        conn.apply_transaction_flip(CommandId::MULTI, &Reply::Status("OK".into()));
        assert!(conn.in_transaction());
        conn.apply_transaction_flip(CommandId::EXEC, &Reply::SpecialMultiBulk(Some(vec![])));
        assert!(!conn.in_transaction());
    }

    #[test]
    fn transaction_flip_on_discard() {
        let mut conn = Connection::new("127.0.0.1", 1, 0, 50);
        conn.in_transaction = true;
        conn.queued.push(QueuedCommand { id: CommandId::SET, args: vec![] });
        conn.apply_transaction_flip(CommandId::DISCARD, &Reply::Status("OK".into()));
        assert!(!conn.in_transaction());
        assert!(conn.queued.is_empty());
    }
}
