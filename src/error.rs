// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed error surface for every layer below the client façades.
//!
//! The six kinds track what `last_error` should reflect: argument
//! validation never touches the socket, connect/IO/protocol errors close
//! it, and reply mismatches / server error replies leave it open.

use thiserror::Error;

/// Every failure mode the wire client can produce.
#[derive(Debug, Error, Clone)]
pub enum RedisError {
    /// Caller-side precondition violated (arity, null output slot, ...).
    #[error("{0}")]
    Validation(String),

    /// DNS resolution, connect, or connect-timeout failure.
    #[error("connect error: {0}")]
    Connect(String),

    /// I/O failed mid-frame, or the peer closed the connection.
    #[error("io error: {0}")]
    Io(String),

    /// The byte stream did not match the reply grammar.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The parsed reply kind did not match `CommandInfo::expected_reply_kind`.
    #[error("reply type mismatch: {0}")]
    ReplyMismatch(String),

    /// The server itself returned an error reply (`-...`).
    #[error("{0}")]
    Server(String),
}

impl RedisError {
    /// Whether observing this error must close the connection.
    ///
    /// Only [`RedisError::ReplyMismatch`] and [`RedisError::Server`] are
    /// survivable; every other kind leaves the connection in a state the
    /// protocol can no longer trust.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RedisError::ReplyMismatch(_) | RedisError::Server(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        RedisError::Validation(msg.into())
    }

    pub fn tag_host(self, host: &str, port: u16) -> Self {
        let tagged = format!("[{host}:{port}] {self}");
        match self {
            RedisError::Validation(_) => RedisError::Validation(tagged),
            RedisError::Connect(_) => RedisError::Connect(tagged),
            RedisError::Io(_) => RedisError::Io(tagged),
            RedisError::Protocol(_) => RedisError::Protocol(tagged),
            RedisError::ReplyMismatch(_) => RedisError::ReplyMismatch(tagged),
            RedisError::Server(_) => RedisError::Server(tagged),
        }
    }
}

impl From<std::io::Error> for RedisError {
    fn from(e: std::io::Error) -> Self {
        RedisError::Io(e.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type RedisResult<T> = Result<T, RedisError>;
