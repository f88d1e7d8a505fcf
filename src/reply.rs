// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Reply value model: a sum type for the five wire reply kinds, with
//! recursion into nested multi-bulks for transaction results.
//!
//! This is a plain algebraic data type with recursion via `Box`, and
//! predicates (`is_nil_bulk`, `is_status_ok`) are pattern matches rather
//! than methods on a mutable tagged union.

use crate::registry::ReplyKind;

/// A single parsed server reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+...` — a one-line status reply.
    Status(String),
    /// `-...` — a one-line error reply. Never closes the connection.
    Error(String),
    /// `:...` — a signed 64-bit integer reply.
    Integer(i64),
    /// `$...` — a binary-safe byte string, or `None` for the nil bulk
    /// (`$-1\r\n`). `Some(vec![])` is the empty-but-non-nil bulk (`$0\r\n`).
    Bulk(Option<Vec<u8>>),
    /// `*...` of plain bulks — `None` for the nil multi-bulk (`*-1\r\n`).
    MultiBulk(Option<Vec<Option<Vec<u8>>>>),
    /// `*...` whose children may be any reply kind, recursively. Used for
    /// `EXEC` results and other commands whose expected kind is
    /// `ReplyKind::Depends`. `None` is the nil special-multi-bulk.
    SpecialMultiBulk(Option<Vec<Reply>>),
}

impl Reply {
    /// The `ReplyKind` this value was parsed as, for mismatch checking.
    pub fn kind(&self) -> ReplyKind {
        match self {
            Reply::Status(_) => ReplyKind::Status,
            Reply::Error(_) => ReplyKind::Error,
            Reply::Integer(_) => ReplyKind::Integer,
            Reply::Bulk(_) => ReplyKind::Bulk,
            Reply::MultiBulk(_) => ReplyKind::MultiBulk,
            Reply::SpecialMultiBulk(_) => ReplyKind::SpecialMultiBulk,
        }
    }

    /// True for `Status("OK")`.
    pub fn is_status_ok(&self) -> bool {
        matches!(self, Reply::Status(s) if s == "OK")
    }

    /// True for `Status("PONG")`.
    pub fn is_status_pong(&self) -> bool {
        matches!(self, Reply::Status(s) if s == "PONG")
    }

    /// True for the nil bulk (`Bulk(None)`).
    pub fn is_nil_bulk(&self) -> bool {
        matches!(self, Reply::Bulk(None))
    }

    /// True for the nil multi-bulk (`MultiBulk(None)`).
    pub fn is_nil_multi_bulk(&self) -> bool {
        matches!(self, Reply::MultiBulk(None))
    }

    /// The server's error text, if this is an `Error` reply.
    pub fn as_error(&self) -> Option<&str> {
        match self {
            Reply::Error(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Whether every child of a `SpecialMultiBulk` is a plain `Bulk`,
    /// making it losslessly convertible to a `MultiBulk`.
    fn is_convertible_to_multi_bulk(children: &[Reply]) -> bool {
        children.iter().all(|r| matches!(r, Reply::Bulk(_)))
    }

    /// Downgrades a `SpecialMultiBulk` of pure `Bulk`s into a `MultiBulk`,
    /// in place. No-op (returns `self` unchanged) if any child is not a
    /// `Bulk`, or if `self` is not a `SpecialMultiBulk`.
    pub fn downgrade_special_multi_bulk(self) -> Reply {
        match self {
            Reply::SpecialMultiBulk(Some(children))
                if Self::is_convertible_to_multi_bulk(&children) =>
            {
                let flattened = children
                    .into_iter()
                    .map(|r| match r {
                        Reply::Bulk(b) => b,
                        _ => unreachable!("checked by is_convertible_to_multi_bulk"),
                    })
                    .collect();
                Reply::MultiBulk(Some(flattened))
            },
            other => other,
        }
    }
}
