// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire codec & parser: serializes request frames and parses reply
//! frames, including recursion into nested multi-bulks.
//!
//! Reply-type enforcement and the transaction-mode flip (which need the
//! command registry and connection state) live in [`crate::connection`];
//! this module only knows the wire grammar itself.

use crate::{
    buffer::{ReadBuffer, TimedSource},
    error::{RedisError, RedisResult},
    reply::Reply,
};

const CRLF: &[u8] = b"\r\n";

/// Encodes a request as a multi-bulk frame: `*<count>\r\n` followed by a
/// `$<len>\r\n<bytes>\r\n` bulk per token (command name first). Arguments
/// are byte-transparent.
pub fn encode_request<I, T>(tokens: I) -> Vec<u8>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let tokens: Vec<T> = tokens.into_iter().collect();
    let mut out = Vec::with_capacity(32 * tokens.len() + 16);
    out.extend_from_slice(format!("*{}\r\n", tokens.len()).as_bytes());
    for token in &tokens {
        let bytes = token.as_ref();
        out.extend_from_slice(format!("${}\r\n", bytes.len()).as_bytes());
        out.extend_from_slice(bytes);
        out.extend_from_slice(CRLF);
    }
    out
}

fn parse_integer(bytes: &[u8]) -> RedisResult<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| RedisError::Protocol(format!("malformed integer: {:?}", String::from_utf8_lossy(bytes))))
}

/// Parses one reply from `src` (via `buf`). `special` selects whether a
/// top-level multi-bulk is parsed as a `MultiBulk` of plain bulks (the
/// default) or as a `SpecialMultiBulk` whose children may be any reply kind
/// recursively (used for `EXEC` results and commands whose expected reply
/// is `Depends`).
pub fn parse_reply<S: TimedSource>(
    buf: &mut ReadBuffer,
    src: &mut S,
    timeout_ms: i64,
    special: bool,
) -> RedisResult<Reply> {
    let line = buf.read_line(src, CRLF, timeout_ms)?;
    let (&tag, rest) = line
        .split_first()
        .ok_or_else(|| RedisError::Protocol("empty reply line".into()))?;

    match tag {
        b'+' => Ok(Reply::Status(String::from_utf8_lossy(rest).into_owned())),
        b'-' => Ok(Reply::Error(String::from_utf8_lossy(rest).into_owned())),
        b':' => Ok(Reply::Integer(parse_integer(rest)?)),
        b'$' => parse_bulk_body(buf, src, timeout_ms, rest).map(Reply::Bulk),
        b'*' => parse_multi_bulk(buf, src, timeout_ms, rest, special),
        other => Err(RedisError::Protocol(format!(
            "unexpected reply first byte: {:?}",
            other as char
        ))),
    }
}

fn parse_bulk_body<S: TimedSource>(
    buf: &mut ReadBuffer,
    src: &mut S,
    timeout_ms: i64,
    len_bytes: &[u8],
) -> RedisResult<Option<Vec<u8>>> {
    let len = parse_integer(len_bytes)?;
    match len {
        -1 => Ok(None),
        l if l >= 0 => Ok(Some(buf.read_exact(src, l as usize, CRLF.len(), timeout_ms)?)),
        other => Err(RedisError::Protocol(format!("negative bulk length: {other}"))),
    }
}

fn parse_multi_bulk<S: TimedSource>(
    buf: &mut ReadBuffer,
    src: &mut S,
    timeout_ms: i64,
    len_bytes: &[u8],
    special: bool,
) -> RedisResult<Reply> {
    let len = parse_integer(len_bytes)?;
    match len {
        -1 if special => Ok(Reply::SpecialMultiBulk(None)),
        -1 => Ok(Reply::MultiBulk(None)),
        l if l >= 0 && special => {
            let mut children = Vec::with_capacity(l as usize);
            for _ in 0..l {
                children.push(parse_reply(buf, src, timeout_ms, true)?);
            }
            Ok(Reply::SpecialMultiBulk(Some(children)))
        },
        l if l >= 0 => {
            let mut items = Vec::with_capacity(l as usize);
            for _ in 0..l {
                let inner = buf.read_line(src, CRLF, timeout_ms)?;
                let (&tag, rest) = inner
                    .split_first()
                    .ok_or_else(|| RedisError::Protocol("empty multi-bulk item".into()))?;
                if tag != b'$' {
                    return Err(RedisError::Protocol(format!(
                        "expected bulk inside multi-bulk, got {:?}",
                        tag as char
                    )));
                }
                items.push(parse_bulk_body(buf, src, timeout_ms, rest)?);
            }
            Ok(Reply::MultiBulk(Some(items)))
        },
        other => Err(RedisError::Protocol(format!("negative multi-bulk length: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TimedSource;

    struct FixedSource {
        data: Vec<u8>,
        pos: usize,
    }

    impl FixedSource {
        fn new(s: &[u8]) -> Self {
            Self { data: s.to_vec(), pos: 0 }
        }
    }

    impl TimedSource for FixedSource {
        fn read_some(&mut self, out: &mut [u8], _timeout_ms: i64) -> RedisResult<usize> {
            let remaining = &self.data[self.pos..];
            if remaining.is_empty() {
                return Err(RedisError::Io("eof".into()));
            }
            let n = remaining.len().min(out.len());
            out[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            Ok(n)
        }
    }

    fn parse_all(wire: &[u8], special: bool) -> Reply {
        let mut src = FixedSource::new(wire);
        let mut buf = ReadBuffer::new();
        parse_reply(&mut buf, &mut src, 1_000, special).expect("parse")
    }

    #[test]
    fn encodes_set_foo_bar() {
        let frame = encode_request([b"SET".as_slice(), b"foo", b"bar"]);
        assert_eq!(frame, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
    }

    #[test]
    fn parses_status() {
        assert_eq!(parse_all(b"+OK\r\n", false), Reply::Status("OK".into()));
    }

    #[test]
    fn parses_error() {
        assert_eq!(parse_all(b"-ERR bad\r\n", false), Reply::Error("ERR bad".into()));
    }

    #[test]
    fn parses_integer_at_i64_max() {
        assert_eq!(
            parse_all(b":9223372036854775807\r\n", false),
            Reply::Integer(i64::MAX)
        );
    }

    #[test]
    fn parses_nil_bulk() {
        assert_eq!(parse_all(b"$-1\r\n", false), Reply::Bulk(None));
    }

    #[test]
    fn parses_empty_non_nil_bulk() {
        assert_eq!(parse_all(b"$0\r\n\r\n", false), Reply::Bulk(Some(vec![])));
    }

    #[test]
    fn parses_plain_multi_bulk() {
        let wire = b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
        assert_eq!(
            parse_all(wire, false),
            Reply::MultiBulk(Some(vec![Some(b"foo".to_vec()), Some(b"bar".to_vec())]))
        );
    }

    #[test]
    fn parses_nested_special_multi_bulk() {
        let wire = b"*2\r\n+OK\r\n$1\r\n1\r\n";
        let parsed = parse_all(wire, true);
        assert_eq!(
            parsed,
            Reply::SpecialMultiBulk(Some(vec![
                Reply::Status("OK".into()),
                Reply::Bulk(Some(b"1".to_vec())),
            ]))
        );
    }

    #[test]
    fn trailing_bytes_remain_in_buffer() {
        let mut src = FixedSource::new(b"+OK\r\n$3\r\nfoo\r\n");
        let mut buf = ReadBuffer::new();
        let first = parse_reply(&mut buf, &mut src, 1_000, false).expect("first");
        assert_eq!(first, Reply::Status("OK".into()));
        assert_eq!(buf.get_readable(), b"$3\r\nfoo\r\n");
    }
}
