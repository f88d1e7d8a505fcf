// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Drives the crate's testable invariants without a network: the wire
//! codec's round-trip and totality properties, the nil/empty distinction,
//! and the connection pool's capacity bound under churn.

use redis_client_rs::{
    buffer::{ReadBuffer, TimedSource},
    codec::{encode_request, parse_reply},
    error::{RedisError, RedisResult},
    pool::{ConnectionPool, Locality},
    reply::Reply,
};

struct FixedSource {
    data: Vec<u8>,
    pos: usize,
}

impl FixedSource {
    fn new(bytes: &[u8]) -> Self {
        Self { data: bytes.to_vec(), pos: 0 }
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

/// Encodes a request, re-parses it in request mode (a multi-bulk of plain
/// bulks, same grammar as a `MultiBulk` reply), and checks the tokens
/// decode back to exactly what was encoded, for several representative
/// inputs including binary-unsafe-looking bytes.
#[test]
fn encoding_round_trip_holds_for_varied_argument_shapes() {
    let cases: Vec<Vec<&[u8]>> = vec![
        vec![b"SET", b"foo", b"bar"],
        vec![b"GET", b""],
        vec![b"SET", b"key", b"\r\n\x00binary\xff"],
        vec![b"PING"],
        vec![b"MSET", b"a", b"1", b"b", b"2", b"c", b"3"],
    ];

    for tokens in cases {
        let frame = encode_request(tokens.clone());
        let mut buf = ReadBuffer::new();
        let mut src = FixedSource::new(&frame);
        let parsed = parse_reply(&mut buf, &mut src, 1_000, false).expect("request frame parses as multi-bulk");
        let Reply::MultiBulk(Some(items)) = parsed else {
            panic!("expected MultiBulk, got {parsed:?}");
        };
        let decoded: Vec<Vec<u8>> = items.into_iter().map(|i| i.expect("no nil tokens")).collect();
        let expected: Vec<Vec<u8>> = tokens.into_iter().map(|t| t.to_vec()).collect();
        assert_eq!(decoded, expected);
    }
}

/// For every well-formed reply production, exactly one `Reply` comes out,
/// and whatever bytes follow it stay in the buffer untouched.
#[test]
fn reply_parse_totality_leaves_trailing_bytes_untouched() {
    let productions: &[(&[u8], Reply)] = &[
        (b"+OK\r\n", Reply::Status("OK".into())),
        (b"-ERR oops\r\n", Reply::Error("ERR oops".into())),
        (b":42\r\n", Reply::Integer(42)),
        (b"$-1\r\n", Reply::Bulk(None)),
        (b"$5\r\nhello\r\n", Reply::Bulk(Some(b"hello".to_vec()))),
        (b"*-1\r\n", Reply::MultiBulk(None)),
        (b"*0\r\n", Reply::MultiBulk(Some(vec![]))),
    ];

    for (wire, expected) in productions {
        let mut framed = wire.to_vec();
        framed.extend_from_slice(b"+TRAILING\r\n");
        let mut buf = ReadBuffer::new();
        let mut src = FixedSource::new(&framed);
        let parsed = parse_reply(&mut buf, &mut src, 1_000, false).expect("well-formed production parses");
        assert_eq!(&parsed, expected);
        assert_eq!(buf.get_readable(), b"+TRAILING\r\n");
    }
}

/// `MultiBulk(None)` (nil) and `MultiBulk(Some(vec![]))` (empty) are
/// distinguishable both on the wire and as API-level values.
#[test]
fn nil_multi_bulk_is_distinguishable_from_empty_multi_bulk_on_the_wire() {
    let mut buf = ReadBuffer::new();
    let mut nil_src = FixedSource::new(b"*-1\r\n");
    let nil = parse_reply(&mut buf, &mut nil_src, 1_000, false).expect("nil parses");

    let mut buf2 = ReadBuffer::new();
    let mut empty_src = FixedSource::new(b"*0\r\n");
    let empty = parse_reply(&mut buf2, &mut empty_src, 1_000, false).expect("empty parses");

    assert_ne!(nil, empty);
    assert!(nil.is_nil_multi_bulk());
    assert!(!empty.is_nil_multi_bulk());
}

/// The pool's free-list never exceeds its configured capacity, regardless
/// of how many more connections than that are checked out and returned.
#[test]
fn pool_free_list_never_exceeds_capacity_under_churn() {
    let capacity = 2;
    let pool = ConnectionPool::new("127.0.0.1", 1, 0, 10, capacity);

    let mut checked_out = Vec::new();
    for _ in 0..5 {
        checked_out.push(pool.get(Locality::NotThreadSpecific));
    }
    assert!(pool.idle_count() <= capacity);

    drop(checked_out);
    assert!(pool.idle_count() <= capacity);
    assert_eq!(pool.idle_count(), capacity);
}
