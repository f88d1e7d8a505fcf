// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Buffered stream: a growable read buffer with delimiter search and
//! fixed-length reads, backed by `bytes::BytesMut`.
//!
//! Consumed bytes are dropped from the front via `BytesMut`'s own
//! `advance`, rather than tracked by a separate cursor, and the buffer is
//! reallocated once it has drained to empty past [`COMPACT_THRESHOLD`] to
//! release memory back to the allocator.

use bytes::{Buf, BytesMut};

use crate::error::{RedisError, RedisResult};

/// Past this many idle bytes of capacity, an empty buffer is reallocated
/// instead of kept around.
const COMPACT_THRESHOLD: usize = 65_536;

/// Anything the buffer can pull more bytes from: one bounded, timed read.
pub trait TimedSource {
    /// Reads at least one byte into `buf`, blocking up to `timeout_ms`
    /// (negative means wait forever). Returns `Ok(0)` on clean EOF.
    fn read_some(&mut self, buf: &mut [u8], timeout_ms: i64) -> RedisResult<usize>;
}

/// A growable byte buffer with delimiter search and fixed-length reads.
#[derive(Debug, Default)]
pub struct ReadBuffer {
    buf: BytesMut,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// The currently buffered, unconsumed bytes.
    pub fn get_readable(&self) -> &[u8] {
        &self.buf
    }

    /// Ensures at least `min` more bytes of writable capacity.
    pub fn prepare(&mut self, min: usize) {
        self.buf.reserve(min);
    }

    /// Discards `n` bytes from the front without returning them (used to
    /// skip a trailing delimiter).
    fn skip(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Copies out and drops the first `n` bytes; reallocates if the buffer
    /// is now empty and was holding on to a large allocation.
    pub fn consume(&mut self, n: usize) -> Vec<u8> {
        let out = self.buf[..n].to_vec();
        self.buf.advance(n);
        self.maybe_compact();
        out
    }

    fn maybe_compact(&mut self) {
        if self.buf.is_empty() && self.buf.capacity() > COMPACT_THRESHOLD {
            self.buf = BytesMut::new();
        }
    }

    fn fill_once<S: TimedSource>(&mut self, src: &mut S, timeout_ms: i64) -> RedisResult<()> {
        self.prepare(4096);
        let start = self.buf.len();
        // SAFETY-free approach: grow with zeroed bytes, then read into the tail.
        self.buf.resize(start + 4096, 0);
        let n = src.read_some(&mut self.buf[start..], timeout_ms)?;
        self.buf.truncate(start + n);
        if n == 0 {
            return Err(RedisError::Io("connection closed by peer".into()));
        }
        Ok(())
    }

    /// Reads bytes from `src` until `delim` is found in the buffered data,
    /// then returns everything before it and drops the delimiter too.
    pub fn read_line<S: TimedSource>(
        &mut self,
        src: &mut S,
        delim: &[u8],
        timeout_ms: i64,
    ) -> RedisResult<Vec<u8>> {
        loop {
            if let Some(pos) = find_subslice(&self.buf, delim) {
                let line = self.consume(pos);
                self.skip(delim.len());
                self.maybe_compact();
                return Ok(line);
            }
            self.fill_once(src, timeout_ms)?;
        }
    }

    /// Reads exactly `n + delim.len()` bytes, returning the first `n` and
    /// discarding the trailing delimiter.
    pub fn read_exact<S: TimedSource>(
        &mut self,
        src: &mut S,
        n: usize,
        delim_len: usize,
        timeout_ms: i64,
    ) -> RedisResult<Vec<u8>> {
        let total = n + delim_len;
        while self.buf.len() < total {
            self.fill_once(src, timeout_ms)?;
        }
        let data = self.consume(n);
        self.skip(delim_len);
        self.maybe_compact();
        Ok(data)
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ChunkedSource {
        chunks: Vec<Vec<u8>>,
    }

    impl TimedSource for ChunkedSource {
        fn read_some(&mut self, buf: &mut [u8], _timeout_ms: i64) -> RedisResult<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn read_line_assembles_across_partial_reads() {
        let mut src = ChunkedSource {
            chunks: vec![b"OK\r".to_vec(), b"\nextra".to_vec()],
        };
        let mut rb = ReadBuffer::new();
        let line = rb.read_line(&mut src, b"\r\n", 1_000).expect("line");
        assert_eq!(line, b"OK");
        assert_eq!(rb.get_readable(), b"extra");
    }

    #[test]
    fn read_exact_leaves_remainder_in_buffer() {
        let mut src = ChunkedSource {
            chunks: vec![b"hello\r\nREST".to_vec()],
        };
        let mut rb = ReadBuffer::new();
        let data = rb.read_exact(&mut src, 5, 2, 1_000).expect("bulk body");
        assert_eq!(data, b"hello");
        assert_eq!(rb.get_readable(), b"REST");
    }
}
