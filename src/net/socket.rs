// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Timed connect/read/write/peek over `std::net::TcpStream`, backstopped by
//! `socket2` for the operations `std::net` does not expose directly
//! (timed connect, `MSG_PEEK`, `TCP_NODELAY`).
//!
//! Connect uses `socket2::Socket::connect_timeout`, which performs a
//! poll-until-writable wait bounded by the caller's timeout in one call.

use std::{
    net::{SocketAddr, TcpStream},
    sync::Once,
    time::{Duration, Instant},
};

use socket2::Socket;

use crate::{
    buffer::TimedSource,
    error::{RedisError, RedisResult},
    net::dns,
};

/// How often [`Socket::is_open_slow`] is allowed to actually peek the
/// socket, per connection.
pub const SLOW_CHECK_INTERVAL: Duration = Duration::from_secs(180);

static IGNORE_SIGPIPE: Once = Once::new();

/// Ignores `SIGPIPE` process-wide, once, so that writing to a peer-closed
/// socket surfaces as an `EPIPE` `io::Error` instead of terminating the
/// process. A no-op outside unix targets.
fn ignore_sigpipe_once() {
    IGNORE_SIGPIPE.call_once(|| {
        #[cfg(unix)]
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        }
    });
}

/// A single TCP connection to a backend, plus the bookkeeping needed for
/// the cheap liveness checks described in C1/C6.
pub struct ConnSocket {
    stream: TcpStream,
    socket2: Socket,
    last_slow_check: Option<Instant>,
}

fn to_duration(timeout_ms: i64) -> Option<Duration> {
    if timeout_ms < 0 {
        None
    } else {
        Some(Duration::from_millis(timeout_ms as u64))
    }
}

impl ConnSocket {
    /// Resolves `host:port` (through the DNS cache) and connects with the
    /// given millisecond timeout (negative = block until connected).
    pub fn connect(host: &str, port: u16, timeout_ms: i64) -> RedisResult<Self> {
        ignore_sigpipe_once();

        let addr: SocketAddr = dns::resolve(host, port)
            .map_err(|e| RedisError::Connect(format!("{host}:{port}: {e}")))?;

        let domain = socket2::Domain::for_address(addr);
        let sock = Socket::new(domain, socket2::Type::STREAM, Some(socket2::Protocol::TCP))
            .map_err(|e| RedisError::Connect(e.to_string()))?;

        let timeout = to_duration(timeout_ms).unwrap_or(Duration::from_secs(3600));
        sock.connect_timeout(&addr.into(), timeout).map_err(|e| {
            dns::evict(host, port);
            RedisError::Connect(format!("{host}:{port}: {e}"))
        })?;
        sock.set_nodelay(true).ok();

        let stream: TcpStream = sock.try_clone().map_err(|e| RedisError::Connect(e.to_string()))?.into();
        stream.set_nonblocking(false).map_err(RedisError::from)?;

        Ok(Self { stream, socket2: sock, last_slow_check: None })
    }

    fn set_read_timeout(&self, timeout_ms: i64) -> RedisResult<()> {
        self.stream.set_read_timeout(to_duration(timeout_ms)).map_err(RedisError::from)
    }

    fn set_write_timeout(&self, timeout_ms: i64) -> RedisResult<()> {
        self.stream.set_write_timeout(to_duration(timeout_ms)).map_err(RedisError::from)
    }

    /// Writes the whole buffer, retrying on `WouldBlock`/`Interrupted`
    /// until `timeout_ms` elapses.
    pub fn write_all(&mut self, bytes: &[u8], timeout_ms: i64) -> RedisResult<()> {
        use std::io::Write;
        self.set_write_timeout(timeout_ms)?;
        self.stream.write_all(bytes).map_err(RedisError::from)
    }

    /// Cheap liveness check: the OS-level socket error state, no I/O.
    pub fn is_open_fast(&self) -> bool {
        matches!(self.socket2.take_error(), Ok(None))
    }

    /// Expensive liveness check: peeks for EOF. Only actually performed at
    /// most once per [`SLOW_CHECK_INTERVAL`]; in between it optimistically
    /// reports open.
    pub fn is_open_slow(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_slow_check {
            if now.duration_since(last) < SLOW_CHECK_INTERVAL {
                return true;
            }
        }
        self.last_slow_check = Some(now);
        if !self.is_open_fast() {
            return false;
        }
        let mut buf = [0u8; 1];
        match self.socket2.peek(&mut buf) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        }
    }

    /// Bytes readable without blocking, via `FIONREAD`. Returns `0` if the
    /// platform call fails (treated as "nothing pending") and on non-unix
    /// targets, where `FIONREAD` isn't wired up here.
    #[cfg(unix)]
    pub fn available_bytes(&self) -> usize {
        use std::os::unix::io::AsRawFd;
        let mut n: libc::c_int = 0;
        let rc = unsafe { libc::ioctl(self.stream.as_raw_fd(), libc::FIONREAD, &mut n as *mut libc::c_int) };
        if rc == 0 && n >= 0 { n as usize } else { 0 }
    }

    #[cfg(not(unix))]
    pub fn available_bytes(&self) -> usize {
        0
    }
}

impl TimedSource for ConnSocket {
    fn read_some(&mut self, buf: &mut [u8], timeout_ms: i64) -> RedisResult<usize> {
        use std::io::Read;
        self.set_read_timeout(timeout_ms)?;
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(RedisError::Io(format!("read timed out after {timeout_ms}ms")))
            },
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => self.read_some(buf, timeout_ms),
            Err(e) => Err(RedisError::from(e)),
        }
    }
}
