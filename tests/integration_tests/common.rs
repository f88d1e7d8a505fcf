// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A minimal fake server for driving the wire codec/connection stack over a
//! real loopback socket, without depending on an actual backend process.

use std::{
    io::{Read, Write},
    net::TcpListener,
    thread::JoinHandle,
};

/// A backend stand-in bound to an ephemeral loopback port. `script` is a
/// sequence of canned reply frames written back-to-back as each request is
/// read off the wire; requests themselves are drained but not inspected
/// unless the caller captures them via [`FakeServer::with_capture`].
pub struct FakeServer {
    pub port: u16,
    handle: Option<JoinHandle<Vec<u8>>>,
}

impl FakeServer {
    /// Starts a server that accepts one connection, then for each reply in
    /// `replies` reads whatever the client has sent so far (best-effort,
    /// non-blocking-ish via a short read) and writes the reply bytes.
    pub fn new(replies: Vec<&'static [u8]>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let port = listener.local_addr().expect("local addr").port();

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut captured = Vec::new();
            for reply in replies {
                let mut buf = [0u8; 4096];
                stream.set_read_timeout(Some(std::time::Duration::from_millis(200))).ok();
                if let Ok(n) = stream.read(&mut buf) {
                    captured.extend_from_slice(&buf[..n]);
                }
                stream.write_all(reply).expect("write canned reply");
            }
            captured
        });

        Self { port, handle: Some(handle) }
    }

    /// Joins the server thread, returning everything it read off the wire.
    pub fn join_captured(mut self) -> Vec<u8> {
        self.handle.take().expect("join once").join().expect("server thread panicked")
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}
