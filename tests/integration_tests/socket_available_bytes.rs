// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `available_bytes` must report the real number of unread bytes sitting in
//! the socket buffer, not just 0-or-1 from a single-byte peek.

use std::{io::Write, net::TcpListener};

use redis_client_rs::net::ConnSocket;

#[test]
fn available_bytes_reports_the_full_pending_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        stream.write_all(b"+OK\r\n$5\r\nhello\r\n").expect("write payload");
        // keep the stream (and its write buffer) alive until the client is done
        std::thread::sleep(std::time::Duration::from_millis(200));
    });

    let socket = ConnSocket::connect("127.0.0.1", port, 1000).expect("connect to fake server");
    std::thread::sleep(std::time::Duration::from_millis(50));

    assert_eq!(socket.available_bytes(), "+OK\r\n$5\r\nhello\r\n".len(), "available_bytes must count the whole pending payload, not cap at 1");

    server.join().expect("server thread should not panic");
}
