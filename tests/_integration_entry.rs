// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

#![allow(clippy::all)]

mod integration_tests {
    pub mod common;

    pub mod encode_set_foo_bar;
    pub mod nil_bulk_get;
    pub mod partitioned_write_fanout;
    pub mod pool_reuse_across_threads;
    pub mod socket_available_bytes;
    pub mod transaction_exec_aggregate;
}
