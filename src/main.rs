// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use redis_client_rs::{
    cfg::{cli::resolve_config_path, config::Config, config::PoolConfig, config::Target, logger::init_logger},
    partition::PartitionedClient,
    pool::{ConnectionPool, Locality},
};
use tracing::info;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or("config/redis.yaml");
    let logger_path = args.get(2).map(String::as_str).unwrap_or("config/logger.yaml");

    let _guard = init_logger(logger_path).context("failed to initialize logger")?;

    let cfg = resolve_config_path(config_path)
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    match &cfg.target {
        Target::Single(single) => run_single(single, &cfg.pool),
        Target::Partitioned(cluster) => run_partitioned(cluster),
    }
}

fn run_single(single: &redis_client_rs::cfg::config::ClientConfig, pool_cfg: &PoolConfig) -> Result<()> {
    let pool = ConnectionPool::new(single.host.clone(), single.port, single.db_index, single.timeout_ms(), pool_cfg.capacity);
    let locality = if pool_cfg.thread_specific { Locality::ThreadSpecific } else { Locality::NotThreadSpecific };

    info!(host = %single.host, port = single.port, capacity = pool_cfg.capacity, "connecting to single backend via pool");

    let mut client = pool.get(locality);
    client.ping().context("PING failed")?;

    client.set(b"smoke:key", b"hello").context("SET failed")?;
    let value = client.get(b"smoke:key").context("GET failed")?;
    info!(?value, "round-tripped smoke:key");

    let info_text = client.info().context("INFO failed")?;
    info!(bytes = info_text.len(), "server info retrieved");

    drop(client);
    info!(idle = pool.idle_count(), "connection returned to pool");

    Ok(())
}

fn run_partitioned(cluster: &redis_client_rs::cfg::config::PartitionedClientConfig) -> Result<()> {
    let mut client = PartitionedClient::new(
        cluster.endpoints(),
        cluster.partitions as usize,
        cluster.replica_groups as usize,
        cluster.db_index,
        cluster.timeout_ms(),
        Some(cluster.hash_fn.resolve()),
    )
    .context("failed to build partitioned client")?;

    info!(
        partitions = client.partitions(),
        replica_groups = client.replica_groups(),
        "connecting to partitioned backend"
    );

    client.ping_all().context("fan-out PING failed")?;
    client.set(b"smoke:key", b"hello").context("fan-out SET failed")?;
    let value = client.get(b"smoke:key").context("read-one GET failed")?;
    info!(?value, "round-tripped smoke:key across the grid");

    Ok(())
}
