// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Top-level configuration: either a single backend or a partitioned
/// cluster, plus the pool settings shared by both.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    #[serde(flatten)]
    pub target: Target,
    /// Connection pool sizing.
    pub pool: PoolConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Single(ClientConfig),
    Partitioned(PartitionedClientConfig),
}

/// Settings for one backend connection.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ClientConfig {
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "DbIndex", default)]
    pub db_index: i64,
    #[serde(rename = "Timeout", with = "serde_millis")]
    pub timeout: Duration,
}

/// Settings for a sharded cluster of `partitions * replica_groups`
/// backends, laid out partition-major in `host_list`/`port_list`.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PartitionedClientConfig {
    #[serde(rename = "HostList")]
    pub host_list: Vec<String>,
    #[serde(rename = "PortList")]
    pub port_list: Vec<u16>,
    #[serde(rename = "Partitions")]
    pub partitions: u32,
    #[serde(rename = "ReplicaGroups", default = "default_replica_groups")]
    pub replica_groups: u32,
    #[serde(rename = "DbIndex", default)]
    pub db_index: i64,
    #[serde(rename = "Timeout", with = "serde_millis")]
    pub timeout: Duration,
    #[serde(rename = "HashFn", default)]
    pub hash_fn: HashFnName,
}

fn default_replica_groups() -> u32 {
    1
}

impl ClientConfig {
    pub fn timeout_ms(&self) -> i64 {
        self.timeout.as_millis() as i64
    }
}

impl PartitionedClientConfig {
    pub fn timeout_ms(&self) -> i64 {
        self.timeout.as_millis() as i64
    }

    /// Builds the partition-major endpoint list `PartitionedClient::new`
    /// expects, after `validate_and_normalize` has broadcast a singleton
    /// `PortList`.
    pub fn endpoints(&self) -> Vec<crate::partition::Endpoint> {
        self.host_list
            .iter()
            .zip(self.port_list.iter())
            .map(|(host, &port)| crate::partition::Endpoint { host: host.clone(), port })
            .collect()
    }
}

/// The selectable default hash functions a caller can name in config;
/// `Time33` (Bernstein djb2 variant) matches the reference partitioning
/// scheme and is therefore the default.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum HashFnName {
    #[default]
    Time33,
}

impl HashFnName {
    pub fn resolve(self) -> crate::partition::HashFn {
        match self {
            HashFnName::Time33 => crate::partition::time33_hash_32,
        }
    }
}

/// Pool sizing shared by single-server and partitioned clients.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PoolConfig {
    #[serde(rename = "Capacity")]
    pub capacity: usize,
    #[serde(rename = "ThreadSpecific", default)]
    pub thread_specific: bool,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(self.pool.capacity >= 1, "pool Capacity must be >= 1");

        match &self.target {
            Target::Single(single) => {
                ensure!(!single.host.is_empty(), "Host must not be empty");
            },
            Target::Partitioned(cluster) => {
                ensure!(cluster.partitions >= 1, "Partitions must be >= 1");
                ensure!(cluster.replica_groups >= 1, "ReplicaGroups must be >= 1");

                // A single port broadcasts across every host.
                if cluster.port_list.len() == 1 && cluster.host_list.len() > 1 {
                    let port = cluster.port_list[0];
                    cluster.port_list = vec![port; cluster.host_list.len()];
                }

                let expected = (cluster.partitions * cluster.replica_groups) as usize;
                ensure!(
                    cluster.host_list.len() == expected && cluster.port_list.len() == expected,
                    "HostList/PortList must each have Partitions * ReplicaGroups = {expected} entries \
                     (PortList may instead have exactly 1 entry, broadcast across HostList)"
                );
            },
        }

        Ok(())
    }
}

/// Serde helper representing `Duration` as a number of milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_target_validates_host() {
        let mut cfg = Config {
            target: Target::Single(ClientConfig {
                host: String::new(),
                port: 6379,
                db_index: 0,
                timeout: Duration::from_millis(100),
            }),
            pool: PoolConfig { capacity: 4, thread_specific: false },
        };
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn partitioned_target_checks_list_lengths() {
        let mut cfg = Config {
            target: Target::Partitioned(PartitionedClientConfig {
                host_list: vec!["a".into()],
                port_list: vec![1, 2],
                partitions: 2,
                replica_groups: 1,
                db_index: 0,
                timeout: Duration::from_millis(100),
                hash_fn: HashFnName::Time33,
            }),
            pool: PoolConfig { capacity: 4, thread_specific: false },
        };
        assert!(cfg.validate_and_normalize().is_err());
    }

    #[test]
    fn single_port_broadcasts_across_host_list() {
        let mut cfg = Config {
            target: Target::Partitioned(PartitionedClientConfig {
                host_list: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                port_list: vec![6379],
                partitions: 2,
                replica_groups: 2,
                db_index: 0,
                timeout: Duration::from_millis(100),
                hash_fn: HashFnName::Time33,
            }),
            pool: PoolConfig { capacity: 4, thread_specific: false },
        };
        cfg.validate_and_normalize().expect("broadcast port_list should validate");
        let Target::Partitioned(cluster) = &cfg.target else { unreachable!() };
        assert_eq!(cluster.port_list, vec![6379, 6379, 6379, 6379]);
        assert_eq!(cluster.endpoints().len(), 4);
    }
}
