//! Immutable per-cycle snapshot handed to every sink.

use crate::types::{HostMetrics, RoleAggregate};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fields are private: sinks can read a snapshot but never change it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    timestamp: DateTime<Local>,
    roles: BTreeMap<String, RoleAggregate>,
    host: Option<HostMetrics>,
}

/// Pure composition. Roles without a contributing sample are dropped here as well.
pub fn assemble(
    timestamp: DateTime<Local>,
    roles: BTreeMap<String, RoleAggregate>,
    host: Option<HostMetrics>,
) -> Snapshot {
    let roles = roles
        .into_iter()
        .filter(|(_, agg)| agg.sample_count > 0)
        .collect();
    Snapshot {
        timestamp,
        roles,
        host,
    }
}

impl Snapshot {
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Aggregates in role-key order.
    pub fn roles(&self) -> impl Iterator<Item = &RoleAggregate> {
        self.roles.values()
    }

    pub fn role(&self, key: &str) -> Option<&RoleAggregate> {
        self.roles.get(key)
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn host(&self) -> Option<&HostMetrics> {
        self.host.as_ref()
    }
}
