//! Per-role reduction of one cycle's samples.

use crate::types::{RawSample, RoleAggregate};
use std::collections::BTreeMap;

/// Running state for one role during a cycle. CPU samples stay unreduced until finalize
/// so the mean is unweighted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleAccumulator {
    cpu_samples: Vec<f64>,
    memory_mb: f64,
    num_threads: u64,
    disk_read_bytes: u64,
    disk_write_bytes: u64,
    net_sent_bytes: u64,
    net_recv_bytes: u64,
    open_files: Vec<String>,
}

impl RoleAccumulator {
    pub fn fold(&mut self, sample: &RawSample) {
        self.cpu_samples.push(sample.cpu_percent);
        self.memory_mb += sample.memory_mb;
        self.num_threads = self.num_threads.saturating_add(sample.num_threads);
        self.disk_read_bytes = self.disk_read_bytes.saturating_add(sample.disk_read_bytes);
        self.disk_write_bytes = self.disk_write_bytes.saturating_add(sample.disk_write_bytes);
        self.net_sent_bytes = self.net_sent_bytes.saturating_add(sample.net_sent_bytes);
        self.net_recv_bytes = self.net_recv_bytes.saturating_add(sample.net_recv_bytes);
        self.open_files.extend(sample.open_files.iter().cloned());
    }

    pub fn sample_count(&self) -> usize {
        self.cpu_samples.len()
    }

    pub fn finalize(self, role: String) -> RoleAggregate {
        RoleAggregate {
            role,
            sample_count: self.cpu_samples.len(),
            avg_cpu_usage: mean(&self.cpu_samples),
            total_memory_usage: self.memory_mb,
            total_num_threads: self.num_threads,
            total_disk_read_bytes: self.disk_read_bytes,
            total_disk_write_bytes: self.disk_write_bytes,
            total_network_sent_bytes: self.net_sent_bytes,
            total_network_recv_bytes: self.net_recv_bytes,
            open_files: self.open_files,
        }
    }
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Folds a cycle's classified samples. Consumed by `finalize`, so nothing partial escapes.
#[derive(Debug, Default)]
pub struct Aggregator {
    roles: BTreeMap<String, RoleAccumulator>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, role: &str, sample: &RawSample) {
        match self.roles.get_mut(role) {
            Some(acc) => acc.fold(sample),
            None => {
                let mut acc = RoleAccumulator::default();
                acc.fold(sample);
                self.roles.insert(role.to_string(), acc);
            }
        }
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn finalize(self) -> BTreeMap<String, RoleAggregate> {
        self.roles
            .into_iter()
            .filter(|(_, acc)| acc.sample_count() > 0)
            .map(|(role, acc)| (role.clone(), acc.finalize(role)))
            .collect()
    }
}
