//! In-memory process table and host source shared by integration tests.
#![allow(dead_code)]

use rolemon_agent::metrics::HostSource;
use rolemon_agent::sampler::{ProcessIdentity, ProcessTable, SampleError};
use rolemon_agent::sinks::{Sink, SinkError};
use rolemon_agent::snapshot::Snapshot;
use rolemon_agent::types::{HostMetrics, RawSample};
use std::sync::{Arc, Mutex};

/// Process list that tests can swap between cycles.
#[derive(Clone, Default)]
pub struct FixedTable {
    pub procs: Arc<Mutex<Vec<Result<RawSample, SampleError>>>>,
}

impl FixedTable {
    pub fn new(procs: Vec<RawSample>) -> Self {
        Self {
            procs: Arc::new(Mutex::new(procs.into_iter().map(Ok).collect())),
        }
    }

    pub fn set(&self, procs: Vec<RawSample>) {
        *self.procs.lock().unwrap() = procs.into_iter().map(Ok).collect();
    }

    pub fn push_failing(&self, err: SampleError) {
        self.procs.lock().unwrap().push(Err(err));
    }

    fn get(&self, pid: u32) -> Result<RawSample, SampleError> {
        let procs = self.procs.lock().unwrap();
        for p in procs.iter() {
            match p {
                Ok(s) if s.pid == pid => return Ok(s.clone()),
                Err(e) if pid_of(e) == pid => return Err(e.clone()),
                _ => {}
            }
        }
        Err(SampleError::Gone(pid))
    }
}

fn pid_of(e: &SampleError) -> u32 {
    match e {
        SampleError::Gone(p) | SampleError::AccessDenied(p) | SampleError::Zombie(p) => *p,
    }
}

impl ProcessTable for FixedTable {
    fn refresh(&mut self) {}

    fn pids(&self) -> Vec<u32> {
        self.procs
            .lock()
            .unwrap()
            .iter()
            .map(|p| match p {
                Ok(s) => s.pid,
                Err(e) => pid_of(e),
            })
            .collect()
    }

    fn identity(&self, pid: u32) -> Result<ProcessIdentity, SampleError> {
        let s = self.get(pid)?;
        Ok(ProcessIdentity {
            pid,
            name: s.name,
            cmdline: s.cmdline,
        })
    }

    fn refresh_cpu(&mut self, _pids: &[u32]) {}

    fn read(&self, pid: u32) -> Result<RawSample, SampleError> {
        self.get(pid)
    }

    fn network_totals(&mut self) -> (u64, u64) {
        (1_000, 2_000)
    }
}

pub struct FixedHost(pub HostMetrics);

impl HostSource for FixedHost {
    fn collect(&mut self) -> HostMetrics {
        self.0
    }
}

/// Sink that keeps a copy of every snapshot it is handed.
#[derive(Clone, Default)]
pub struct SnapshotTap {
    pub seen: Arc<Mutex<Vec<Snapshot>>>,
}

impl SnapshotTap {
    pub fn last(&self) -> Snapshot {
        self.seen.lock().unwrap().last().cloned().expect("no snapshot published")
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Sink for SnapshotTap {
    fn name(&self) -> &'static str {
        "tap"
    }

    fn publish(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        self.seen.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

pub fn proc(pid: u32, name: &str, cmdline: &[&str], cpu: f64) -> RawSample {
    RawSample {
        pid,
        name: name.to_string(),
        cmdline: cmdline.iter().map(|s| s.to_string()).collect(),
        cpu_percent: cpu,
        memory_mb: 128.0,
        num_threads: 4,
        disk_read_bytes: 512,
        disk_write_bytes: 256,
        open_files: vec![format!("/var/run/{name}.{pid}")],
        ..RawSample::default()
    }
}
