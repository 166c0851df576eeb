//! Process sampler: enumerates live processes once per cycle and measures CPU over a short
//! window. Processes that vanish, deny access or are zombies are skipped whole.

use crate::config::CpuSampling;
use crate::types::RawSample;
#[cfg(target_os = "linux")]
use std::fs;
use std::io;
use std::time::Duration;
use sysinfo::{
    Networks, Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, ThreadKind,
    UpdateKind,
};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("process {0} exited")]
    Gone(u32),
    #[error("process {0} is not accessible")]
    AccessDenied(u32),
    #[error("process {0} is a zombie")]
    Zombie(u32),
}

impl SampleError {
    pub fn from_io(pid: u32, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SampleError::Gone(pid),
            _ => SampleError::AccessDenied(pid),
        }
    }
}

/// What the classifier needs to decide whether a process is worth a CPU window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub name: String,
    pub cmdline: Vec<String>,
}

/// The OS process-enumeration primitive.
pub trait ProcessTable: Send {
    /// Re-enumerate live processes; also the CPU baseline for every process.
    fn refresh(&mut self);
    fn pids(&self) -> Vec<u32>;
    fn identity(&self, pid: u32) -> Result<ProcessIdentity, SampleError>;
    /// Refresh CPU counters of the given processes only.
    fn refresh_cpu(&mut self, pids: &[u32]);
    fn read(&self, pid: u32) -> Result<RawSample, SampleError>;
    /// Cumulative host (sent, received) network bytes.
    fn network_totals(&mut self) -> (u64, u64);
}

#[derive(Debug, Default)]
pub struct SampleBatch {
    pub samples: Vec<RawSample>,
    pub skipped: usize,
    pub cpu_windows: usize,
}

pub struct Sampler {
    table: Box<dyn ProcessTable>,
    mode: CpuSampling,
    window: Duration,
}

impl Sampler {
    pub fn new(table: Box<dyn ProcessTable>, mode: CpuSampling, window: Duration) -> Self {
        Self {
            table,
            mode,
            window,
        }
    }

    pub fn sample(&mut self) -> SampleBatch {
        self.sample_where(|_| true)
    }

    /// Samples only processes accepted by `wanted`; rejected ones cost no CPU window.
    pub fn sample_where<F>(&mut self, wanted: F) -> SampleBatch
    where
        F: Fn(&ProcessIdentity) -> bool,
    {
        let mut batch = SampleBatch::default();
        self.table.refresh();
        let (net_sent, net_recv) = self.table.network_totals();

        let mut selected = Vec::new();
        for pid in self.table.pids() {
            match self.table.identity(pid) {
                Ok(id) if wanted(&id) => selected.push(pid),
                Ok(_) => {}
                Err(e) => {
                    trace!("skip: {e}");
                    batch.skipped += 1;
                }
            }
        }
        if selected.is_empty() {
            return batch;
        }

        match self.mode {
            CpuSampling::Batched => {
                std::thread::sleep(self.window);
                self.table.refresh_cpu(&selected);
                batch.cpu_windows = 1;
            }
            CpuSampling::PerProcess => {
                for pid in &selected {
                    self.table.refresh_cpu(std::slice::from_ref(pid));
                    std::thread::sleep(self.window);
                    self.table.refresh_cpu(std::slice::from_ref(pid));
                    batch.cpu_windows += 1;
                }
            }
        }

        for pid in selected {
            match self.table.read(pid) {
                Ok(mut s) => {
                    s.net_sent_bytes = net_sent;
                    s.net_recv_bytes = net_recv;
                    batch.samples.push(s);
                }
                Err(e) => {
                    trace!("skip: {e}");
                    batch.skipped += 1;
                }
            }
        }
        batch
    }
}

/// sysinfo-backed table. Keeps one `System` alive so CPU deltas work across refreshes.
pub struct SysinfoTable {
    sys: System,
    nets: Networks,
}

impl SysinfoTable {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, full_refresh_kind());
        Self {
            sys,
            nets: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoTable {
    fn default() -> Self {
        Self::new()
    }
}

fn full_refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_cpu()
        .with_memory()
        .with_disk_usage()
        .with_cmd(UpdateKind::OnlyIfNotSet)
        .with_tasks()
}

impl ProcessTable for SysinfoTable {
    fn refresh(&mut self) {
        self.sys
            .refresh_processes_specifics(ProcessesToUpdate::All, true, full_refresh_kind());
    }

    fn pids(&self) -> Vec<u32> {
        // user threads show up as entries too once tasks are refreshed; kernel threads stay
        self.sys
            .processes()
            .values()
            .filter(|p| !matches!(p.thread_kind(), Some(ThreadKind::Userland)))
            .map(|p| p.pid().as_u32())
            .collect()
    }

    fn identity(&self, pid: u32) -> Result<ProcessIdentity, SampleError> {
        let p = self.sys.process(Pid::from_u32(pid)).ok_or(SampleError::Gone(pid))?;
        if matches!(p.status(), ProcessStatus::Zombie) {
            return Err(SampleError::Zombie(pid));
        }
        Ok(ProcessIdentity {
            pid,
            name: p.name().to_string_lossy().into_owned(),
            cmdline: p
                .cmd()
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
        })
    }

    fn refresh_cpu(&mut self, pids: &[u32]) {
        let pids: Vec<Pid> = pids.iter().map(|p| Pid::from_u32(*p)).collect();
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
    }

    fn read(&self, pid: u32) -> Result<RawSample, SampleError> {
        let id = self.identity(pid)?;
        let p = self.sys.process(Pid::from_u32(pid)).ok_or(SampleError::Gone(pid))?;
        if !p.exists() {
            return Err(SampleError::Gone(pid));
        }
        let disk = p.disk_usage();
        Ok(RawSample {
            pid,
            name: id.name,
            cmdline: id.cmdline,
            cpu_percent: p.cpu_usage() as f64,
            memory_mb: p.memory() as f64 / (1024.0 * 1024.0),
            // tasks() lists the other threads of the group, not the leader
            num_threads: p.tasks().map_or(1, |t| t.len() as u64 + 1),
            disk_read_bytes: disk.total_read_bytes,
            disk_write_bytes: disk.total_written_bytes,
            net_sent_bytes: 0,
            net_recv_bytes: 0,
            open_files: open_file_paths(pid)?,
        })
    }

    fn network_totals(&mut self) -> (u64, u64) {
        self.nets.refresh(true);
        self.nets.iter().fold((0u64, 0u64), |(tx, rx), (_, data)| {
            (
                tx.saturating_add(data.total_transmitted()),
                rx.saturating_add(data.total_received()),
            )
        })
    }
}

/// Regular files held open by `pid`, from /proc/<pid>/fd. A descriptor closed mid-scan is ignored.
#[cfg(target_os = "linux")]
pub fn open_file_paths(pid: u32) -> Result<Vec<String>, SampleError> {
    let dir = format!("/proc/{pid}/fd");
    let entries = fs::read_dir(&dir).map_err(|e| SampleError::from_io(pid, &e))?;
    let mut out = Vec::new();
    for entry in entries.flatten() {
        let Ok(target) = fs::read_link(entry.path()) else {
            continue;
        };
        if fs::metadata(&target).map(|m| m.is_file()).unwrap_or(false) {
            out.push(target.to_string_lossy().into_owned());
        }
    }
    Ok(out)
}

#[cfg(not(target_os = "linux"))]
pub fn open_file_paths(_pid: u32) -> Result<Vec<String>, SampleError> {
    Ok(Vec::new())
}
