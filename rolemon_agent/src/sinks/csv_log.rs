//! Append-only CSV sink. The header is written only when the target file does not exist yet,
//! and each cycle's rows go out in a single append so a row is never half-written.

use super::{Sink, SinkError};
use crate::snapshot::Snapshot;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ROLE_HEADER: [&str; 10] = [
    "timestamp",
    "role",
    "avg_cpu_usage",
    "total_memory_usage",
    "total_num_threads",
    "total_disk_read_bytes",
    "total_disk_write_bytes",
    "total_network_sent_bytes",
    "total_network_recv_bytes",
    "open_files",
];

pub const HOST_HEADER: [&str; 7] = [
    "timestamp",
    "cpu_usage",
    "memory_usage",
    "disk_io_read",
    "disk_io_write",
    "network_bytes_sent",
    "network_bytes_recv",
];

pub struct CsvLogSink {
    path: PathBuf,
    host_path: Option<PathBuf>,
}

impl CsvLogSink {
    pub fn new(path: impl Into<PathBuf>, host_path: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            host_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn role_rows(snapshot: &Snapshot) -> Vec<Vec<String>> {
    let ts = snapshot.timestamp_string();
    snapshot
        .roles()
        .map(|r| {
            vec![
                ts.clone(),
                r.role.clone(),
                r.avg_cpu_usage.to_string(),
                r.total_memory_usage.to_string(),
                r.total_num_threads.to_string(),
                r.total_disk_read_bytes.to_string(),
                r.total_disk_write_bytes.to_string(),
                r.total_network_sent_bytes.to_string(),
                r.total_network_recv_bytes.to_string(),
                r.open_files_joined(),
            ]
        })
        .collect()
}

fn host_rows(snapshot: &Snapshot) -> Vec<Vec<String>> {
    snapshot
        .host()
        .map(|h| {
            vec![vec![
                snapshot.timestamp_string(),
                h.cpu_percent.to_string(),
                h.memory_percent.to_string(),
                h.disk_read_bytes.to_string(),
                h.disk_write_bytes.to_string(),
                h.net_sent_bytes.to_string(),
                h.net_recv_bytes.to_string(),
            ]]
        })
        .unwrap_or_default()
}

/// Header existence is decided by the file's presence, not its content.
pub fn append_rows(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<(), SinkError> {
    if rows.is_empty() {
        return Ok(());
    }
    let needs_header = !path.exists();
    let mut w = csv::WriterBuilder::new().from_writer(Vec::new());
    if needs_header {
        w.write_record(header)?;
    }
    for row in rows {
        w.write_record(row)?;
    }
    let buf = w
        .into_inner()
        .map_err(|e| SinkError::Io(std::io::Error::other(e.to_string())))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(&buf)?;
    f.flush()?;
    Ok(())
}

impl Sink for CsvLogSink {
    fn name(&self) -> &'static str {
        "csv_log"
    }

    fn publish(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        append_rows(&self.path, &ROLE_HEADER, &role_rows(snapshot))?;
        if let Some(host_path) = &self.host_path {
            append_rows(host_path, &HOST_HEADER, &host_rows(snapshot))?;
        }
        Ok(())
    }
}
