//! Data types shared by the sampler, aggregator and sinks.
//! Keep this module minimal and stable: sink output formats are derived from it.

use serde::Serialize;

/// One live process as seen during a single cycle. Never retained past the cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawSample {
    pub pid: u32,
    pub name: String,
    pub cmdline: Vec<String>,
    // 0..100 * n_cores, measured over the sampler's CPU window
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub num_threads: u64,
    // cumulative per-process counters
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
    // cumulative host-level counters, read once per cycle
    pub net_sent_bytes: u64,
    pub net_recv_bytes: u64,
    pub open_files: Vec<String>,
}

impl RawSample {
    /// Command line tokens joined with single spaces; empty when there are none.
    pub fn cmdline_joined(&self) -> String {
        self.cmdline.join(" ")
    }
}

/// Host-wide counters, collected once per cycle independently of classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HostMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
    pub net_sent_bytes: u64,
    pub net_recv_bytes: u64,
}

/// Finalized per-role statistics for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleAggregate {
    pub role: String,
    pub sample_count: usize,
    pub avg_cpu_usage: f64,
    pub total_memory_usage: f64,
    pub total_num_threads: u64,
    pub total_disk_read_bytes: u64,
    pub total_disk_write_bytes: u64,
    pub total_network_sent_bytes: u64,
    pub total_network_recv_bytes: u64,
    pub open_files: Vec<String>,
}

impl RoleAggregate {
    pub fn value(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::CpuUsage => self.avg_cpu_usage,
            MetricKind::MemoryUsage => self.total_memory_usage,
            MetricKind::NumThreads => self.total_num_threads as f64,
            MetricKind::DiskReadBytes => self.total_disk_read_bytes as f64,
            MetricKind::DiskWriteBytes => self.total_disk_write_bytes as f64,
            MetricKind::NetworkSentBytes => self.total_network_sent_bytes as f64,
            MetricKind::NetworkRecvBytes => self.total_network_recv_bytes as f64,
        }
    }

    pub fn open_files_joined(&self) -> String {
        self.open_files.join(",")
    }
}

/// The seven per-role metrics every sink publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    CpuUsage,
    MemoryUsage,
    NumThreads,
    DiskReadBytes,
    DiskWriteBytes,
    NetworkSentBytes,
    NetworkRecvBytes,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::CpuUsage,
        MetricKind::MemoryUsage,
        MetricKind::NumThreads,
        MetricKind::DiskReadBytes,
        MetricKind::DiskWriteBytes,
        MetricKind::NetworkSentBytes,
        MetricKind::NetworkRecvBytes,
    ];

    /// Short name, used as the last segment of a line-protocol path.
    pub fn short_name(self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "cpu_usage",
            MetricKind::MemoryUsage => "memory_usage",
            MetricKind::NumThreads => "num_threads",
            MetricKind::DiskReadBytes => "disk_read_bytes",
            MetricKind::DiskWriteBytes => "disk_write_bytes",
            MetricKind::NetworkSentBytes => "network_sent_bytes",
            MetricKind::NetworkRecvBytes => "network_recv_bytes",
        }
    }

    /// Gauge name in the pull registry.
    pub fn gauge_name(self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "process_cpu_usage",
            MetricKind::MemoryUsage => "process_memory_usage",
            MetricKind::NumThreads => "process_num_threads",
            MetricKind::DiskReadBytes => "process_disk_read_bytes",
            MetricKind::DiskWriteBytes => "process_disk_write_bytes",
            MetricKind::NetworkSentBytes => "process_network_sent_bytes",
            MetricKind::NetworkRecvBytes => "process_network_recv_bytes",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "Mean CPU percent across the role's processes",
            MetricKind::MemoryUsage => "Summed resident memory of the role in MB",
            MetricKind::NumThreads => "Summed thread count of the role",
            MetricKind::DiskReadBytes => "Summed cumulative disk read bytes of the role",
            MetricKind::DiskWriteBytes => "Summed cumulative disk write bytes of the role",
            MetricKind::NetworkSentBytes => "Summed host network sent bytes over the role's processes",
            MetricKind::NetworkRecvBytes => "Summed host network received bytes over the role's processes",
        }
    }
}

/// Host-wide metrics, published alongside the per-role ones when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostMetricKind {
    CpuUsage,
    MemoryUsage,
    DiskReadBytes,
    DiskWriteBytes,
    NetworkSentBytes,
    NetworkRecvBytes,
}

impl HostMetricKind {
    pub const ALL: [HostMetricKind; 6] = [
        HostMetricKind::CpuUsage,
        HostMetricKind::MemoryUsage,
        HostMetricKind::DiskReadBytes,
        HostMetricKind::DiskWriteBytes,
        HostMetricKind::NetworkSentBytes,
        HostMetricKind::NetworkRecvBytes,
    ];

    pub fn short_name(self) -> &'static str {
        match self {
            HostMetricKind::CpuUsage => "cpu_usage",
            HostMetricKind::MemoryUsage => "memory_usage",
            HostMetricKind::DiskReadBytes => "disk_read_bytes",
            HostMetricKind::DiskWriteBytes => "disk_write_bytes",
            HostMetricKind::NetworkSentBytes => "network_sent_bytes",
            HostMetricKind::NetworkRecvBytes => "network_recv_bytes",
        }
    }

    pub fn gauge_name(self) -> &'static str {
        match self {
            HostMetricKind::CpuUsage => "host_cpu_usage",
            HostMetricKind::MemoryUsage => "host_memory_usage",
            HostMetricKind::DiskReadBytes => "host_disk_read_bytes",
            HostMetricKind::DiskWriteBytes => "host_disk_write_bytes",
            HostMetricKind::NetworkSentBytes => "host_network_sent_bytes",
            HostMetricKind::NetworkRecvBytes => "host_network_recv_bytes",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            HostMetricKind::CpuUsage => "Host CPU percent since the previous cycle",
            HostMetricKind::MemoryUsage => "Host memory used percent",
            HostMetricKind::DiskReadBytes => "Host cumulative disk read bytes",
            HostMetricKind::DiskWriteBytes => "Host cumulative disk write bytes",
            HostMetricKind::NetworkSentBytes => "Host cumulative network sent bytes",
            HostMetricKind::NetworkRecvBytes => "Host cumulative network received bytes",
        }
    }
}

impl HostMetrics {
    pub fn value(&self, kind: HostMetricKind) -> f64 {
        match kind {
            HostMetricKind::CpuUsage => self.cpu_percent,
            HostMetricKind::MemoryUsage => self.memory_percent,
            HostMetricKind::DiskReadBytes => self.disk_read_bytes as f64,
            HostMetricKind::DiskWriteBytes => self.disk_write_bytes as f64,
            HostMetricKind::NetworkSentBytes => self.net_sent_bytes as f64,
            HostMetricKind::NetworkRecvBytes => self.net_recv_bytes as f64,
        }
    }
}
