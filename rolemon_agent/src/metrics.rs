//! Host-wide metrics collection using sysinfo. One call per cycle, independent of roles.

use crate::types::HostMetrics;
use sysinfo::{Disks, Networks, System};
use tracing::warn;

pub trait HostSource: Send {
    fn collect(&mut self) -> HostMetrics;
}

/// Persistent sysinfo handles; CPU% is the delta since the previous `collect`.
pub struct SysinfoHost {
    sys: System,
    disks: Disks,
    networks: Networks,
}

impl SysinfoHost {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self {
            sys,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSource for SysinfoHost {
    fn collect(&mut self) -> HostMetrics {
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.sys.refresh_cpu_usage();
            self.sys.refresh_memory();
        })) {
            warn!("sysinfo selective refresh panicked: {e:?}");
        }
        let total = self.sys.total_memory();
        let used = total.saturating_sub(self.sys.available_memory());

        self.disks.refresh(true);
        let (disk_read_bytes, disk_write_bytes) =
            self.disks.iter().fold((0u64, 0u64), |(r, w), d| {
                let u = d.usage();
                (
                    r.saturating_add(u.total_read_bytes),
                    w.saturating_add(u.total_written_bytes),
                )
            });

        self.networks.refresh(true);
        let (net_sent_bytes, net_recv_bytes) =
            self.networks.iter().fold((0u64, 0u64), |(tx, rx), (_, n)| {
                (
                    tx.saturating_add(n.total_transmitted()),
                    rx.saturating_add(n.total_received()),
                )
            });

        HostMetrics {
            cpu_percent: self.sys.global_cpu_usage() as f64,
            memory_percent: percent(used, total),
            disk_read_bytes,
            disk_write_bytes,
            net_sent_bytes,
            net_recv_bytes,
        }
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}
