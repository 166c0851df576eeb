//! Push-based sink: one UDP datagram per metric, `host.role.metric value`.
//! Best effort: no acknowledgement, no retry; a failed send does not stop the rest of the cycle.

use super::{Sink, SinkError};
use crate::snapshot::Snapshot;
use crate::types::{HostMetricKind, MetricKind};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

/// Role used for host-wide metrics in the metric path.
pub const HOST_ROLE: &str = "system";

pub struct LineSink {
    // one socket per address family, bound on first use
    v4: Option<UdpSocket>,
    v6: Option<UdpSocket>,
    host: String,
    port: u16,
    prefix: String,
}

impl LineSink {
    pub fn new(host: impl Into<String>, port: u16, hostname: &str) -> Self {
        Self {
            v4: None,
            v6: None,
            host: host.into(),
            port,
            prefix: path_segment(hostname),
        }
    }

    /// Socket bound to the unspecified address of `target`'s family.
    fn socket_for(&mut self, target: &SocketAddr) -> io::Result<&UdpSocket> {
        let (slot, local) = match target {
            SocketAddr::V4(_) => (&mut self.v4, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))),
            SocketAddr::V6(_) => (&mut self.v6, SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))),
        };
        if slot.is_none() {
            *slot = Some(UdpSocket::bind(local)?);
        }
        slot.as_ref().ok_or_else(|| io::Error::other("socket not bound"))
    }

    /// Resolved once per publish so a DNS change is picked up on the next cycle.
    fn target(&self) -> Result<SocketAddr, SinkError> {
        let endpoint = format!("{}:{}", self.host, self.port);
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|_| SinkError::Resolve(endpoint.clone()))?
            .next()
            .ok_or(SinkError::Resolve(endpoint))
    }
}

/// Dots and whitespace would split a path segment.
fn path_segment(s: &str) -> String {
    s.chars()
        .map(|c| if c == '.' || c.is_whitespace() { '_' } else { c })
        .collect()
}

pub fn format_line(hostname: &str, role: &str, metric: &str, value: f64) -> String {
    format!("{hostname}.{role}.{metric} {value}")
}

/// Every line a snapshot produces, in role order then metric order.
pub fn snapshot_lines(hostname: &str, snapshot: &Snapshot) -> Vec<String> {
    let mut lines = Vec::new();
    for agg in snapshot.roles() {
        let role = path_segment(&agg.role);
        for kind in MetricKind::ALL {
            lines.push(format_line(hostname, &role, kind.short_name(), agg.value(kind)));
        }
    }
    if let Some(host) = snapshot.host() {
        for kind in HostMetricKind::ALL {
            lines.push(format_line(hostname, HOST_ROLE, kind.short_name(), host.value(kind)));
        }
    }
    lines
}

impl Sink for LineSink {
    fn name(&self) -> &'static str {
        "line"
    }

    fn publish(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let target = self.target()?;
        let lines = snapshot_lines(&self.prefix, snapshot);
        let socket = self.socket_for(&target)?;
        let total = lines.len();
        let mut failed = 0;
        let mut last = None;
        for line in lines {
            if let Err(e) = socket.send_to(line.as_bytes(), target) {
                failed += 1;
                last = Some(e);
            }
        }
        match last {
            Some(last) => Err(SinkError::Partial {
                failed,
                total,
                last,
            }),
            None => Ok(()),
        }
    }
}
