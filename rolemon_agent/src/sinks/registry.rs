//! Pull-based sink: one `role`-labelled gauge per metric in an explicit Prometheus registry.
//! Values are overwritten every cycle; the scraper reads the registry on its own schedule.

use super::{Sink, SinkError};
use crate::snapshot::Snapshot;
use crate::types::{HostMetricKind, MetricKind};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::BTreeSet;

pub struct RegistrySink {
    role_gauges: Vec<(MetricKind, GaugeVec)>,
    host_gauges: Vec<(HostMetricKind, Gauge)>,
    // roles written by the previous publish; their label sets are dropped once absent
    last_roles: BTreeSet<String>,
}

impl RegistrySink {
    /// Creates the gauges and registers them with `registry`. Host gauges are registered only
    /// when `with_host` is set.
    pub fn new(registry: &Registry, with_host: bool) -> Result<Self, prometheus::Error> {
        let mut role_gauges = Vec::with_capacity(MetricKind::ALL.len());
        for kind in MetricKind::ALL {
            let g = GaugeVec::new(Opts::new(kind.gauge_name(), kind.help()), &["role"])?;
            registry.register(Box::new(g.clone()))?;
            role_gauges.push((kind, g));
        }
        let mut host_gauges = Vec::new();
        if with_host {
            for kind in HostMetricKind::ALL {
                let g = Gauge::new(kind.gauge_name(), kind.help())?;
                registry.register(Box::new(g.clone()))?;
                host_gauges.push((kind, g));
            }
        }
        Ok(Self {
            role_gauges,
            host_gauges,
            last_roles: BTreeSet::new(),
        })
    }

    pub fn gauge(&self, kind: MetricKind) -> Option<&GaugeVec> {
        self.role_gauges
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, g)| g)
    }
}

impl Sink for RegistrySink {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn publish(&mut self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let mut current = BTreeSet::new();
        for agg in snapshot.roles() {
            for (kind, gauge) in &self.role_gauges {
                gauge.with_label_values(&[agg.role.as_str()]).set(agg.value(*kind));
            }
            current.insert(agg.role.clone());
        }
        for stale in self.last_roles.difference(&current) {
            for (_, gauge) in &self.role_gauges {
                // absent label set is fine
                let _ = gauge.remove_label_values(&[stale.as_str()]);
            }
        }
        self.last_roles = current;

        if let Some(host) = snapshot.host() {
            for (kind, gauge) in &self.host_gauges {
                gauge.set(host.value(*kind));
            }
        }
        Ok(())
    }
}

/// Prometheus text exposition of everything in `registry`.
pub fn encode_text(registry: &Registry) -> Result<String, SinkError> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::snapshot::assemble;
    use crate::types::{HostMetrics, RawSample};
    use chrono::Local;

    fn snap(roles: &[(&str, f64)], host: Option<HostMetrics>) -> Snapshot {
        let mut agg = Aggregator::new();
        for (role, cpu) in roles {
            agg.fold(
                role,
                &RawSample {
                    cpu_percent: *cpu,
                    memory_mb: 64.0,
                    num_threads: 3,
                    ..RawSample::default()
                },
            );
        }
        assemble(Local::now(), agg.finalize(), host)
    }

    #[test]
    fn sets_one_gauge_per_metric_and_role() {
        let reg = Registry::new();
        let mut sink = RegistrySink::new(&reg, false).unwrap();
        sink.publish(&snap(&[("a_x", 40.0), ("a_y", 10.0)], None)).unwrap();
        let cpu = sink.gauge(MetricKind::CpuUsage).unwrap();
        assert_eq!(cpu.with_label_values(&["a_x"]).get(), 40.0);
        assert_eq!(cpu.with_label_values(&["a_y"]).get(), 10.0);
        let threads = sink.gauge(MetricKind::NumThreads).unwrap();
        assert_eq!(threads.with_label_values(&["a_x"]).get(), 3.0);
    }

    #[test]
    fn last_write_wins() {
        let reg = Registry::new();
        let mut sink = RegistrySink::new(&reg, false).unwrap();
        sink.publish(&snap(&[("a_x", 40.0)], None)).unwrap();
        sink.publish(&snap(&[("a_x", 5.0)], None)).unwrap();
        let cpu = sink.gauge(MetricKind::CpuUsage).unwrap();
        assert_eq!(cpu.with_label_values(&["a_x"]).get(), 5.0);
    }

    #[test]
    fn roles_absent_from_latest_snapshot_disappear() {
        let reg = Registry::new();
        let mut sink = RegistrySink::new(&reg, false).unwrap();
        sink.publish(&snap(&[("a_x", 1.0), ("a_gone", 2.0)], None)).unwrap();
        sink.publish(&snap(&[("a_x", 1.0)], None)).unwrap();
        let text = encode_text(&reg).unwrap();
        assert!(text.contains(r#"process_cpu_usage{role="a_x"} 1"#), "{text}");
        assert!(!text.contains("a_gone"), "{text}");
    }

    #[test]
    fn host_gauges_follow_snapshot() {
        let reg = Registry::new();
        let mut sink = RegistrySink::new(&reg, true).unwrap();
        let host = HostMetrics {
            cpu_percent: 33.0,
            memory_percent: 71.5,
            ..HostMetrics::default()
        };
        sink.publish(&snap(&[], Some(host))).unwrap();
        let text = encode_text(&reg).unwrap();
        assert!(text.contains("host_cpu_usage 33"), "{text}");
        assert!(text.contains("host_memory_usage 71.5"), "{text}");
    }

    #[test]
    fn host_gauges_absent_without_host_collection() {
        let reg = Registry::new();
        let mut sink = RegistrySink::new(&reg, false).unwrap();
        sink.publish(&snap(&[("a_x", 1.0)], None)).unwrap();
        let text = encode_text(&reg).unwrap();
        assert!(text.contains("process_cpu_usage"), "{text}");
        assert!(!text.contains("host_"), "{text}");
    }

    #[test]
    fn registering_twice_in_one_registry_fails() {
        let reg = Registry::new();
        let _first = RegistrySink::new(&reg, false).unwrap();
        assert!(RegistrySink::new(&reg, false).is_err());
    }
}
