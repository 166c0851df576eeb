//! Sink abstraction and fan-out. Every enabled sink receives the same snapshot; one sink's
//! failure is logged and isolated.

pub mod csv_log;
pub mod line;
pub mod registry;

use crate::config::SinksConfig;
use crate::snapshot::Snapshot;
use prometheus::Registry;
use std::io;
use thiserror::Error;
use tracing::{debug, warn};

pub use csv_log::CsvLogSink;
pub use line::LineSink;
pub use registry::RegistrySink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("registry error: {0}")]
    Registry(#[from] prometheus::Error),
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("{failed} of {total} lines not sent, last error: {last}")]
    Partial {
        failed: usize,
        total: usize,
        last: io::Error,
    },
}

pub trait Sink: Send {
    fn name(&self) -> &'static str;
    fn publish(&mut self, snapshot: &Snapshot) -> Result<(), SinkError>;
}

#[derive(Debug, Default)]
pub struct FanOutReport {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<(&'static str, SinkError)>,
}

impl FanOutReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn Sink>>,
}

impl FanOut {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    /// One sink per enabled backend. The registry sink registers into `registry`.
    pub fn from_config(
        sinks: &SinksConfig,
        hostname: &str,
        registry: &Registry,
        with_host: bool,
    ) -> Result<Self, SinkError> {
        let mut out = Self::default();
        if sinks.registry.is_some() {
            out.push(Box::new(RegistrySink::new(registry, with_host)?));
        }
        if let Some(line) = &sinks.line {
            out.push(Box::new(LineSink::new(line.host.clone(), line.port, hostname)));
        }
        if let Some(log) = &sinks.log {
            out.push(Box::new(CsvLogSink::new(log.path.clone(), log.host_path.clone())));
        }
        Ok(out)
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn publish(&mut self, snapshot: &Snapshot) -> FanOutReport {
        let mut report = FanOutReport::default();
        for sink in &mut self.sinks {
            match sink.publish(snapshot) {
                Ok(()) => {
                    debug!(sink = sink.name(), roles = snapshot.role_count(), "published");
                    report.delivered.push(sink.name());
                }
                Err(e) => {
                    warn!(sink = sink.name(), "publish failed: {e}");
                    report.failed.push((sink.name(), e));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::assemble;
    use chrono::Local;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    struct Broken;
    impl Sink for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn publish(&mut self, _: &Snapshot) -> Result<(), SinkError> {
            Err(SinkError::Resolve("nowhere:1".into()))
        }
    }

    struct Recording(Arc<Mutex<Vec<Snapshot>>>);
    impl Sink for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }
        fn publish(&mut self, s: &Snapshot) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(s.clone());
            Ok(())
        }
    }

    #[test]
    fn failure_does_not_stop_later_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut fan = FanOut::new(vec![
            Box::new(Broken),
            Box::new(Recording(seen.clone())),
            Box::new(Recording(seen.clone())),
        ]);
        let snap = assemble(Local::now(), BTreeMap::new(), None);
        let report = fan.publish(&snap);
        assert_eq!(report.delivered, vec!["recording", "recording"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert!(!report.all_delivered());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], snap);
        assert_eq!(seen[1], snap);
    }

    #[test]
    fn builds_only_enabled_sinks() {
        let cfg = crate::config::AgentConfig::from_json(
            r#"{"sinks": {"registry": {"port": 9100}, "log": {"path": "/tmp/x.csv"}}}"#,
        )
        .unwrap();
        let fan = FanOut::from_config(&cfg.sinks, "h", &Registry::new(), true).unwrap();
        assert_eq!(fan.names(), vec!["registry", "csv_log"]);
    }

    #[test]
    fn empty_fanout_reports_nothing() {
        let mut fan = FanOut::default();
        assert!(fan.is_empty());
        let report = fan.publish(&assemble(Local::now(), BTreeMap::new(), None));
        assert!(report.all_delivered());
        assert!(report.delivered.is_empty());
    }
}
