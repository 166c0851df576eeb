//! Poll scheduler: sample -> classify -> aggregate -> assemble -> publish, then sleep.
//! Cycles never overlap and a late cycle is not caught up.

use crate::aggregate::Aggregator;
use crate::classify::RuleSet;
use crate::config::{AgentConfig, ConfigError};
use crate::metrics::HostSource;
use crate::sampler::{ProcessTable, Sampler};
use crate::sinks::{FanOut, SinkError};
use crate::snapshot::assemble;
use chrono::{DateTime, Local};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: DateTime<Local>,
    pub sampled: usize,
    pub skipped: usize,
    pub roles: usize,
    pub cpu_windows: usize,
    pub delivered: Vec<&'static str>,
    pub failed: Vec<&'static str>,
    pub duration: Duration,
}

/// Everything one cycle needs; owned by the scheduler and moved onto a blocking worker per cycle.
pub struct Pipeline {
    sampler: Sampler,
    rules: RuleSet,
    host: Option<Box<dyn HostSource>>,
    fanout: FanOut,
}

impl Pipeline {
    pub fn new(
        sampler: Sampler,
        rules: RuleSet,
        host: Option<Box<dyn HostSource>>,
        fanout: FanOut,
    ) -> Self {
        Self {
            sampler,
            rules,
            host,
            fanout,
        }
    }

    pub fn from_config(
        cfg: &AgentConfig,
        table: Box<dyn ProcessTable>,
        host: Option<Box<dyn HostSource>>,
        registry: &prometheus::Registry,
    ) -> Result<Self, BuildError> {
        let rules = RuleSet::from_config(cfg)?;
        let sampler = Sampler::new(table, cfg.cpu_sampling, cfg.cpu_window());
        let host = if cfg.collect_host { host } else { None };
        let fanout = FanOut::from_config(
            &cfg.sinks,
            &cfg.resolved_hostname(),
            registry,
            host.is_some(),
        )?;
        Ok(Self::new(sampler, rules, host, fanout))
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.fanout.names()
    }

    /// One full cycle. The snapshot is dropped once every sink has seen it.
    pub fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let timestamp = Local::now();

        let rules = &self.rules;
        let batch = self
            .sampler
            .sample_where(|id| rules.classify_parts(&id.name, &id.cmdline).is_some());

        let mut agg = Aggregator::new();
        for sample in &batch.samples {
            if let Some(role) = self.rules.classify(sample) {
                agg.fold(role, sample);
            }
        }
        let host = self.host.as_mut().map(|h| h.collect());
        let snapshot = assemble(timestamp, agg.finalize(), host);

        let fan = self.fanout.publish(&snapshot);
        let report = CycleReport {
            timestamp,
            sampled: batch.samples.len(),
            skipped: batch.skipped,
            roles: snapshot.role_count(),
            cpu_windows: batch.cpu_windows,
            delivered: fan.delivered,
            failed: fan.failed.iter().map(|(name, _)| *name).collect(),
            duration: started.elapsed(),
        };
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Collecting,
}

pub struct Scheduler {
    pipeline: Pipeline,
    interval: Duration,
    max_cycles: Option<u64>,
    cycles: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            max_cycles: None,
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_max_cycles(mut self, n: u64) -> Self {
        self.max_cycles = Some(n);
        self
    }

    /// Share a counter that is bumped after every completed cycle.
    pub fn with_cycle_counter(mut self, cycles: Arc<AtomicU64>) -> Self {
        self.cycles = cycles;
        self
    }

    /// Runs until `shutdown` resolves (checked at the sleep boundary) or `max_cycles` is reached.
    /// Returns the pipeline and the number of completed cycles.
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<(Pipeline, u64)>
    where
        F: Future<Output = ()>,
    {
        let Scheduler {
            mut pipeline,
            interval,
            max_cycles,
            cycles,
        } = self;
        tokio::pin!(shutdown);
        let mut done = 0u64;
        let mut state = SchedulerState::Idle;

        loop {
            state = transition(state, SchedulerState::Collecting);
            let (p, report) = tokio::task::spawn_blocking(move || {
                let report = pipeline.run_cycle();
                (pipeline, report)
            })
            .await?;
            pipeline = p;
            done += 1;
            cycles.fetch_add(1, Ordering::Relaxed);
            log_report(&report);

            state = transition(state, SchedulerState::Idle);
            if max_cycles.is_some_and(|max| done >= max) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping after {done} cycles");
                    break;
                }
            }
        }
        Ok((pipeline, done))
    }
}

fn transition(from: SchedulerState, to: SchedulerState) -> SchedulerState {
    debug!("scheduler {from:?} -> {to:?}");
    to
}

fn log_report(r: &CycleReport) {
    info!(
        roles = r.roles,
        sampled = r.sampled,
        skipped = r.skipped,
        cpu_windows = r.cpu_windows,
        elapsed_ms = r.duration.as_millis() as u64,
        "cycle complete"
    );
    if !r.failed.is_empty() {
        warn!("sinks failed this cycle: {}", r.failed.join(", "));
    }
}
