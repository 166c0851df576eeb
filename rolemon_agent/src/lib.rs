//! Library interface for rolemon_agent: process role classification, per-role aggregation
//! and multi-sink publishing, driven by a fixed-interval scheduler.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod http;
pub mod metrics;
pub mod sampler;
pub mod scheduler;
pub mod sinks;
pub mod snapshot;
pub mod state;
pub mod types;

pub use classify::{RoleRule, RuleSet};
pub use config::AgentConfig;
pub use scheduler::{CycleReport, Pipeline, Scheduler};
pub use snapshot::Snapshot;
pub use types::{HostMetrics, RawSample, RoleAggregate};
