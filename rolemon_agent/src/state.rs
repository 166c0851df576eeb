//! Shared state for the pull exposition endpoint.

use prometheus::Registry;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Explicit registry built once at startup; the registry sink writes into the same one.
    pub registry: Registry,
    pub hostname: Arc<str>,
    // Completed cycles, bumped by the scheduler
    pub cycles: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(registry: Registry, hostname: &str) -> Self {
        Self {
            registry,
            hostname: Arc::from(hostname),
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }
}
