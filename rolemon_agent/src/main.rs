//! rolemon_agent: samples processes on an interval, groups them into application roles and
//! publishes per-role stats to the configured sinks.

use anyhow::Context;
use prometheus::Registry;
use rolemon_agent::config::{default_config_path, AgentConfig};
use rolemon_agent::metrics::{HostSource, SysinfoHost};
use rolemon_agent::sampler::SysinfoTable;
use rolemon_agent::state::AppState;
use rolemon_agent::{http, Pipeline, RuleSet, Scheduler};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "Usage: rolemon_agent [--config PATH|-c PATH] [--once] [--check] [--log-level LEVEL]";

#[derive(Debug, Default, PartialEq)]
struct ParsedArgs {
    config: Option<PathBuf>,
    once: bool,
    check: bool,
    log_level: Option<String>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut it = args.into_iter();
    let _ = it.next(); // program name
    let mut parsed = ParsedArgs::default();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(USAGE.to_string()),
            "--config" | "-c" => {
                parsed.config = Some(it.next().ok_or("--config needs a path")?.into());
            }
            "--log-level" => {
                parsed.log_level = Some(it.next().ok_or("--log-level needs a value")?);
            }
            "--once" => parsed.once = true,
            "--check" => parsed.check = true,
            _ if arg.starts_with("--config=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    parsed.config = Some(v.into());
                }
            }
            _ => return Err(format!("Unexpected argument {arg:?}. {USAGE}")),
        }
    }
    Ok(parsed)
}

fn init_tracing(level: Option<&str>) {
    let filter = level
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_env("ROLEMON_LOG").ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) if msg == USAGE => {
            eprintln!("{msg}");
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    init_tracing(parsed.log_level.as_deref());

    let path = parsed.config.clone().unwrap_or_else(default_config_path);
    let cfg = AgentConfig::load(&path)
        .with_context(|| format!("loading config {}", path.display()))?;

    if parsed.check {
        let rules = RuleSet::from_config(&cfg)?;
        for rule in rules.rules() {
            println!(
                "{}\tname~{:?}\tcmdline~{:?}",
                rule.key(),
                rule.name_contains.as_deref().unwrap_or("-"),
                rule.cmdline_contains.as_deref().unwrap_or("-"),
            );
        }
        println!("{} rules, config ok", rules.rules().len());
        return Ok(());
    }

    if !cfg.sinks.any_enabled() {
        warn!("no sinks enabled; snapshots will be computed and discarded");
    }
    if cfg.applications.is_empty() {
        warn!("rule table is empty; no process will be classified");
    }

    let hostname = cfg.resolved_hostname();
    let registry = Registry::new();
    let state = AppState::new(registry.clone(), &hostname);

    let host: Option<Box<dyn HostSource>> = Some(Box::new(SysinfoHost::new()));
    let pipeline = Pipeline::from_config(&cfg, Box::new(SysinfoTable::new()), host, &registry)
        .context("building pipeline")?;
    info!(
        host = %hostname,
        interval_secs = cfg.interval_secs,
        sinks = ?pipeline.sink_names(),
        "rolemon_agent starting"
    );

    if let Some(reg) = &cfg.sinks.registry {
        let addr: SocketAddr = format!("{}:{}", reg.bind, reg.port)
            .parse()
            .with_context(|| format!("bad registry bind address {}:{}", reg.bind, reg.port))?;
        let http_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = http::serve(addr, http_state).await {
                error!("metrics endpoint stopped: {e:#}");
            }
        });
    }

    // Registered up front so a Ctrl-C during a cycle is seen at the next idle boundary.
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(());
        }
    });
    let shutdown = async move {
        let _ = stop_rx.await;
    };

    let mut scheduler =
        Scheduler::new(pipeline, cfg.interval()).with_cycle_counter(state.cycles.clone());
    if parsed.once {
        scheduler = scheduler.with_max_cycles(1);
    }
    let (_, cycles) = scheduler.run(shutdown).await?;
    info!("rolemon_agent stopped after {cycles} cycles");
    Ok(())
}
