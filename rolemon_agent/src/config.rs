//! Agent configuration: JSON file with the ordered application/role table and sink parameters.
//! Stored under XDG config dir: $XDG_CONFIG_HOME/rolemon/config.json (fallback ~/.config/rolemon/config.json)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
    #[error("interval_secs must be greater than zero")]
    ZeroInterval,
    #[error("application #{0} has an empty name")]
    EmptyAppName(usize),
    #[error("application {app:?} has a role with an empty name")]
    EmptyRoleName { app: String },
    #[error("role {key:?} has neither process_name nor cmdline")]
    NoPredicate { key: String },
    #[error("role {key:?} has an empty {field} substring")]
    EmptySubstring { key: String, field: &'static str },
    #[error("role key {0:?} is declared more than once")]
    DuplicateRole(String),
    #[error("line sink port must be non-zero")]
    ZeroLinePort,
    #[error("log sink path is empty")]
    EmptyLogPath,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuSampling {
    /// One CPU window per cycle shared by every matched process.
    #[default]
    Batched,
    /// One blocking CPU window per matched process.
    PerProcess,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmdline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<RoleConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySinkConfig {
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSinkConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSinkConfig {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinksConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistrySinkConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<LineSinkConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogSinkConfig>,
}

impl SinksConfig {
    pub fn any_enabled(&self) -> bool {
        self.registry.is_some() || self.line.is_some() || self.log.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_cpu_sample_ms")]
    pub cpu_sample_ms: u64,
    #[serde(default)]
    pub cpu_sampling: CpuSampling,
    #[serde(default = "default_true")]
    pub collect_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default)]
    pub applications: Vec<AppConfig>,
    #[serde(default)]
    pub sinks: SinksConfig,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_cpu_sample_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            cpu_sample_ms: default_cpu_sample_ms(),
            cpu_sampling: CpuSampling::default(),
            collect_host: true,
            hostname: None,
            applications: Vec::new(),
            sinks: SinksConfig::default(),
        }
    }
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("rolemon")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rolemon")
    }
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

impl AgentConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read, apply environment overrides and validate. Any error here is fatal at startup.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_json(&text)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_parse::<u64>("ROLEMON_INTERVAL_SECS")? {
            self.interval_secs = v;
        }
        if let Some(v) = env_parse::<u64>("ROLEMON_CPU_SAMPLE_MS")? {
            self.cpu_sample_ms = v;
        }
        if let Ok(v) = env::var("ROLEMON_HOSTNAME") {
            if !v.is_empty() {
                self.hostname = Some(v);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        let mut seen = HashSet::new();
        for (i, app) in self.applications.iter().enumerate() {
            if app.name.is_empty() {
                return Err(ConfigError::EmptyAppName(i));
            }
            for role in &app.roles {
                if role.name.is_empty() {
                    return Err(ConfigError::EmptyRoleName {
                        app: app.name.clone(),
                    });
                }
                let key = role_key(&app.name, &role.name);
                if role.process_name.is_none() && role.cmdline.is_none() {
                    return Err(ConfigError::NoPredicate { key });
                }
                if role.process_name.as_deref() == Some("") {
                    return Err(ConfigError::EmptySubstring {
                        key,
                        field: "process_name",
                    });
                }
                if role.cmdline.as_deref() == Some("") {
                    return Err(ConfigError::EmptySubstring {
                        key,
                        field: "cmdline",
                    });
                }
                if !seen.insert(key.clone()) {
                    return Err(ConfigError::DuplicateRole(key));
                }
            }
        }
        if let Some(line) = &self.sinks.line {
            if line.port == 0 {
                return Err(ConfigError::ZeroLinePort);
            }
        }
        if let Some(log) = &self.sinks.log {
            if log.path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyLogPath);
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_ms)
    }

    /// Configured hostname, else the OS hostname, else "unknown".
    pub fn resolved_hostname(&self) -> String {
        self.hostname.clone().unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|s| s.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string())
        })
    }
}

pub fn role_key(app: &str, role: &str) -> String {
    format!("{app}_{role}")
}

fn env_parse<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
        Err(_) => Ok(None),
    }
}
