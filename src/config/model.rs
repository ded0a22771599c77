// src/config/model.rs

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dag::budget::BudgetLimits;
use crate::errors::{FlowError, Result};
use crate::task::ResourceSpec;
use crate::types::{FailurePolicy, JobRunner};

/// Resolved configuration, built once per process and passed by reference.
///
/// Produced by layering (see [`crate::config::loader`]):
///
/// ```toml
/// [config]
/// flowdir = ".flow"
/// job_runner = "singularity"
/// failure_policy = "fail-fast"
///
/// [budget]
/// cpus = 16
/// memory = 64000
///
/// [resources.bwa]
/// cpus = 8
/// memory = 16000
/// time = 120
/// container = "docker://biocontainers/bwa"
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowConfig {
    pub config: ConfigSection,
    pub budget: BudgetLimits,
    /// Resource requests keyed by analysis name.
    pub resources: BTreeMap<String, ResourceSpec>,
}

/// `[config]` section with defaults applied.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSection {
    /// Working directory for run artefacts (task logs).
    pub flowdir: PathBuf,
    pub job_runner: JobRunner,
    pub singularity_bin: String,
    pub docker_bin: String,
    pub failure_policy: FailurePolicy,
    /// Recognised and persisted; the engine keeps no state between runs.
    pub start_from_scratch: bool,
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            flowdir: PathBuf::from(".flow"),
            job_runner: JobRunner::default(),
            singularity_bin: "singularity".to_string(),
            docker_bin: "docker".to_string(),
            failure_policy: FailurePolicy::default(),
            start_from_scratch: false,
        }
    }
}

/// One config file as read from disk. Every field is optional so that
/// files can be layered on top of each other.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: RawConfigSection,

    #[serde(default)]
    pub budget: BudgetLimits,

    #[serde(default)]
    pub resources: BTreeMap<String, ResourceSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigSection {
    #[serde(default)]
    pub flowdir: Option<PathBuf>,
    #[serde(default)]
    pub job_runner: Option<JobRunner>,
    #[serde(default)]
    pub singularity_bin: Option<String>,
    #[serde(default)]
    pub docker_bin: Option<String>,
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
    #[serde(default)]
    pub start_from_scratch: Option<bool>,
}

impl FlowConfig {
    /// Layer a file on top of the current values; fields set in `raw` win.
    pub fn merge(&mut self, raw: RawConfigFile) {
        let RawConfigFile {
            config,
            budget,
            resources,
        } = raw;

        if let Some(v) = config.flowdir {
            self.config.flowdir = v;
        }
        if let Some(v) = config.job_runner {
            self.config.job_runner = v;
        }
        if let Some(v) = config.singularity_bin {
            self.config.singularity_bin = v;
        }
        if let Some(v) = config.docker_bin {
            self.config.docker_bin = v;
        }
        if let Some(v) = config.failure_policy {
            self.config.failure_policy = v;
        }
        if let Some(v) = config.start_from_scratch {
            self.config.start_from_scratch = v;
        }

        self.budget.cpus = budget.cpus.or(self.budget.cpus);
        self.budget.memory = budget.memory.or(self.budget.memory);

        for (name, spec) in resources {
            let merged = match self.resources.get(&name) {
                Some(existing) => existing.overlay(&spec),
                None => spec,
            };
            self.resources.insert(name, merged);
        }
    }

    /// Resource request configured for an analysis (possibly incomplete).
    pub fn resources_for(&self, analysis_name: &str) -> ResourceSpec {
        self.resources
            .get(analysis_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Directory receiving per-task stdout/stderr logs.
    pub fn log_dir(&self) -> PathBuf {
        self.config.flowdir.join("logs")
    }

    /// Every dotted key that [`FlowConfig::set`] accepts for the current
    /// set of known analyses.
    pub fn known_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = [
            "flowdir",
            "job_runner",
            "singularity_bin",
            "docker_bin",
            "failure_policy",
            "start_from_scratch",
            "budget.cpus",
            "budget.memory",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        for name in self.resources.keys() {
            for field in ["cpus", "memory", "time", "container", "extra_args"] {
                keys.push(format!("resources.{name}.{field}"));
            }
        }

        keys
    }

    /// Set a single value by dotted key, e.g. `budget.cpus` or
    /// `resources.bwa.memory`. `config.` prefixes are accepted for the
    /// `[config]` keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.trim();
        let value = value.trim();
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["flowdir"] | ["config", "flowdir"] => {
                self.config.flowdir = PathBuf::from(value);
            }
            ["job_runner"] | ["config", "job_runner"] => {
                self.config.job_runner = JobRunner::from_str(value).map_err(FlowError::ConfigError)?;
            }
            ["singularity_bin"] | ["config", "singularity_bin"] => {
                self.config.singularity_bin = value.to_string();
            }
            ["docker_bin"] | ["config", "docker_bin"] => {
                self.config.docker_bin = value.to_string();
            }
            ["failure_policy"] | ["config", "failure_policy"] => {
                self.config.failure_policy =
                    FailurePolicy::from_str(value).map_err(FlowError::ConfigError)?;
            }
            ["start_from_scratch"] | ["config", "start_from_scratch"] => {
                self.config.start_from_scratch = value.parse::<bool>().map_err(|_| {
                    FlowError::ConfigError(format!("'{key}' expects true or false, got '{value}'"))
                })?;
            }
            ["budget", "cpus"] => self.budget.cpus = Some(parse_number(key, value)?),
            ["budget", "memory"] => self.budget.memory = Some(parse_number(key, value)?),
            ["resources", name, field] => {
                let spec = self.resources.entry(name.to_string()).or_default();
                match *field {
                    "cpus" => spec.cpus = Some(parse_number(key, value)?),
                    "memory" => spec.memory = Some(parse_number(key, value)?),
                    "time" => spec.time = Some(parse_number(key, value)?),
                    "container" => spec.container = Some(value.to_string()),
                    "extra_args" => spec.extra_args = Some(value.to_string()),
                    other => {
                        return Err(FlowError::ConfigError(format!(
                            "unknown resource field '{other}' in key '{key}'"
                        )));
                    }
                }
            }
            _ => {
                return Err(FlowError::ConfigError(format!(
                    "unknown configuration key '{key}'"
                )));
            }
        }

        Ok(())
    }

    /// Write the resolved configuration to `path` as TOML.
    ///
    /// Never overwrites: an existing file at `path` is a `ConfigError` and
    /// is left untouched.
    pub fn write_config_as(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string(self).map_err(|e| {
            FlowError::ConfigError(format!("cannot serialize configuration: {e}"))
        })?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(FlowError::ConfigError(format!(
                    "refusing to overwrite existing config file: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(contents.as_bytes())?;

        info!(path = %path.display(), "configuration written");
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        FlowError::ConfigError(format!("'{key}' expects a non-negative integer, got '{value}'"))
    })
}
