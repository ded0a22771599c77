// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{FlowConfig, RawConfigFile};
use crate::config::validate::validate_config;
use crate::errors::{FlowError, Result};

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "FLOW_";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; layering and validation happen
/// in [`load_layered`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Resolve configuration from the standard sources.
///
/// Lowest to highest priority:
/// 1. built-in defaults
/// 2. `$HOME/.config/flow/flow.toml` (if present)
/// 3. `local` (must exist when given)
/// 4. `FLOW_*` environment variables
/// 5. explicit `key=value` overrides
pub fn load_config(local: Option<&Path>, overrides: &[(String, String)]) -> Result<FlowConfig> {
    let user = user_config_path();
    load_layered(user.as_deref(), local, |name| std::env::var(name).ok(), overrides)
}

/// Same as [`load_config`] with every source supplied explicitly.
///
/// `env` looks up an environment variable by name.
pub fn load_layered<F>(
    user: Option<&Path>,
    local: Option<&Path>,
    env: F,
    overrides: &[(String, String)],
) -> Result<FlowConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = FlowConfig::default();

    if let Some(path) = user {
        if path.is_file() {
            debug!(path = %path.display(), "loading user config");
            cfg.merge(load_from_path(path)?);
        }
    }

    if let Some(path) = local {
        if !path.is_file() {
            return Err(FlowError::ConfigError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        debug!(path = %path.display(), "loading local config");
        cfg.merge(load_from_path(path)?);
    }

    apply_env(&mut cfg, env)?;

    for (key, value) in overrides {
        cfg.set(key, value)?;
    }

    validate_config(&cfg)?;
    Ok(cfg)
}

/// Apply `FLOW_<KEY>` variables for every known key.
///
/// `budget.cpus` maps to `FLOW_BUDGET_CPUS`, `resources.bwa.memory` to
/// `FLOW_RESOURCES_BWA_MEMORY`. Only analyses already present in `cfg`
/// are considered.
pub fn apply_env<F>(cfg: &mut FlowConfig, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    for key in cfg.known_keys() {
        let var = env_var_name(&key);
        if let Some(value) = env(&var) {
            debug!(%var, %key, "config value from environment");
            cfg.set(&key, &value)?;
        }
    }
    Ok(())
}

pub fn env_var_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace(['.', '-'], "_").to_uppercase())
}

/// Split a `key=value` override.
pub fn parse_override(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(FlowError::ConfigError(format!(
            "invalid override '{s}' (expected KEY=VALUE)"
        ))),
    }
}

/// `$HOME/.config/flow/flow.toml`, if `HOME` is set.
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("flow")
            .join("flow.toml")
    })
}
