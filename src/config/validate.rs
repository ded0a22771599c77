// src/config/validate.rs

use crate::config::model::FlowConfig;
use crate::errors::{FlowError, Result};
use crate::types::JobRunner;

/// Sanity checks on the resolved configuration.
///
/// Per-analysis resources are *not* checked here; incomplete specs are
/// only an error for analyses a workflow actually uses, and that is the
/// resource validator's job.
pub fn validate_config(cfg: &FlowConfig) -> Result<()> {
    validate_budget(cfg)?;
    validate_paths(cfg)?;
    Ok(())
}

fn validate_budget(cfg: &FlowConfig) -> Result<()> {
    if cfg.budget.cpus == Some(0) {
        return Err(FlowError::ConfigError(
            "[budget].cpus must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.budget.memory == Some(0) {
        return Err(FlowError::ConfigError(
            "[budget].memory must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_paths(cfg: &FlowConfig) -> Result<()> {
    if cfg.config.flowdir.as_os_str().is_empty() {
        return Err(FlowError::ConfigError(
            "[config].flowdir must not be empty".to_string(),
        ));
    }

    let bin = match cfg.config.job_runner {
        JobRunner::Local => None,
        JobRunner::Singularity => Some(("singularity_bin", &cfg.config.singularity_bin)),
        JobRunner::Docker => Some(("docker_bin", &cfg.config.docker_bin)),
    };
    if let Some((key, value)) = bin {
        if value.trim().is_empty() {
            return Err(FlowError::ConfigError(format!(
                "[config].{key} must not be empty for job_runner = {:?}",
                cfg.config.job_runner
            )));
        }
    }

    Ok(())
}
