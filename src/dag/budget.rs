// src/dag/budget.rs

//! Global CPU / memory budget across running tasks.

use serde::{Deserialize, Serialize};

use crate::errors::{FlowError, Result};
use crate::task::Resources;

/// Configured ceilings. `None` means unlimited for that dimension.
///
/// Maps the `[budget]` config section:
///
/// ```toml
/// [budget]
/// cpus = 16
/// memory = 64000   # MB
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BudgetLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
}

impl BudgetLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn is_unlimited(&self) -> bool {
        self.cpus.is_none() && self.memory.is_none()
    }
}

/// Running usage against [`BudgetLimits`].
///
/// Owned by the scheduler; every acquire is paired with exactly one release
/// when the task's completion is processed.
#[derive(Debug, Clone)]
pub struct ResourceBudget {
    limits: BudgetLimits,
    cpus_in_use: u64,
    memory_in_use: u64,
}

impl ResourceBudget {
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            cpus_in_use: 0,
            memory_in_use: 0,
        }
    }

    pub fn limits(&self) -> BudgetLimits {
        self.limits
    }

    pub fn cpus_in_use(&self) -> u64 {
        self.cpus_in_use
    }

    pub fn memory_in_use(&self) -> u64 {
        self.memory_in_use
    }

    /// Whether `resources` can start now without exceeding any ceiling.
    pub fn fits(&self, resources: &Resources) -> bool {
        let cpus_ok = self
            .limits
            .cpus
            .is_none_or(|max| self.cpus_in_use + u64::from(resources.cpus) <= max);
        let memory_ok = self
            .limits
            .memory
            .is_none_or(|max| self.memory_in_use + resources.memory_mb <= max);
        cpus_ok && memory_ok
    }

    pub fn acquire(&mut self, resources: &Resources) -> Result<()> {
        if !self.fits(resources) {
            return Err(FlowError::InternalScheduling(format!(
                "admitting {} cpus / {} MB would exceed budget {:?} (in use: {} cpus / {} MB)",
                resources.cpus,
                resources.memory_mb,
                self.limits,
                self.cpus_in_use,
                self.memory_in_use
            )));
        }
        self.cpus_in_use += u64::from(resources.cpus);
        self.memory_in_use += resources.memory_mb;
        Ok(())
    }

    pub fn release(&mut self, resources: &Resources) -> Result<()> {
        let cpus = self.cpus_in_use.checked_sub(u64::from(resources.cpus));
        let memory = self.memory_in_use.checked_sub(resources.memory_mb);

        match (cpus, memory) {
            (Some(cpus), Some(memory)) => {
                self.cpus_in_use = cpus;
                self.memory_in_use = memory;
                Ok(())
            }
            _ => Err(FlowError::InternalScheduling(format!(
                "releasing {} cpus / {} MB underflows usage ({} cpus / {} MB)",
                resources.cpus, resources.memory_mb, self.cpus_in_use, self.memory_in_use
            ))),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.cpus_in_use == 0 && self.memory_in_use == 0
    }
}
