//! Tool configuration types.
//!
//! These structs map to the optional `schemaplan.yaml` file. Every field
//! has a default, so an absent or empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// The root tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolConfig {
    /// State storage configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Planning configuration.
    #[serde(default)]
    pub plan: PlanConfig,
}

/// State storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Directory holding the state file and its lock.
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
    /// Lock holder name; a process identifier is generated when unset.
    #[serde(default)]
    pub lock_holder: Option<String>,
    /// Whether apply locks the state.
    #[serde(default = "default_lock")]
    pub lock: bool,
}

/// Planning configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanConfig {
    /// Where `plan` writes the plan file.
    #[serde(default = "default_plan_out")]
    pub out: PathBuf,
    /// Schema version recorded in planned state.
    #[serde(default)]
    pub schema_version: u64,
    /// Apply plans even when the schema changed since planning.
    #[serde(default)]
    pub allow_schema_change: bool,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(crate::state::STATE_DIR)
}

const fn default_lock() -> bool {
    true
}

fn default_plan_out() -> PathBuf {
    PathBuf::from("schemaplan.plan.json")
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            lock_holder: None,
            lock: default_lock(),
        }
    }
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            out: default_plan_out(),
            schema_version: 0,
            allow_schema_change: false,
        }
    }
}

impl ToolConfig {
    /// Checks field values that deserialization cannot.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.state.dir.as_os_str().is_empty() {
            return Err(ConfigError::validation("state directory must not be empty", "state.dir").into());
        }
        if self.plan.out.as_os_str().is_empty() {
            return Err(ConfigError::validation("plan output path must not be empty", "plan.out").into());
        }
        if self
            .state
            .lock_holder
            .as_deref()
            .is_some_and(|h| h.trim().is_empty())
        {
            return Err(ConfigError::validation(
                "lock holder must not be blank",
                "state.lock_holder",
            )
            .into());
        }
        Ok(())
    }
}
