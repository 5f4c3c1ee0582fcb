//! Reconciler tying planning to persistent state.
//!
//! The reconciler loads recorded state from a [`StateStore`], plans
//! resource instances against it, and applies plans under the state lock.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::planner::{Action, ApplyResult, CustomizeDiffFn, PlanExecutor, Planner, ResourcePlan};
use crate::schema::Block;
use crate::state::{LockInfo, StateFile, StateStore};
use crate::value::Value;

/// Reconciler for one resource schema.
pub struct Reconciler<'a, S: StateStore> {
    /// Resource schema.
    block: &'a Block,
    /// State store.
    state_store: &'a S,
    /// Customization hooks passed to every planner.
    hooks: Vec<CustomizeDiffFn>,
    /// Schema version recorded in new state.
    schema_version: u64,
    /// Lock holder name; empty for a generated one.
    lock_holder: String,
    /// Whether apply takes the state lock.
    lock: bool,
    /// Apply plans made against a different schema.
    allow_schema_change: bool,
    /// Maximum lock acquisition attempts.
    max_attempts: u32,
}

/// Report of drift between configuration and recorded state.
#[derive(Debug, serde::Serialize)]
pub struct DriftReport {
    /// Resource instance address.
    pub addr: String,
    /// Action a plan would take.
    pub action: Action,
    /// Flat keys that would change.
    pub changed_keys: Vec<String>,
}

impl<'a, S: StateStore> Reconciler<'a, S> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(block: &'a Block, state_store: &'a S) -> Self {
        Self {
            block,
            state_store,
            hooks: Vec::new(),
            schema_version: 0,
            lock_holder: String::new(),
            lock: true,
            allow_schema_change: false,
            max_attempts: 3,
        }
    }

    /// Adds a customization hook.
    #[must_use]
    pub fn with_customize_diff(mut self, hook: CustomizeDiffFn) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Sets the schema version recorded in new state.
    #[must_use]
    pub const fn with_schema_version(mut self, schema_version: u64) -> Self {
        self.schema_version = schema_version;
        self
    }

    /// Sets the lock holder name.
    #[must_use]
    pub fn with_lock_holder(mut self, holder: impl Into<String>) -> Self {
        self.lock_holder = holder.into();
        self
    }

    /// Sets whether apply takes the state lock.
    #[must_use]
    pub const fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    /// Sets whether plans made against another schema may be applied.
    #[must_use]
    pub const fn with_allow_schema_change(mut self, allow: bool) -> Self {
        self.allow_schema_change = allow;
        self
    }

    /// Sets the maximum lock acquisition attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    fn planner(&self) -> Planner<'a> {
        Planner::new(self.block)
            .with_schema_version(self.schema_version)
            .with_hooks(self.hooks.iter().cloned())
    }

    async fn load_state(&self) -> Result<StateFile> {
        self.state_store.load_or_new().await
    }

    /// Plans the resource at `addr` against recorded state.
    ///
    /// # Errors
    ///
    /// Returns an error if state cannot be loaded or planning fails.
    pub async fn plan(&self, addr: &str, config: &Value) -> Result<ResourcePlan> {
        info!("Planning {}", addr);
        let state = self.load_state().await?;
        self.planner().plan(addr, state.instance(addr), config)
    }

    /// Reports whether recorded state has drifted from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if planning fails.
    pub async fn check_drift(&self, addr: &str, config: &Value) -> Result<DriftReport> {
        let plan = self.plan(addr, config).await?;
        Ok(DriftReport {
            addr: addr.to_string(),
            action: plan.action(),
            changed_keys: plan
                .diff
                .attributes
                .iter()
                .filter(|(_, d)| !d.is_empty())
                .map(|(k, _)| k.clone())
                .collect(),
        })
    }

    async fn acquire_lock(&self) -> Result<LockInfo> {
        let mut attempt = 1;
        loop {
            match self.state_store.acquire_lock(&self.lock_holder, "apply").await {
                Ok(lock) => return Ok(lock),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = err.retry_delay_secs().unwrap_or(2);
                    warn!(
                        "Lock attempt {}/{} failed: {} (retrying in {}s)",
                        attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Applies `plan`, saving the resulting state.
    ///
    /// The state lock is held for the whole apply and always released.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken, the plan no longer
    /// matches the recorded state, or state cannot be saved.
    pub async fn apply(&self, plan: &ResourcePlan) -> Result<ApplyResult> {
        if !self.lock {
            return self.apply_unlocked(plan).await;
        }

        let lock = self.acquire_lock().await?;
        debug!("Holding state lock {}", lock);

        let result = self.apply_unlocked(plan).await;

        if let Err(e) = self.state_store.release_lock(&lock.lock_id).await {
            error!("Failed to release state lock: {}", e);
            if result.is_ok() {
                return Err(e);
            }
        }
        result
    }

    async fn apply_unlocked(&self, plan: &ResourcePlan) -> Result<ApplyResult> {
        let mut state = self.load_state().await?;
        let planner = self.planner();
        let executor = PlanExecutor::new(&planner).with_allow_schema_change(self.allow_schema_change);

        let result = executor.apply(plan, state.instance(&plan.addr))?;

        if result.action == Action::NoOp {
            info!("No changes for {}", plan.addr);
            return Ok(result);
        }

        match &result.state {
            Some(instance) => state.set_instance(&plan.addr, instance.clone()),
            None => {
                state.remove_instance(&plan.addr);
            }
        }
        state.bump_serial();
        self.state_store.save(&state).await?;

        Ok(result)
    }

    /// Removes the resource at `addr` from state without planning.
    ///
    /// Returns false if nothing was recorded at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if state cannot be loaded or saved.
    pub async fn forget(&self, addr: &str) -> Result<bool> {
        let mut state = self.load_state().await?;
        if state.remove_instance(addr).is_none() {
            return Ok(false);
        }
        state.bump_serial();
        self.state_store.save(&state).await?;
        info!("Removed {} from state", addr);
        Ok(true)
    }
}

impl std::fmt::Display for DriftReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.changed_keys.is_empty() && self.action == Action::NoOp {
            return write!(f, "{}: no drift detected", self.addr);
        }
        writeln!(f, "{}: drift detected ({})", self.addr, self.action)?;
        for key in &self.changed_keys {
            writeln!(f, "  - {key}")?;
        }
        Ok(())
    }
}
