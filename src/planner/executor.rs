//! Plan executor.
//!
//! Applying a plan re-plans against the current state and only proceeds
//! when the fresh diff is compatible with the one that was reviewed.

use tracing::{debug, info, warn};

use crate::config::ContentHasher;
use crate::error::{PlanError, Result};
use crate::legacy::InstanceState;
use crate::value::Value;

use super::change::Action;
use super::plan::{Planner, ResourcePlan};

/// Executor for resource plans.
pub struct PlanExecutor<'a> {
    /// Planner used to re-plan at apply time.
    planner: &'a Planner<'a>,
    /// Apply even when the schema changed since planning.
    allow_schema_change: bool,
}

/// Result of applying one plan.
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// Resource instance address.
    pub addr: String,
    /// Action that was applied.
    pub action: Action,
    /// New state of the instance; `None` once deleted.
    pub state: Option<InstanceState>,
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(planner: &'a Planner<'a>) -> Self {
        Self {
            planner,
            allow_schema_change: false,
        }
    }

    /// Sets whether a schema change between plan and apply is tolerated.
    #[must_use]
    pub const fn with_allow_schema_change(mut self, allow: bool) -> Self {
        self.allow_schema_change = allow;
        self
    }

    /// Applies `plan` on top of `current`.
    ///
    /// Unknown values stay as placeholders in the resulting state until the
    /// provider reports them.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema changed since planning, or if the
    /// diff computed now does not match the planned diff.
    pub fn apply(&self, plan: &ResourcePlan, current: Option<&InstanceState>) -> Result<ApplyResult> {
        info!("Applying plan for {} ({})", plan.addr, plan.action());

        let schema_hash = self.planner.schema_hash();
        if !ContentHasher::hashes_match(&schema_hash, &plan.schema_hash) {
            if !self.allow_schema_change {
                return Err(PlanError::SchemaMismatch {
                    expected: plan.schema_hash.clone(),
                    found: schema_hash,
                }
                .into());
            }
            warn!("Schema changed since plan was created, applying anyway");
        }

        let config = Value::from_json(&plan.config, &self.planner.block().implied_type())?;
        let fresh = self.planner.plan(&plan.addr, current, &config)?;

        let (same, reason) = plan.diff.same(&fresh.diff);
        if !same {
            warn!("Planned diff for {} no longer matches: {}", plan.addr, reason);
            return Err(PlanError::DiffChanged { reason }.into());
        }
        debug!("Fresh diff for {} matches the plan", plan.addr);

        let action = fresh.action();
        let base = current.map(|s| s.attributes.clone()).unwrap_or_default();
        let state = if action == Action::Delete {
            None
        } else {
            fresh.planned_state.map(|mut state| {
                state.attributes = fresh.diff.apply(&base);
                state
            })
        };

        info!("Applied {} to {}", action, plan.addr);
        Ok(ApplyResult {
            addr: plan.addr.clone(),
            action,
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaPlanError;
    use crate::schema::{Attribute, Block};
    use crate::value::{Type, UNKNOWN_VALUE};

    fn block() -> Block {
        Block::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_attribute("name", Attribute::required(Type::String))
            .with_attribute("tags", Attribute::optional(Type::list(Type::String)))
    }

    fn config(name: &str) -> Value {
        Value::object([("name", Value::string(name))])
    }

    #[test]
    fn test_apply_create() {
        let block = block();
        let planner = Planner::new(&block);
        let plan = planner.plan("res.a", None, &config("a")).expect("plan");

        let result = PlanExecutor::new(&planner).apply(&plan, None).expect("apply");
        assert_eq!(result.action, Action::Create);
        let state = result.state.expect("state");
        assert_eq!(state.attributes.get("name").map(String::as_str), Some("a"));
        assert_eq!(state.attributes.get("id").map(String::as_str), Some(UNKNOWN_VALUE));
    }

    #[test]
    fn test_apply_detects_drift() {
        let block = block();
        let planner = Planner::new(&block);

        let mut state = InstanceState::default();
        state.id = String::from("i-1");
        state.attributes.insert(String::from("id"), String::from("i-1"));
        state.attributes.insert(String::from("name"), String::from("a"));

        let plan = planner.plan("res.a", Some(&state), &config("b")).expect("plan");

        // the resource changed between plan and apply
        state.attributes.insert(String::from("name"), String::from("z"));
        let err = PlanExecutor::new(&planner)
            .apply(&plan, Some(&state))
            .expect_err("drift");
        assert!(matches!(err, SchemaPlanError::Plan(PlanError::DiffChanged { .. })));
        assert!(err.to_string().contains("diffs didn't match during apply"));
    }

    #[test]
    fn test_apply_rejects_schema_change() {
        let block = block();
        let plan = Planner::new(&block).plan("res.a", None, &config("a")).expect("plan");

        let changed = block.clone().with_attribute("extra", Attribute::optional(Type::Bool));
        let planner = Planner::new(&changed);
        let err = PlanExecutor::new(&planner).apply(&plan, None).expect_err("schema");
        assert!(matches!(err, SchemaPlanError::Plan(PlanError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_apply_delete() {
        let block = block();
        let planner = Planner::new(&block);
        let mut state = InstanceState::default();
        state.id = String::from("i-1");
        state.attributes.insert(String::from("id"), String::from("i-1"));
        state.attributes.insert(String::from("name"), String::from("a"));

        let plan = planner
            .plan("res.a", Some(&state), &Value::Null(block.implied_type()))
            .expect("plan");
        let result = PlanExecutor::new(&planner).apply(&plan, Some(&state)).expect("apply");
        assert_eq!(result.action, Action::Delete);
        assert!(result.state.is_none());
    }

    #[test]
    fn test_apply_recounts_lists() {
        let block = block();
        let planner = Planner::new(&block);
        let mut state = InstanceState::default();
        state.id = String::from("i-1");
        for (k, v) in [("id", "i-1"), ("name", "a"), ("tags.#", "2"), ("tags.0", "x"), ("tags.1", "y")] {
            state.attributes.insert(k.to_string(), v.to_string());
        }
        let config = Value::object([
            ("name", Value::string("a")),
            ("tags", Value::list(Type::String, vec![Value::string("x")])),
        ]);

        let plan = planner.plan("res.a", Some(&state), &config).expect("plan");
        let result = PlanExecutor::new(&planner).apply(&plan, Some(&state)).expect("apply");
        let attrs = result.state.expect("state").attributes;
        assert_eq!(attrs.get("tags.#").map(String::as_str), Some("1"));
        assert!(!attrs.contains_key("tags.1"));
    }
}
