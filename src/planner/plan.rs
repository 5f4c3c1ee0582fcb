//! Resource plan construction.
//!
//! The [`Planner`] turns a configuration and the recorded state of one
//! resource instance into a [`ResourcePlan`]: the flat diff, the change
//! descriptor and the state expected after apply.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ContentHasher;
use crate::error::Result;
use crate::legacy::{
    InstanceDiff, InstanceState, ResourceAttrDiff, SCHEMA_VERSION_KEY, flatmap_from_block_value,
    requires_replace,
};
use crate::schema::Block;
use crate::value::{Type, UNKNOWN_VALUE, Value};

use super::change::{Action, Change, ResourceInstanceChange, ResourceInstanceChangeSrc};
use super::customize::{CustomizeDiffFn, ResourceDiffBuilder, under};
use super::proposed::{proposed_new_object, set_unknowns};

/// A plan for one resource instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Resource instance address.
    pub addr: String,
    /// Hash of the schema the plan was made against.
    pub schema_hash: String,
    /// Hash of the coerced configuration.
    pub config_hash: String,
    /// Coerced configuration, replayed at apply time.
    pub config: serde_json::Value,
    /// Flat diff against the prior state.
    pub diff: InstanceDiff,
    /// Change descriptor.
    pub change: ResourceInstanceChangeSrc,
    /// State expected after apply; absent when the instance goes away.
    #[serde(default)]
    pub planned_state: Option<InstanceState>,
}

/// Plans changes to resource instances of one schema.
pub struct Planner<'a> {
    /// Resource schema.
    block: &'a Block,
    /// Schema version recorded in planned state.
    schema_version: u64,
    /// Customization hooks, run in order.
    hooks: Vec<CustomizeDiffFn>,
    /// Schema and configuration hasher.
    hasher: ContentHasher,
}

impl<'a> Planner<'a> {
    /// Creates a planner for `block`.
    #[must_use]
    pub const fn new(block: &'a Block) -> Self {
        Self {
            block,
            schema_version: 0,
            hooks: Vec::new(),
            hasher: ContentHasher::new(),
        }
    }

    /// Sets the schema version recorded in planned state.
    #[must_use]
    pub const fn with_schema_version(mut self, schema_version: u64) -> Self {
        self.schema_version = schema_version;
        self
    }

    /// Adds a customization hook.
    #[must_use]
    pub fn with_customize_diff(mut self, hook: CustomizeDiffFn) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Adds several customization hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = CustomizeDiffFn>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// The schema this planner plans against.
    #[must_use]
    pub const fn block(&self) -> &'a Block {
        self.block
    }

    /// Hash of the schema.
    #[must_use]
    pub fn schema_hash(&self) -> String {
        self.hasher.hash_block(self.block)
    }

    /// Plans the change from `prior` to `config`.
    ///
    /// A null configuration plans the destruction of the instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not conform to the schema,
    /// the prior state cannot be decoded, or a customization hook fails.
    pub fn plan(
        &self,
        addr: &str,
        prior: Option<&InstanceState>,
        config: &Value,
    ) -> Result<ResourcePlan> {
        let ty = self.block.implied_type();
        let config = self.block.coerce_value(config)?;

        let prior = prior.filter(|state| !state.is_empty());
        let prior_value = match prior {
            Some(state) => state.to_value(self.block)?,
            None => Value::Null(ty.clone()),
        };
        let empty = InstanceState::default();
        let prior_state = prior.unwrap_or(&empty);

        if config.is_null() {
            return Ok(self.plan_destroy(addr, prior_state, prior_value, &config, &ty));
        }

        let tainted = prior_state.tainted;
        if tainted {
            debug!("Instance {} is tainted and will be replaced", addr);
        }
        let base = if tainted {
            Value::Null(ty.clone())
        } else {
            prior_value.clone()
        };
        let mut planned = set_unknowns(self.block, &proposed_new_object(self.block, &base, &config));
        let mut diff = InstanceDiff::between(
            self.block,
            &prior_state.attributes,
            &flatmap_from_block_value(&planned, self.block),
        );
        diff.destroy_tainted = tainted && prior.is_some();

        let config_flat = flatmap_from_block_value(&config, self.block);
        let mut updated = BTreeSet::new();
        if !self.hooks.is_empty() {
            let mut builder = ResourceDiffBuilder::new(self.block, prior_state, &config_flat, diff);
            for hook in &self.hooks {
                hook(&mut builder)?;
            }
            (diff, updated) = builder.into_parts();
        }

        let replacing = prior.is_some() && (tainted || diff.requires_new());
        if prior.is_some() && !tainted && diff.requires_new() {
            debug!("Change to {} forces replacement", addr);
            let kept: Vec<(String, ResourceAttrDiff)> = diff
                .attributes
                .iter()
                .filter(|(k, d)| d.requires_new || updated.iter().any(|u: &String| under(k, u)))
                .map(|(k, d)| (k.clone(), d.clone()))
                .collect();

            planned = set_unknowns(
                self.block,
                &proposed_new_object(self.block, &Value::Null(ty.clone()), &config),
            );
            let mut replacement = InstanceDiff::between(
                self.block,
                &prior_state.attributes,
                &flatmap_from_block_value(&planned, self.block),
            );
            replacement.attributes.extend(kept);
            replacement.destroy = true;
            diff = replacement;
        }

        let replace_keys: Vec<&str> = diff
            .attributes
            .iter()
            .filter(|(_, d)| d.requires_new)
            .map(|(k, _)| k.as_str())
            .collect();
        let required_replace = requires_replace(replace_keys, &ty)?;

        let mut planned_state = prior_state.merge_diff(&diff);
        planned_state.tainted = false;
        planned_state.meta.insert(
            SCHEMA_VERSION_KEY.to_string(),
            serde_json::Value::from(self.schema_version.to_string()),
        );
        if replacing {
            planned_state.id.clear();
        }
        if let Some(id) = planned_state.attributes.get("id")
            && id != UNKNOWN_VALUE
        {
            planned_state.id = id.clone();
        }

        let after = if updated.is_empty() {
            planned
        } else {
            planned_state.to_value(self.block)?
        };

        let mut change = Change::from_values(prior_value, after, &required_replace);
        if tainted && prior.is_some() {
            change.action = Action::DeleteThenCreate;
        } else if prior.is_some() && diff.attributes.values().all(ResourceAttrDiff::is_empty) {
            change.action = Action::NoOp;
        }

        Ok(self.finish(addr, &config, &ty, diff, change, required_replace, Some(planned_state)))
    }

    fn plan_destroy(
        &self,
        addr: &str,
        prior: &InstanceState,
        prior_value: Value,
        config: &Value,
        ty: &Type,
    ) -> ResourcePlan {
        let mut diff = InstanceDiff::new();
        diff.destroy = !prior.is_empty();
        let change = Change::from_values(prior_value, Value::Null(ty.clone()), &Default::default());
        self.finish(addr, config, ty, diff, change, Default::default(), None)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        addr: &str,
        config: &Value,
        ty: &Type,
        diff: InstanceDiff,
        change: Change,
        required_replace: crate::value::PathSet,
        planned_state: Option<InstanceState>,
    ) -> ResourcePlan {
        info!(
            "Planned {} for {} ({} attribute changes)",
            change.action,
            addr,
            diff.attributes.len()
        );

        let change = ResourceInstanceChange {
            addr: addr.to_string(),
            change,
            required_replace,
        };

        ResourcePlan {
            created_at: Utc::now(),
            addr: addr.to_string(),
            schema_hash: self.hasher.hash_block(self.block),
            config_hash: self.hasher.hash_value(config),
            config: config.to_json(),
            diff,
            change: change.encode(ty),
            planned_state,
        }
    }
}

impl ResourcePlan {
    /// The planned action.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.change.change.action
    }

    /// Returns true if applying the plan changes anything.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.action() != Action::NoOp
    }

    /// Decodes the change descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorded objects are malformed.
    pub fn decode_change(&self) -> Result<ResourceInstanceChange> {
        Ok(self.change.decode()?)
    }
}

fn render_attr(diff: &ResourceAttrDiff) -> String {
    if diff.sensitive {
        return String::from("(sensitive)");
    }
    let old = if diff.old.is_empty() {
        String::from("\"\"")
    } else {
        format!("{:?}", diff.old)
    };
    if diff.new_removed {
        format!("{old} => null")
    } else if diff.new_computed {
        format!("{old} => (known after apply)")
    } else {
        format!("{old} => {:?}", diff.new)
    }
}

impl std::fmt::Display for ResourcePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = self.action();
        if action == Action::NoOp {
            return write!(f, "{}: no changes", self.addr);
        }

        writeln!(f, "{} {} ({action}):", action.symbol(), self.addr)?;
        for (key, diff) in &self.diff.attributes {
            write!(f, "    {key}: {}", render_attr(diff))?;
            if diff.requires_new {
                write!(f, " (forces replacement)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::customize::force_new_if_change;
    use crate::schema::{Attribute, NestedBlock, NestingMode};

    fn block() -> Block {
        Block::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_attribute("name", Attribute::required(Type::String))
            .with_attribute("size", Attribute::optional(Type::Number))
            .with_attribute("zone", Attribute::optional_computed(Type::String))
    }

    fn config(name: &str, size: i64) -> Value {
        Value::object([
            ("name", Value::string(name)),
            ("size", Value::number(size)),
        ])
    }

    fn existing() -> InstanceState {
        let mut state = InstanceState::default();
        state.id = String::from("i-1");
        for (k, v) in [("id", "i-1"), ("name", "web"), ("size", "1"), ("zone", "z1")] {
            state.attributes.insert(k.to_string(), v.to_string());
        }
        state
    }

    #[test]
    fn test_plan_create() {
        let block = block();
        let plan = Planner::new(&block)
            .plan("res.web", None, &config("web", 1))
            .expect("plan");

        assert_eq!(plan.action(), Action::Create);
        let id = plan.diff.get_attribute("id").expect("id diff");
        assert!(id.new_computed);
        assert_eq!(plan.diff.get_attribute("name").map(|d| d.new.as_str()), Some("web"));

        let change = plan.decode_change().expect("decode");
        assert!(change.change.before.is_null());
        assert_eq!(
            change.change.after.get_attr("zone"),
            Some(&Value::Unknown(Type::String))
        );
    }

    #[test]
    fn test_plan_no_changes() {
        let block = block();
        let state = existing();
        let plan = Planner::new(&block)
            .plan("res.web", Some(&state), &config("web", 1))
            .expect("plan");

        assert_eq!(plan.action(), Action::NoOp);
        assert!(!plan.has_changes());
        assert!(plan.diff.attributes.is_empty());
    }

    #[test]
    fn test_plan_update_keeps_computed() {
        let block = block();
        let state = existing();
        let plan = Planner::new(&block)
            .plan("res.web", Some(&state), &config("web", 2))
            .expect("plan");

        assert_eq!(plan.action(), Action::Update);
        assert_eq!(plan.diff.attributes.len(), 1);
        let planned = plan.planned_state.expect("planned state");
        assert_eq!(planned.id, "i-1");
        assert_eq!(planned.attributes.get("zone").map(String::as_str), Some("z1"));
        assert_eq!(planned.attributes.get("size").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_plan_destroy() {
        let block = block();
        let state = existing();
        let plan = Planner::new(&block)
            .plan("res.web", Some(&state), &Value::Null(block.implied_type()))
            .expect("plan");

        assert_eq!(plan.action(), Action::Delete);
        assert!(plan.diff.destroy);
        assert!(plan.planned_state.is_none());
    }

    #[test]
    fn test_plan_replace_via_hook() {
        let block = block();
        let state = existing();
        let plan = Planner::new(&block)
            .with_customize_diff(force_new_if_change("name", |_, _| true))
            .plan("res.web", Some(&state), &config("db", 1))
            .expect("plan");

        assert_eq!(plan.action(), Action::DeleteThenCreate);
        assert!(plan.diff.destroy);
        assert!(plan.diff.get_attribute("name").is_some_and(|d| d.requires_new));
        assert!(plan.diff.get_attribute("id").is_some_and(|d| d.new_computed));

        let change = plan.decode_change().expect("decode");
        let paths: Vec<String> = change.required_replace.iter().map(ToString::to_string).collect();
        assert_eq!(paths, vec![".name"]);
    }

    #[test]
    fn test_plan_tainted_is_replaced() {
        let block = block();
        let mut state = existing();
        state.tainted = true;
        let plan = Planner::new(&block)
            .plan("res.web", Some(&state), &config("web", 1))
            .expect("plan");

        assert_eq!(plan.action(), Action::DeleteThenCreate);
        assert!(plan.diff.destroy_tainted);
    }

    #[test]
    fn test_plan_rejects_bad_config() {
        let block = block();
        let err = Planner::new(&block)
            .plan("res.web", None, &Value::object([("size", Value::number(1))]))
            .expect_err("name is required");
        assert!(err.to_string().contains("attribute \"name\" is required"));
    }

    #[test]
    fn test_plan_nested_list() {
        let disk = Block::new()
            .with_attribute("size", Attribute::required(Type::Number))
            .with_attribute("serial", Attribute::computed(Type::String));
        let block = block().with_block_type("disk", NestedBlock::new(NestingMode::List, disk));
        let config = Value::object([
            ("name", Value::string("web")),
            (
                "disk",
                Value::Tuple(vec![Value::object([("size", Value::number(10))])]),
            ),
        ]);

        let plan = Planner::new(&block).plan("res.web", None, &config).expect("plan");
        assert_eq!(plan.diff.get_attribute("disk.#").map(|d| d.new.as_str()), Some("1"));
        assert_eq!(plan.diff.get_attribute("disk.0.size").map(|d| d.new.as_str()), Some("10"));
        assert!(plan.diff.get_attribute("disk.0.serial").is_some_and(|d| d.new_computed));
    }

    #[test]
    fn test_plan_dynamic_attribute_replans() {
        let block = Block::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_attribute("any", Attribute::optional(Type::Dynamic));
        let config = |any: serde_json::Value| {
            block
                .coerce_value(&Value::from_json_inferred(&serde_json::json!({ "any": any })))
                .expect("coerce")
        };
        let planner = Planner::new(&block);

        let create = planner
            .plan("res.any", None, &config(serde_json::json!({"a": [1, "x"]})))
            .expect("create plan");
        let mut state = create.planned_state.expect("planned state");
        state.id = String::from("i-1");
        state.attributes.insert(String::from("id"), String::from("i-1"));

        let same = planner
            .plan("res.any", Some(&state), &config(serde_json::json!({"a": [1, "x"]})))
            .expect("replan");
        assert_eq!(same.action(), Action::NoOp);

        let update = planner
            .plan("res.any", Some(&state), &config(serde_json::json!("plain")))
            .expect("update plan");
        assert_eq!(update.action(), Action::Update);
        let any = update.diff.get_attribute("any").expect("any diff");
        assert_eq!(any.old, r#"{"a":[1,"x"]}"#);
        assert_eq!(any.new, r#""plain""#);
    }

    #[test]
    fn test_plan_serializes() {
        let block = block();
        let plan = Planner::new(&block)
            .plan("res.web", None, &config("web", 1))
            .expect("plan");
        let json = serde_json::to_string(&plan).expect("serialize");
        let back: ResourcePlan = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.diff, plan.diff);
        assert_eq!(back.action(), Action::Create);
        assert!(plan.to_string().starts_with("+ res.web (create):"));
    }
}
