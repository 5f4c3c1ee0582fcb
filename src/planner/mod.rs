//! Planning for resource instances.
//!
//! This module composes proposed values from prior state and configuration,
//! turns them into flat diffs and change descriptors, runs customization
//! hooks, and re-checks plans at apply time.

mod change;
mod customize;
mod executor;
mod plan;
mod proposed;

pub use change::{Action, Change, ChangeSrc, ResourceInstanceChange, ResourceInstanceChangeSrc};
pub use customize::{
    CustomizeDiffFn, ResourceDiffBuilder, all, force_new_if_change, hook, if_value_change,
    sequence,
};
pub use executor::{ApplyResult, PlanExecutor};
pub use plan::{Planner, ResourcePlan};
pub use proposed::{proposed_new_object, set_unknowns};
