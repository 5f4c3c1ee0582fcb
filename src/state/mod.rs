//! Persistent state for resource instances.
//!
//! This module stores the recorded flatmap state of every managed resource
//! instance in one state file, guarded by a lock file against concurrent
//! applies.

mod local;
mod lock;
mod store;
mod types;

pub use local::{LocalStateStore, STATE_DIR};
pub use lock::{LockInfo, generate_holder_id};
pub use store::StateStore;
pub use types::{ResourceRecord, STATE_VERSION, StateFile};
