//! State file types.
//!
//! The state file records, per resource instance address, the flatmap
//! state last written by apply. The serial increases with every write and
//! the lineage identifies one state history across copies.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::legacy::InstanceState;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1";

/// The complete state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State format version.
    pub version: String,
    /// Incremented on every save.
    pub serial: u64,
    /// Identifier shared by every serial of this state.
    pub lineage: String,
    /// Resource instances by address.
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceRecord>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
}

/// Recorded state of one resource instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Schema version the instance was written with.
    #[serde(default)]
    pub schema_version: u64,
    /// Flatmap state.
    pub instance: InstanceState,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl StateFile {
    /// Creates an empty state with a fresh lineage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            serial: 0,
            lineage: Uuid::new_v4().to_string(),
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Gets the recorded instance at `addr`.
    #[must_use]
    pub fn instance(&self, addr: &str) -> Option<&InstanceState> {
        self.resources.get(addr).map(|r| &r.instance)
    }

    /// Records the instance at `addr`.
    pub fn set_instance(&mut self, addr: &str, instance: InstanceState) {
        let record = ResourceRecord {
            schema_version: instance.schema_version(),
            instance,
            updated_at: Utc::now(),
        };
        self.resources.insert(addr.to_string(), record);
        self.last_updated = Utc::now();
    }

    /// Removes the instance at `addr`.
    pub fn remove_instance(&mut self, addr: &str) -> Option<ResourceRecord> {
        let result = self.resources.remove(addr);
        if result.is_some() {
            self.last_updated = Utc::now();
        }
        result
    }

    /// Marks a new revision of the state.
    pub fn bump_serial(&mut self) {
        self.serial += 1;
        self.last_updated = Utc::now();
    }

    /// Returns all resource addresses.
    #[must_use]
    pub fn addresses(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}
