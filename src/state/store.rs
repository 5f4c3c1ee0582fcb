//! State store trait definition.
//!
//! This module defines the common interface for state storage backends.

use async_trait::async_trait;

use super::lock::LockInfo;
use super::types::StateFile;
use crate::error::Result;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the state file.
    ///
    /// Returns `None` if no state exists yet.
    async fn load(&self) -> Result<Option<StateFile>>;

    /// Saves the state file.
    async fn save(&self, state: &StateFile) -> Result<()>;

    /// Loads the state file, starting a new lineage if none exists.
    async fn load_or_new(&self) -> Result<StateFile> {
        Ok(self.load().await?.unwrap_or_default())
    }

    /// Acquires a lock on the state for `operation`.
    ///
    /// An empty holder is replaced by a generated process identifier.
    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo>;

    /// Releases a lock on the state.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Removes the lock regardless of its holder.
    async fn force_unlock(&self) -> Result<Option<LockInfo>>;

    /// Checks if the state is locked.
    async fn is_locked(&self) -> Result<bool>;
}
