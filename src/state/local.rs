//! Local file-based state storage backend.
//!
//! The state file and its lock live side by side in one directory,
//! `.schemaplan/` under the working directory by default. Both are written
//! through a temporary file and a rename, so readers never see a partial
//! document.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{Result, StateError};

use super::lock::{LockInfo, generate_holder_id};
use super::store::StateStore;
use super::types::{STATE_VERSION, StateFile};

/// Default state directory name.
pub const STATE_DIR: &str = ".schemaplan";

const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = "state.lock";

/// Local file-based state store.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    base_dir: PathBuf,
}

impl LocalStateStore {
    /// Creates a store rooted at `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Path of the state file.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.base_dir.join(STATE_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.base_dir.join(LOCK_FILE)
    }

    async fn write_document<T: Serialize>(&self, path: &Path, document: &T) -> Result<()> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| StateError::write(format!("Failed to create state directory: {e}")))?;

        let content = serde_json::to_string_pretty(document)
            .map_err(|e| StateError::serialization(e.to_string()))?;

        let temp_path = temp_path(path);
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| StateError::write(format!("Failed to create {}: {e}", temp_path.display())))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StateError::write(format!("Failed to write {}: {e}", temp_path.display())))?;
        file.sync_all()
            .await
            .map_err(|e| StateError::write(format!("Failed to sync {}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StateError::write(format!("Failed to replace {}: {e}", path.display())))?;
        Ok(())
    }

    async fn read_lock(&self) -> Result<Option<LockInfo>> {
        read_document(&self.lock_path()).await
    }

    async fn remove_lock(&self) -> Result<()> {
        match fs::remove_file(self.lock_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::LockFailed {
                message: format!("Failed to delete lock file: {e}"),
            }
            .into()),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Reads a JSON document, treating a missing file as absent.
async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StateError::Corrupted {
                message: format!("Failed to read {}: {e}", path.display()),
            }
            .into());
        }
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        StateError::Corrupted {
            message: format!("Failed to parse {}: {e}", path.display()),
        }
        .into()
    })
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<StateFile>> {
        let path = self.state_path();
        let Some(state) = read_document::<StateFile>(&path).await? else {
            debug!("No state file at {}", path.display());
            return Ok(None);
        };

        if state.version != STATE_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: state.version,
            }
            .into());
        }

        debug!("Loaded state serial {} from {}", state.serial, path.display());
        Ok(Some(state))
    }

    async fn save(&self, state: &StateFile) -> Result<()> {
        let path = self.state_path();
        info!("Saving state (serial {}) to: {}", state.serial, path.display());
        self.write_document(&path, state).await
    }

    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo> {
        if let Some(existing) = self.read_lock().await? {
            if !existing.is_expired() {
                return Err(StateError::LockedByOther {
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }
                .into());
            }
            debug!("Taking over expired lock {}", existing.lock_id);
        }

        let holder = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };
        let lock = LockInfo::new(&holder, operation);
        self.write_document(&self.lock_path(), &lock)
            .await
            .map_err(|e| StateError::LockFailed {
                message: e.to_string(),
            })?;

        info!("Acquired state lock {}", lock);
        Ok(lock)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        match self.read_lock().await? {
            Some(existing) if existing.lock_id == lock_id => {
                self.remove_lock().await?;
                info!("Released state lock: {lock_id}");
            }
            Some(existing) => debug!(
                "Not releasing lock {}: held as {}",
                lock_id, existing.lock_id
            ),
            None => {}
        }
        Ok(())
    }

    async fn force_unlock(&self) -> Result<Option<LockInfo>> {
        let existing = self.read_lock().await?;
        if let Some(lock) = &existing {
            warn!("Force-removing state lock held by {}", lock.holder);
            self.remove_lock().await?;
        }
        Ok(existing)
    }

    async fn is_locked(&self) -> Result<bool> {
        Ok(self.read_lock().await?.is_some_and(|lock| !lock.is_expired()))
    }
}
