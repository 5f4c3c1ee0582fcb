//! State file locking.
//!
//! A lock records who holds the state and for which operation. Locks
//! expire so that a crashed apply does not block the state forever.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a lock is honoured after it was taken.
const LOCK_TTL_SECS: i64 = 300;

/// A state lock as written to the lock file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// Operation the lock was taken for.
    #[serde(default)]
    pub operation: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock stops being honoured.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a fresh lock for `holder`.
    #[must_use]
    pub fn new(holder: &str, operation: &str) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            operation: operation.to_string(),
            acquired_at: now,
            expires_at: now + Duration::seconds(LOCK_TTL_SECS),
        }
    }

    /// Returns true once the lock may be taken over.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} held by {} since {}",
            self.lock_id,
            self.holder,
            self.acquired_at.to_rfc3339()
        )?;
        if !self.operation.is_empty() {
            write!(f, " ({})", self.operation)?;
        }
        Ok(())
    }
}

/// Builds a holder identifier for this process: `hostname-pid-suffix`.
#[must_use]
pub fn generate_holder_id() -> String {
    let host = hostname::get().map_or_else(
        |_| String::from("unknown"),
        |h| h.to_string_lossy().into_owned(),
    );
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{host}-{}-{}", std::process::id(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_display() {
        let info = LockInfo::new("me", "apply");
        assert!(!info.is_expired());
        assert!(info.to_string().contains("held by me"));
        assert!(info.to_string().ends_with("(apply)"));
        assert!(!LockInfo::new("me", "").to_string().ends_with(')'));
    }

    #[test]
    fn test_expired_lock() {
        let mut info = LockInfo::new("me", "");
        info.expires_at = Utc::now() - Duration::seconds(1);
        assert!(info.is_expired());
    }

    #[test]
    fn test_holder_id_generation() {
        let id1 = generate_holder_id();
        let id2 = generate_holder_id();
        assert_ne!(id1, id2);
        assert!(id1.contains(&format!("-{}-", std::process::id())));
    }
}
