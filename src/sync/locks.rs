//! Per-repository mutual exclusion for pipeline runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

/// Map of repository name to the async lock guarding its workspace.
///
/// Cloning shares the map. The outer mutex is held only to look up or insert
/// an entry, never across an await.
#[derive(Debug, Clone, Default)]
pub struct RepositoryLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl RepositoryLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for a repository
    #[must_use]
    pub fn lock_for(&self, repository: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(repository.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }
}
