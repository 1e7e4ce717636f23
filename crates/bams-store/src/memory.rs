use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::snapshot::Snapshot;
use crate::traits::SnapshotStore;

/// In-memory snapshot store.
///
/// Intended for tests and embedding. The last saved snapshot is held behind
/// a `RwLock` and cloned on load and save.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshot: RwLock<Option<Snapshot>>,
    saves: RwLock<u64>,
}

impl InMemorySnapshotStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
            saves: RwLock::new(0),
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> StoreResult<u64> {
        self.saves
            .read()
            .map(|n| *n)
            .map_err(|_| StoreError::LockPoisoned)
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> StoreResult<Snapshot> {
        let guard = self.snapshot.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        *self.snapshot.write().map_err(|_| StoreError::LockPoisoned)? = Some(snapshot.clone());
        *self.saves.write().map_err(|_| StoreError::LockPoisoned)? += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
