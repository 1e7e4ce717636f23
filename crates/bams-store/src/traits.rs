use crate::error::StoreResult;
use crate::snapshot::Snapshot;

/// Where the hierarchy snapshot lives.
///
/// All implementations must satisfy these invariants:
/// - `save` replaces the whole previous snapshot; a reader never observes a
///   half-written document.
/// - `load` returns what the last successful `save` wrote, or an empty
///   snapshot if nothing was ever saved.
/// - Data a `load` could not decode is never lost to a later `save`.
/// - The store never interprets ledger contents.
pub trait SnapshotStore: Send + Sync {
    /// Read the current snapshot.
    ///
    /// Returns an empty [`Snapshot`] if none has been saved. Individual
    /// ledgers that fail to decode are left out; the rest are returned.
    /// Returns `Err` on I/O failure or a document whose shape is broken.
    fn load(&self) -> StoreResult<Snapshot>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> StoreResult<()>;

    /// Short human-readable description of the backend, for logs.
    fn describe(&self) -> String;
}
