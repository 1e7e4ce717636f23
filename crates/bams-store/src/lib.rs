//! Persistence boundary for the attendance ledger hierarchy.
//!
//! The whole hierarchy is saved and loaded as one [`Snapshot`] document:
//!
//! ```text
//! { "departments": { "<id>": <ledger> }, "classes": { ... }, "students": { ... } }
//! ```
//!
//! # Storage Backends
//!
//! All backends implement the [`SnapshotStore`] trait:
//!
//! - [`FileSnapshotStore`] -- one pretty-printed JSON file, replaced atomically
//! - [`InMemorySnapshotStore`] -- held in memory, for tests and embedding
//!
//! # Design Rules
//!
//! 1. Saves are full snapshots. There is no incremental persistence.
//! 2. Loading never re-mines or repairs blocks; stored hashes are trusted.
//! 3. A missing snapshot is an empty hierarchy, not an error.
//! 4. Ledgers are decoded one by one; an undecodable ledger is skipped and
//!    the file is copied aside before anything can overwrite it.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileSnapshotStore;
pub use memory::InMemorySnapshotStore;
pub use snapshot::{DecodedSnapshot, RejectedLedger, Snapshot};
pub use traits::SnapshotStore;
