//! The department → class → student ledger hierarchy.
//!
//! [`HierarchyStore`] owns one [`ChainLedger`] per entity. Every child
//! ledger's genesis block is anchored to its parent ledger's tip at creation
//! time, so rewriting a parent's history orphans its children and is caught
//! by [`HierarchyStore::validate_hierarchy`].
//!
//! On top of the ledger core the store offers the record directory the
//! attendance application needs (register, update, soft delete, mark
//! attendance) and read-side projections folded from ledger payloads.

pub mod config;
pub mod directory;
pub mod error;
pub mod projection;
pub mod report;
pub mod store;

pub use config::{HierarchyConfig, MiningConfig, DATA_DIR_ENV};
pub use directory::generate_id;
pub use error::{HierarchyError, HierarchyResult};
pub use projection::{AttendanceFilter, AttendanceRecord, ListFilter, RecordView};
pub use report::{HierarchyIssue, HierarchyReport};
pub use store::{AttendanceFields, HierarchyStore};

// Re-export key types
pub use bams_ledger::{ChainLedger, HashBlock, MetadataUpdate, Payload};
pub use bams_store::{FileSnapshotStore, InMemorySnapshotStore, Snapshot, SnapshotStore};
pub use bams_types::{AttendanceStatus, BlockHash, LedgerKind, RecordStatus};
