//! Append-only, hash-linked ledgers for the attendance hierarchy.
//!
//! This crate is the heart of the system. It provides:
//! - [`HashBlock`]: a payload sealed by a proof-of-work-mined hash
//! - [`Payload`]: the typed transactions a block can carry
//! - [`ChainLedger`]: one entity's history, with genesis creation, mined
//!   appends, and self-validation
//! - [`ChainReport`]: every integrity violation found in a ledger

pub mod block;
pub mod chain;
pub mod error;
pub mod payload;
pub mod validation;

pub use block::{HashBlock, MiningOptions};
pub use chain::ChainLedger;
pub use error::LedgerError;
pub use payload::{
    AttendanceMark, ClassRecord, DepartmentRecord, GenesisRecord, MetadataUpdate, Payload,
    SoftDelete, StudentRecord,
};
pub use validation::{ChainReport, Violation, ViolationKind};
