//! Foundation types for the attendance ledger.
//!
//! Every other crate in the workspace depends on `bams-types`.
//!
//! # Key Types
//!
//! - [`BlockHash`]: 32-byte block digest, hex-encoded on the wire
//! - [`LedgerKind`]: which layer of the hierarchy a ledger belongs to
//! - [`RecordStatus`]: soft-delete state of a department, class, or student
//! - [`AttendanceStatus`]: closed set of attendance marks

pub mod error;
pub mod hash;
pub mod kind;
pub mod status;

pub use error::TypeError;
pub use hash::BlockHash;
pub use kind::LedgerKind;
pub use status::{AttendanceStatus, RecordStatus};
