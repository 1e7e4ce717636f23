use thiserror::Error;

use bams_types::LedgerKind;

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("{kind} {id} already exists")]
    DuplicateEntity { kind: LedgerKind, id: String },

    #[error("parent {kind} {id} not found")]
    ParentNotFound { kind: LedgerKind, id: String },

    #[error("{kind} {id} not found")]
    EntityNotFound { kind: LedgerKind, id: String },

    #[error("{kind} {id} is deleted")]
    EntityDeleted { kind: LedgerKind, id: String },

    #[error("invalid attendance status {0:?}: expected Present, Absent or Leave")]
    InvalidStatus(String),

    #[error("{kind} with {field} {value:?} already exists in {scope}")]
    DuplicateName {
        kind: LedgerKind,
        field: &'static str,
        value: String,
        scope: String,
    },

    #[error("class {class_id} does not belong to department {department_id}")]
    ParentMismatch {
        class_id: String,
        department_id: String,
    },

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("integrity violation ({issues} issue(s)): {summary}")]
    IntegrityViolation { issues: usize, summary: String },

    #[error("persistence failure: {0}")]
    Persistence(#[from] bams_store::StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] bams_ledger::LedgerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("hierarchy lock poisoned")]
    LockPoisoned,
}

pub type HierarchyResult<T> = Result<T, HierarchyError>;
