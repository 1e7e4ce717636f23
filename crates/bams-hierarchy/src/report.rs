use std::fmt;

use serde::Serialize;

use bams_ledger::ViolationKind;
use bams_types::{BlockHash, LedgerKind};

use crate::error::{HierarchyError, HierarchyResult};

/// One problem found by [`crate::HierarchyStore::validate_hierarchy`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum HierarchyIssue {
    /// A block of the ledger failed its own chain checks.
    Ledger {
        kind: LedgerKind,
        ledger_id: String,
        index: u64,
        violation: ViolationKind,
        description: String,
    },
    /// The ledger names a parent that does not exist, or names none.
    MissingParent {
        kind: LedgerKind,
        ledger_id: String,
        parent_kind: LedgerKind,
        parent_id: Option<String>,
    },
    /// The genesis anchor is not a hash of any block in the parent ledger,
    /// or a root ledger is not anchored to the root sentinel.
    Unanchored {
        kind: LedgerKind,
        ledger_id: String,
        parent_id: Option<String>,
        anchor: BlockHash,
    },
}

impl HierarchyIssue {
    pub fn ledger_id(&self) -> &str {
        match self {
            Self::Ledger { ledger_id, .. }
            | Self::MissingParent { ledger_id, .. }
            | Self::Unanchored { ledger_id, .. } => ledger_id,
        }
    }

    pub fn kind(&self) -> LedgerKind {
        match self {
            Self::Ledger { kind, .. }
            | Self::MissingParent { kind, .. }
            | Self::Unanchored { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for HierarchyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ledger {
                kind,
                ledger_id,
                index,
                description,
                ..
            } => write!(f, "{kind} {ledger_id}: block {index}: {description}"),
            Self::MissingParent {
                kind,
                ledger_id,
                parent_kind,
                parent_id: Some(parent),
            } => write!(f, "{kind} {ledger_id}: parent {parent_kind} {parent} not found"),
            Self::MissingParent {
                kind,
                ledger_id,
                parent_kind,
                parent_id: None,
            } => write!(f, "{kind} {ledger_id}: genesis names no parent {parent_kind}"),
            Self::Unanchored {
                kind,
                ledger_id,
                parent_id: Some(parent),
                anchor,
            } => write!(
                f,
                "{kind} {ledger_id}: anchor {} not found in parent {parent}",
                anchor.short_hex()
            ),
            Self::Unanchored {
                kind,
                ledger_id,
                parent_id: None,
                anchor,
            } => write!(
                f,
                "{kind} {ledger_id}: root anchor {} is not the zero hash",
                anchor.short_hex()
            ),
        }
    }
}

/// Aggregated outcome of a whole-hierarchy validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HierarchyReport {
    pub is_valid: bool,
    pub message: String,
    pub ledgers_checked: usize,
    pub errors: Vec<HierarchyIssue>,
}

impl HierarchyReport {
    pub(crate) fn new(ledgers_checked: usize, errors: Vec<HierarchyIssue>) -> Self {
        let message = if errors.is_empty() {
            format!("hierarchy valid: {ledgers_checked} ledger(s) checked")
        } else {
            format!(
                "hierarchy invalid: {} issue(s) across {ledgers_checked} ledger(s)",
                errors.len()
            )
        };
        Self {
            is_valid: errors.is_empty(),
            message,
            ledgers_checked,
            errors,
        }
    }

    /// Turn a failing report into [`HierarchyError::IntegrityViolation`].
    pub fn into_result(self) -> HierarchyResult<Self> {
        if self.is_valid {
            return Ok(self);
        }
        let summary = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(HierarchyError::IntegrityViolation {
            issues: self.errors.len(),
            summary,
        })
    }
}
