use std::fmt;

use serde::Serialize;

use bams_crypto::ChainFault;
use bams_types::LedgerKind;

/// Result of validating one ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub ledger_id: String,
    pub kind: LedgerKind,
    pub block_count: u64,
    pub violations: Vec<Violation>,
}

impl ChainReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Indices of failing blocks, deduplicated, in chain order.
    pub fn failing_indices(&self) -> Vec<u64> {
        let mut indices: Vec<u64> = self.violations.iter().map(|v| v.index).collect();
        indices.dedup();
        indices
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Position of the offending block in its ledger.
    pub index: u64,
    pub kind: ViolationKind,
    pub description: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}: {}", self.index, self.description)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    IndexGap,
    HashChainBreak,
    HashMismatch,
    ProofOfWork,
}

impl Violation {
    pub(crate) fn from_fault(fault: &ChainFault) -> Self {
        let index = fault.position() as u64;

        match fault {
            ChainFault::IndexGap { expected, found, .. } => Violation {
                index,
                kind: ViolationKind::IndexGap,
                description: format!("expected index {expected}, stored index is {found}"),
            },
            ChainFault::BrokenLink { .. } => Violation {
                index,
                kind: ViolationKind::HashChainBreak,
                description: "prev_hash does not match predecessor hash".into(),
            },
            ChainFault::HashMismatch { .. } => Violation {
                index,
                kind: ViolationKind::HashMismatch,
                description: "stored hash does not match recomputed hash".into(),
            },
            ChainFault::Unencodable { .. } => Violation {
                index,
                kind: ViolationKind::HashMismatch,
                description: "block could not be re-encoded for hashing".into(),
            },
            ChainFault::InsufficientWork { .. } => Violation {
                index,
                kind: ViolationKind::ProofOfWork,
                description: "hash does not meet proof-of-work difficulty".into(),
            },
        }
    }
}
