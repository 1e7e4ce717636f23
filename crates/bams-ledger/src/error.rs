use bams_crypto::{HasherError, MiningError};
use bams_types::LedgerKind;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{kind} ledger {id} has no blocks")]
    EmptyLedger { kind: LedgerKind, id: String },

    #[error("block encoding failed: {0}")]
    Encoding(#[from] HasherError),

    #[error(transparent)]
    Mining(#[from] MiningError),

    #[error("serialization error: {0}")]
    Serialization(String),
}
