//! Cryptographic primitives for the attendance ledger.
//!
//! Provides domain-separated BLAKE3 block hashing, the leading-zero proof of
//! work with a bounded, cancellable nonce search, and hash chain verification.
//!
//! All digests come from the `blake3` crate; there is no custom cryptography.

pub mod chain;
pub mod hasher;
pub mod pow;

pub use chain::{ChainFault, ChainLink, HashChainVerifier};
pub use hasher::{BlockHasher, HasherError, HeaderState};
pub use pow::{CancelToken, MiningBudget, MiningError, ProofOfWork, Solution};
