use bams_types::BlockHash;

use crate::pow::ProofOfWork;

/// Trait for blocks that participate in a hash chain.
pub trait ChainLink {
    /// Position within the chain (0 for genesis).
    fn index(&self) -> u64;
    /// The block's stored hash.
    fn stored_hash(&self) -> BlockHash;
    /// The predecessor's hash, or the anchor for genesis.
    fn prev_hash(&self) -> BlockHash;
    /// The hash recomputed from the block's fields, or `None` if the block
    /// cannot be re-encoded.
    fn recompute_hash(&self) -> Option<BlockHash>;
}

/// A single defect found by [`HashChainVerifier`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainFault {
    /// `index` is not one more than the predecessor's (or not 0 for genesis).
    IndexGap { position: usize, expected: u64, found: u64 },
    /// `prev_hash` does not equal the predecessor's stored hash.
    BrokenLink { position: usize },
    /// Stored hash differs from the recomputed one.
    HashMismatch { position: usize },
    /// Block could not be re-encoded for hashing.
    Unencodable { position: usize },
    /// Stored hash does not meet the proof of work.
    InsufficientWork { position: usize },
}

impl ChainFault {
    /// Position of the offending block in the slice.
    pub fn position(&self) -> usize {
        match self {
            Self::IndexGap { position, .. }
            | Self::BrokenLink { position }
            | Self::HashMismatch { position }
            | Self::Unencodable { position }
            | Self::InsufficientWork { position } => *position,
        }
    }
}

/// Hash chain integrity verifier.
///
/// Unlike a fail-fast check, every block is inspected and every fault is
/// returned, so callers can report all tampered positions at once.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain of blocks.
    ///
    /// Checks, for each block:
    /// 1. index equals the block's position (0 for genesis)
    /// 2. `prev_hash` equals the predecessor's hash (skipped for genesis,
    ///    whose anchor belongs to another chain)
    /// 3. stored hash equals the recomputed hash
    /// 4. stored hash satisfies the proof of work
    pub fn verify_chain(blocks: &[impl ChainLink], pow: &ProofOfWork) -> Vec<ChainFault> {
        let mut faults = Vec::new();

        for (position, block) in blocks.iter().enumerate() {
            let expected_index = position as u64;
            if block.index() != expected_index {
                faults.push(ChainFault::IndexGap {
                    position,
                    expected: expected_index,
                    found: block.index(),
                });
            }

            if position > 0 && block.prev_hash() != blocks[position - 1].stored_hash() {
                faults.push(ChainFault::BrokenLink { position });
            }

            match block.recompute_hash() {
                Some(hash) if hash == block.stored_hash() => {}
                Some(_) => faults.push(ChainFault::HashMismatch { position }),
                None => faults.push(ChainFault::Unencodable { position }),
            }

            if !pow.is_satisfied_by(&block.stored_hash()) {
                faults.push(ChainFault::InsufficientWork { position });
            }
        }

        faults
    }
}
