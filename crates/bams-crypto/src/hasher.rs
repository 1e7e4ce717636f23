use bams_types::BlockHash;

/// Domain-separated BLAKE3 block hasher.
///
/// The digest of a block is computed over
/// `domain ":" json(header) ":" nonce_le_bytes`, where `header` is every
/// hashed field except the nonce. The header is serialized with `serde_json`
/// from a struct, so field order is fixed by the type declaration and the
/// same logical block always produces the same bytes.
pub struct BlockHasher {
    domain: &'static str,
}

impl BlockHasher {
    /// Hasher for ledger blocks.
    pub const BLOCK: Self = Self {
        domain: "bams-block-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Absorb a block header, returning a state that can be finished with
    /// any number of nonces without re-serializing the header.
    pub fn header_state<T: serde::Serialize>(&self, header: &T) -> Result<HeaderState, HasherError> {
        let encoded =
            serde_json::to_vec(header).map_err(|e| HasherError::Serialization(e.to_string()))?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(&encoded);
        hasher.update(b":");
        Ok(HeaderState { hasher })
    }

    /// Hash a header together with a nonce.
    pub fn hash_block<T: serde::Serialize>(
        &self,
        header: &T,
        nonce: u64,
    ) -> Result<BlockHash, HasherError> {
        Ok(self.header_state(header)?.finish(nonce))
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Hasher state with a block header already absorbed.
#[derive(Clone)]
pub struct HeaderState {
    hasher: blake3::Hasher,
}

impl HeaderState {
    /// Finish the digest for one nonce. The absorbed header is left untouched.
    pub fn finish(&self, nonce: u64) -> BlockHash {
        let mut hasher = self.hasher.clone();
        hasher.update(&nonce.to_le_bytes());
        BlockHash::from_bytes(*hasher.finalize().as_bytes())
    }
}

/// Errors from hashing operations.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Header<'a> {
        index: u64,
        label: &'a str,
    }

    #[test]
    fn hash_is_deterministic() {
        let header = Header { index: 1, label: "a" };
        let h1 = BlockHasher::BLOCK.hash_block(&header, 7).unwrap();
        let h2 = BlockHasher::BLOCK.hash_block(&header, 7).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn nonce_changes_hash() {
        let header = Header { index: 1, label: "a" };
        let h1 = BlockHasher::BLOCK.hash_block(&header, 1).unwrap();
        let h2 = BlockHasher::BLOCK.hash_block(&header, 2).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn header_state_matches_one_shot_hash() {
        let header = Header { index: 3, label: "x" };
        let state = BlockHasher::BLOCK.header_state(&header).unwrap();
        for nonce in [0, 1, 99, u64::MAX] {
            assert_eq!(
                state.finish(nonce),
                BlockHasher::BLOCK.hash_block(&header, nonce).unwrap()
            );
        }
    }

    #[test]
    fn domains_are_separated() {
        let header = Header { index: 0, label: "same" };
        let custom = BlockHasher::new("other-v1");
        assert_ne!(
            custom.hash_block(&header, 0).unwrap(),
            BlockHasher::BLOCK.hash_block(&header, 0).unwrap()
        );
        assert_eq!(custom.domain(), "other-v1");
    }

    #[test]
    fn field_content_is_bound() {
        let a = BlockHasher::BLOCK
            .hash_block(&Header { index: 0, label: "a" }, 0)
            .unwrap();
        let b = BlockHasher::BLOCK
            .hash_block(&Header { index: 0, label: "b" }, 0)
            .unwrap();
        assert_ne!(a, b);
    }
}
