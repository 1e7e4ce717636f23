use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bams_types::BlockHash;

use crate::hasher::HeaderState;

/// How many attempts run between deadline/cancellation checks.
const CHECK_INTERVAL: u64 = 4096;

/// Leading-zero proof of work.
///
/// A hash satisfies the predicate when its hex rendering starts with
/// `difficulty` `'0'` characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: u32,
}

impl ProofOfWork {
    /// The difficulty every ledger block is mined and validated at.
    pub const STANDARD: Self = Self { difficulty: 4 };

    pub const fn new(difficulty: u32) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Returns `true` if `hash` has the required leading zero run.
    pub fn is_satisfied_by(&self, hash: &BlockHash) -> bool {
        hash.leading_zero_digits() >= self.difficulty
    }

    /// Search nonces upward from `start` until the predicate holds.
    ///
    /// The header is absorbed once in `state`; each attempt only hashes the
    /// nonce. Returns [`MiningError`] if the budget runs out or `cancel` is
    /// triggered, in which case nothing has been sealed.
    pub fn search(
        &self,
        state: &HeaderState,
        start: u64,
        budget: &MiningBudget,
        cancel: Option<&CancelToken>,
    ) -> Result<Solution, MiningError> {
        let started = Instant::now();
        let mut nonce = start;
        let mut attempts: u64 = 0;

        loop {
            let hash = state.finish(nonce);
            attempts += 1;
            if self.is_satisfied_by(&hash) {
                let elapsed = started.elapsed();
                tracing::debug!(
                    nonce,
                    attempts,
                    elapsed_us = elapsed.as_micros() as u64,
                    "proof of work found"
                );
                return Ok(Solution {
                    nonce,
                    hash,
                    attempts,
                    elapsed,
                });
            }

            if attempts % CHECK_INTERVAL == 0 {
                if cancel.is_some_and(CancelToken::is_cancelled) {
                    return Err(MiningError::Cancelled { attempts });
                }
                if budget.is_exhausted(started.elapsed()) {
                    return Err(MiningError::BudgetExhausted {
                        attempts,
                        elapsed: started.elapsed(),
                    });
                }
            }

            nonce = nonce
                .checked_add(1)
                .ok_or(MiningError::NonceSpaceExhausted)?;
        }
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// A nonce that satisfies the proof of work for one header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u64,
    pub hash: BlockHash,
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Upper bound on how long one nonce search may run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MiningBudget {
    pub max_duration: Option<Duration>,
}

impl MiningBudget {
    /// No limit: search until a nonce is found.
    pub const fn unbounded() -> Self {
        Self { max_duration: None }
    }

    /// Abort the search once `duration` has elapsed.
    pub const fn within(duration: Duration) -> Self {
        Self {
            max_duration: Some(duration),
        }
    }

    fn is_exhausted(&self, elapsed: Duration) -> bool {
        self.max_duration.is_some_and(|max| elapsed >= max)
    }
}

/// Administrative abort switch for in-flight nonce searches.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can guard later searches.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Errors from the nonce search.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum MiningError {
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("mining budget exhausted after {attempts} attempts ({elapsed:?})")]
    BudgetExhausted { attempts: u64, elapsed: Duration },

    #[error("nonce space exhausted")]
    NonceSpaceExhausted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::BlockHasher;

    fn state(label: &str) -> HeaderState {
        BlockHasher::BLOCK
            .header_state(&serde_json::json!({ "label": label }))
            .unwrap()
    }

    #[test]
    fn predicate_counts_hex_zeros() {
        let mut bytes = [0xffu8; 32];
        bytes[0] = 0x00;
        bytes[1] = 0x00;
        let hash = BlockHash::from_bytes(bytes);
        assert!(ProofOfWork::STANDARD.is_satisfied_by(&hash));
        assert!(!ProofOfWork::new(5).is_satisfied_by(&hash));

        bytes[1] = 0x01;
        let hash = BlockHash::from_bytes(bytes);
        assert!(!ProofOfWork::STANDARD.is_satisfied_by(&hash));
        assert!(ProofOfWork::new(3).is_satisfied_by(&hash));
    }

    #[test]
    fn search_finds_valid_nonce() {
        let state = state("search");
        let pow = ProofOfWork::new(2);
        let solution = pow
            .search(&state, 0, &MiningBudget::unbounded(), None)
            .unwrap();
        assert!(pow.is_satisfied_by(&solution.hash));
        assert_eq!(state.finish(solution.nonce), solution.hash);
        assert!(solution.attempts >= 1);
    }

    #[test]
    fn standard_difficulty_is_four() {
        assert_eq!(ProofOfWork::STANDARD.difficulty(), 4);
        assert_eq!(ProofOfWork::default(), ProofOfWork::STANDARD);
    }

    #[test]
    fn cancelled_search_stops() {
        let token = CancelToken::new();
        token.cancel();
        // Difficulty 64 is unreachable, so only the token can end the search.
        let err = ProofOfWork::new(64)
            .search(&state("cancel"), 0, &MiningBudget::unbounded(), Some(&token))
            .unwrap_err();
        assert_eq!(err, MiningError::Cancelled { attempts: CHECK_INTERVAL });
    }

    #[test]
    fn budget_bounds_search() {
        let err = ProofOfWork::new(64)
            .search(&state("budget"), 0, &MiningBudget::within(Duration::ZERO), None)
            .unwrap_err();
        assert!(matches!(err, MiningError::BudgetExhausted { .. }));
    }

    #[test]
    fn nonce_overflow_is_reported() {
        let err = ProofOfWork::new(64)
            .search(&state("overflow"), u64::MAX, &MiningBudget::unbounded(), None)
            .unwrap_err();
        assert_eq!(err, MiningError::NonceSpaceExhausted);
    }

    #[test]
    fn token_reset_clears_flag() {
        let token = CancelToken::new();
        let shared = token.clone();
        shared.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!shared.is_cancelled());
    }
}
