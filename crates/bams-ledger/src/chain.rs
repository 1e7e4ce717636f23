use serde::{Deserialize, Serialize};
use serde_json::Value;

use bams_crypto::{HashChainVerifier, ProofOfWork};
use bams_types::{BlockHash, LedgerKind};

use crate::block::{HashBlock, MiningOptions};
use crate::error::LedgerError;
use crate::payload::{GenesisRecord, Payload};
use crate::validation::{ChainReport, Violation};

/// One entity's append-only history.
///
/// Always holds at least the genesis block. Past blocks are never mutated or
/// removed; every change to the entity is a new mined block at the tip.
///
/// Serializes as `{ "id", "kind", "blocks": [...] }`. Deserialization trusts
/// the stored hashes and nonces (nothing is re-mined) and only rejects an
/// empty block list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LedgerRepr")]
pub struct ChainLedger {
    id: String,
    kind: LedgerKind,
    blocks: Vec<HashBlock>,
}

#[derive(Deserialize)]
struct LedgerRepr {
    id: String,
    kind: LedgerKind,
    blocks: Vec<HashBlock>,
}

impl TryFrom<LedgerRepr> for ChainLedger {
    type Error = LedgerError;

    fn try_from(repr: LedgerRepr) -> Result<Self, Self::Error> {
        Self::from_parts(repr.id, repr.kind, repr.blocks)
    }
}

impl ChainLedger {
    /// Create a ledger whose genesis block is anchored to `anchor`.
    ///
    /// Departments pass [`BlockHash::ZERO`]; children pass their parent's
    /// tip hash and the parent's id.
    pub fn create_genesis(
        anchor: BlockHash,
        kind: LedgerKind,
        id: &str,
        parent_id: Option<&str>,
    ) -> Result<Self, LedgerError> {
        Self::create_genesis_with(anchor, kind, id, parent_id, &MiningOptions::default())
    }

    pub fn create_genesis_with(
        anchor: BlockHash,
        kind: LedgerKind,
        id: &str,
        parent_id: Option<&str>,
        options: &MiningOptions,
    ) -> Result<Self, LedgerError> {
        let now = now_ms();
        let payload = Payload::Genesis(GenesisRecord::new(kind, id, parent_id, now));
        let genesis = HashBlock::seal_with(0, payload, anchor, now, options)?;
        tracing::debug!(%kind, id, hash = %genesis.hash.short_hex(), "genesis mined");
        Ok(Self {
            id: id.to_string(),
            kind,
            blocks: vec![genesis],
        })
    }

    /// Rebuild a ledger from stored blocks without re-mining or validating.
    pub fn from_parts(
        id: String,
        kind: LedgerKind,
        blocks: Vec<HashBlock>,
    ) -> Result<Self, LedgerError> {
        if blocks.is_empty() {
            return Err(LedgerError::EmptyLedger { kind, id });
        }
        Ok(Self { id, kind, blocks })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> LedgerKind {
        self.kind
    }

    pub fn blocks(&self) -> &[HashBlock] {
        &self.blocks
    }

    pub fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn genesis(&self) -> &HashBlock {
        &self.blocks[0]
    }

    /// The most recent block.
    pub fn tip(&self) -> &HashBlock {
        // Non-empty by construction.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Hash the genesis block is anchored to.
    pub fn anchor(&self) -> BlockHash {
        self.genesis().prev_hash
    }

    /// Parent ledger id recorded in the genesis payload.
    pub fn parent_id(&self) -> Option<&str> {
        match &self.genesis().payload {
            Payload::Genesis(g) => g.parent_id.as_deref(),
            _ => None,
        }
    }

    /// Whether any block of this ledger has the given stored hash.
    pub fn contains_hash(&self, hash: &BlockHash) -> bool {
        self.blocks.iter().any(|b| &b.hash == hash)
    }

    /// Mine `payload` onto the tip. The only way a ledger grows.
    pub fn append(&mut self, payload: Payload) -> Result<HashBlock, LedgerError> {
        self.append_with(payload, &MiningOptions::default())
    }

    /// [`ChainLedger::append`] with an explicit mining budget and cancel
    /// token. If mining is aborted the ledger is unchanged.
    pub fn append_with(
        &mut self,
        payload: Payload,
        options: &MiningOptions,
    ) -> Result<HashBlock, LedgerError> {
        let tip = self.tip();
        let timestamp = now_ms().max(tip.timestamp);
        let block = HashBlock::seal_with(tip.index + 1, payload, tip.hash, timestamp, options)?;
        tracing::debug!(
            kind = %self.kind,
            id = %self.id,
            index = block.index,
            payload = block.payload.type_name(),
            "block appended"
        );
        self.blocks.push(block.clone());
        Ok(block)
    }

    /// Check index sequence, hash links, stored hashes, and proof of work for
    /// every block, collecting all violations.
    ///
    /// The genesis anchor is not checked here; it belongs to the parent
    /// ledger and is verified by the hierarchy.
    pub fn validate(&self) -> ChainReport {
        let faults = HashChainVerifier::verify_chain(&self.blocks, &ProofOfWork::STANDARD);
        ChainReport {
            ledger_id: self.id.clone(),
            kind: self.kind,
            block_count: self.block_count(),
            violations: faults
                .iter()
                .map(Violation::from_fault)
                .collect(),
        }
    }

    /// Plain structured representation for persistence.
    pub fn to_value(&self) -> Result<Value, LedgerError> {
        serde_json::to_value(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    /// Rehydrate from [`ChainLedger::to_value`] output.
    ///
    /// Stored hashes are trusted, never recomputed into place. Any integrity
    /// violation is logged so corrupted history stays inspectable.
    pub fn from_value(value: Value) -> Result<Self, LedgerError> {
        let ledger: Self =
            serde_json::from_value(value).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        ledger.warn_on_violations();
        Ok(ledger)
    }

    pub fn to_json(&self) -> Result<String, LedgerError> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, LedgerError> {
        let ledger: Self =
            serde_json::from_str(json).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        ledger.warn_on_violations();
        Ok(ledger)
    }

    /// Log each violation found by [`ChainLedger::validate`]; returns the report.
    pub fn warn_on_violations(&self) -> ChainReport {
        let report = self.validate();
        for violation in &report.violations {
            tracing::warn!(
                kind = %self.kind,
                id = %self.id,
                index = violation.index,
                "integrity violation: {}",
                violation.description
            );
        }
        report
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
