use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use bams_ledger::ChainLedger;
use bams_types::LedgerKind;

use crate::error::{StoreError, StoreResult};

/// Full-structure image of the hierarchy: every ledger of every kind, keyed
/// by entity id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub departments: BTreeMap<String, ChainLedger>,
    #[serde(default)]
    pub classes: BTreeMap<String, ChainLedger>,
    #[serde(default)]
    pub students: BTreeMap<String, ChainLedger>,
}

/// A stored ledger entry that could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedLedger {
    pub kind: LedgerKind,
    /// Key the entry was filed under.
    pub key: String,
    pub reason: String,
}

/// A stored document decoded one ledger at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedSnapshot {
    pub snapshot: Snapshot,
    pub rejected: Vec<RejectedLedger>,
}

impl DecodedSnapshot {
    /// Returns `true` if every stored ledger decoded.
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Document shape with ledgers left undecoded.
#[derive(Default, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    departments: BTreeMap<String, Value>,
    #[serde(default)]
    classes: BTreeMap<String, Value>,
    #[serde(default)]
    students: BTreeMap<String, Value>,
}

impl RawSnapshot {
    fn take(&mut self, kind: LedgerKind) -> BTreeMap<String, Value> {
        std::mem::take(match kind {
            LedgerKind::Department => &mut self.departments,
            LedgerKind::Class => &mut self.classes,
            LedgerKind::Student => &mut self.students,
        })
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledgers of one kind.
    pub fn ledgers(&self, kind: LedgerKind) -> &BTreeMap<String, ChainLedger> {
        match kind {
            LedgerKind::Department => &self.departments,
            LedgerKind::Class => &self.classes,
            LedgerKind::Student => &self.students,
        }
    }

    pub fn ledgers_mut(&mut self, kind: LedgerKind) -> &mut BTreeMap<String, ChainLedger> {
        match kind {
            LedgerKind::Department => &mut self.departments,
            LedgerKind::Class => &mut self.classes,
            LedgerKind::Student => &mut self.students,
        }
    }

    /// Insert a ledger under its own id and kind.
    pub fn insert(&mut self, ledger: ChainLedger) -> Option<ChainLedger> {
        let id = ledger.id().to_string();
        self.ledgers_mut(ledger.kind()).insert(id, ledger)
    }

    /// Total number of ledgers across all kinds.
    pub fn ledger_count(&self) -> usize {
        self.departments.len() + self.classes.len() + self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger_count() == 0
    }

    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode a stored document ledger by ledger.
    ///
    /// Only the outer shape must be intact. A ledger that does not decode
    /// (unknown payload value, malformed hash, no blocks) lands in
    /// `rejected` and every other ledger still loads.
    pub fn decode_json(json: &str) -> StoreResult<DecodedSnapshot> {
        let mut raw: RawSnapshot =
            serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut decoded = DecodedSnapshot::default();
        for kind in LedgerKind::ALL {
            for (key, value) in raw.take(kind) {
                match serde_json::from_value::<ChainLedger>(value) {
                    Ok(ledger) => {
                        decoded.snapshot.ledgers_mut(kind).insert(key, ledger);
                    }
                    Err(e) => decoded.rejected.push(RejectedLedger {
                        kind,
                        key,
                        reason: e.to_string(),
                    }),
                }
            }
        }
        Ok(decoded)
    }
}
