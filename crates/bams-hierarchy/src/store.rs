use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;

use bams_crypto::CancelToken;
use bams_ledger::{AttendanceMark, ChainLedger, ChainReport, HashBlock, MiningOptions, Payload};
use bams_store::{FileSnapshotStore, InMemorySnapshotStore, Snapshot, SnapshotStore, StoreError};
use bams_types::{AttendanceStatus, BlockHash, LedgerKind};

use crate::config::HierarchyConfig;
use crate::directory::UniqueRule;
use crate::error::{HierarchyError, HierarchyResult};
use crate::projection::RecordView;
use crate::report::{HierarchyIssue, HierarchyReport};

pub(crate) type SharedLedger = Arc<Mutex<ChainLedger>>;

/// Fields of an attendance mark supplied by the caller. Student identity is
/// filled in from the student's ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttendanceFields {
    pub status: AttendanceStatus,
    pub date: NaiveDate,
}

#[derive(Default)]
pub(crate) struct Ledgers {
    departments: BTreeMap<String, SharedLedger>,
    classes: BTreeMap<String, SharedLedger>,
    students: BTreeMap<String, SharedLedger>,
}

impl Ledgers {
    pub(crate) fn of(&self, kind: LedgerKind) -> &BTreeMap<String, SharedLedger> {
        match kind {
            LedgerKind::Department => &self.departments,
            LedgerKind::Class => &self.classes,
            LedgerKind::Student => &self.students,
        }
    }

    fn of_mut(&mut self, kind: LedgerKind) -> &mut BTreeMap<String, SharedLedger> {
        match kind {
            LedgerKind::Department => &mut self.departments,
            LedgerKind::Class => &mut self.classes,
            LedgerKind::Student => &mut self.students,
        }
    }

    fn count(&self) -> usize {
        self.departments.len() + self.classes.len() + self.students.len()
    }
}

/// The authoritative in-process hierarchy of department, class, and student
/// ledgers.
///
/// Locking, outermost first:
/// 1. `gate`: shared by mutations, exclusive for validation, snapshots and
///    persists, so those see a consistent cut across all ledgers.
/// 2. `names`: held from a uniqueness check until the checked write lands,
///    so class names and roll numbers stay unique under concurrent writers.
/// 3. `ledgers`: the three id maps. Held only to look up or insert.
/// 4. one `Mutex` per ledger, held for the whole of a mined append.
///
/// A ledger mutex is never held while the map lock is acquired.
pub struct HierarchyStore {
    config: HierarchyConfig,
    backend: Arc<dyn SnapshotStore>,
    ledgers: RwLock<Ledgers>,
    gate: RwLock<()>,
    names: Mutex<()>,
    cancel: CancelToken,
    /// Set when the backend's snapshot could not be read and was not copied
    /// aside; automatic persists would overwrite it.
    autosave_blocked: AtomicBool,
}

impl HierarchyStore {
    /// Build a store over `backend` and restore its snapshot.
    ///
    /// Never fails: an unreadable snapshot is logged and the store starts
    /// empty. If the backend could not preserve the unreadable data,
    /// automatic persists stay off until an explicit [`HierarchyStore::persist`].
    pub fn open(config: HierarchyConfig, backend: Arc<dyn SnapshotStore>) -> Self {
        let store = Self {
            config,
            backend,
            ledgers: RwLock::new(Ledgers::default()),
            gate: RwLock::new(()),
            names: Mutex::new(()),
            cancel: CancelToken::new(),
            autosave_blocked: AtomicBool::new(false),
        };
        match store.restore() {
            Ok(_) => {}
            Err(e @ HierarchyError::Persistence(StoreError::CorruptSnapshot { .. })) => {
                tracing::error!(
                    backend = %store.backend.describe(),
                    error = %e,
                    "snapshot unreadable, starting with an empty hierarchy"
                );
            }
            Err(e) => {
                store.autosave_blocked.store(true, Ordering::SeqCst);
                tracing::error!(
                    backend = %store.backend.describe(),
                    error = %e,
                    "snapshot restore failed, starting empty with automatic persists off"
                );
            }
        }
        store
    }

    /// Open over the JSON snapshot file named by `config`.
    pub fn open_file(config: HierarchyConfig) -> Self {
        let backend = Arc::new(FileSnapshotStore::new(config.snapshot_path()));
        Self::open(config, backend)
    }

    /// Empty store backed by memory.
    pub fn in_memory() -> Self {
        Self::open(
            HierarchyConfig::default(),
            Arc::new(InMemorySnapshotStore::new()),
        )
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Token that aborts in-flight nonce searches when cancelled. It stays
    /// set until reset.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ---- Creation ----

    /// Create a department ledger anchored to the root sentinel.
    pub fn create_department(&self, id: &str) -> HierarchyResult<ChainLedger> {
        self.create(LedgerKind::Department, id, None)
    }

    /// Create a class ledger anchored to its department's current tip.
    pub fn create_class(&self, id: &str, department_id: &str) -> HierarchyResult<ChainLedger> {
        self.create(LedgerKind::Class, id, Some(department_id))
    }

    /// Create a student ledger anchored to its class's current tip.
    pub fn create_student(&self, id: &str, class_id: &str) -> HierarchyResult<ChainLedger> {
        self.create(LedgerKind::Student, id, Some(class_id))
    }

    fn create(
        &self,
        kind: LedgerKind,
        id: &str,
        parent_id: Option<&str>,
    ) -> HierarchyResult<ChainLedger> {
        let ledger = {
            let _gate = self.read_gate()?;
            self.mint(kind, id, parent_id, None, &UniqueRule::None)?
        };
        self.after_mutation();
        Ok(ledger)
    }

    /// Mine a new ledger (and optional first metadata block) and insert it.
    ///
    /// Mining happens outside the map lock; duplicates and `rule` are checked
    /// again on insert, so a failed create leaves nothing behind. Caller
    /// holds the gate.
    pub(crate) fn mint(
        &self,
        kind: LedgerKind,
        id: &str,
        parent_id: Option<&str>,
        metadata: Option<Payload>,
        rule: &UniqueRule<'_>,
    ) -> HierarchyResult<ChainLedger> {
        {
            let ledgers = self.read_ledgers()?;
            if ledgers.of(kind).contains_key(id) {
                return Err(duplicate(kind, id));
            }
            rule.check(&ledgers)?;
        }

        let (anchor, parent_id) = match kind.parent() {
            None => (BlockHash::ZERO, None),
            Some(parent_kind) => {
                let parent_id = parent_id.ok_or_else(|| HierarchyError::InvalidField {
                    field: "parent_id",
                    reason: format!("a {kind} needs a parent {parent_kind}"),
                })?;
                let parent = self
                    .find(parent_kind, parent_id)?
                    .ok_or_else(|| HierarchyError::ParentNotFound {
                        kind: parent_kind,
                        id: parent_id.to_string(),
                    })?;
                let tip = lock_ledger(&parent)?.tip().hash;
                (tip, Some(parent_id))
            }
        };

        let options = self.mining_options();
        let mut ledger = ChainLedger::create_genesis_with(anchor, kind, id, parent_id, &options)?;
        if let Some(payload) = metadata {
            ledger.append_with(payload, &options)?;
        }

        let _names = match rule {
            UniqueRule::None => None,
            _ => Some(self.lock_names()?),
        };
        let mut ledgers = self.write_ledgers()?;
        if ledgers.of(kind).contains_key(id) {
            return Err(duplicate(kind, id));
        }
        rule.check(&ledgers)?;
        ledgers
            .of_mut(kind)
            .insert(id.to_string(), Arc::new(Mutex::new(ledger.clone())));

        tracing::info!(%kind, id, anchor = %anchor.short_hex(), "ledger created");
        Ok(ledger)
    }

    // ---- Appends ----

    /// Mine an attendance mark onto a student's ledger.
    pub fn append_attendance(
        &self,
        student_id: &str,
        fields: AttendanceFields,
    ) -> HierarchyResult<HashBlock> {
        let student = self.view(LedgerKind::Student, student_id)?;
        let department_id = match (&student.department_id, &student.class_id) {
            (Some(department), _) => Some(department.clone()),
            (None, Some(class_id)) => self.department_of_class(class_id)?,
            (None, None) => None,
        };

        let (block, _) =
            self.append_to(LedgerKind::Student, student_id, &UniqueRule::None, |view| {
                Ok(Payload::AttendanceMark(AttendanceMark {
                    student_id: view.id.clone(),
                    status: fields.status,
                    date: fields.date,
                    student_name: view.name.clone(),
                    roll_number: view.roll_number.clone().unwrap_or_default(),
                    department_id,
                    class_id: view.class_id.clone(),
                    recorded_at: now_ms(),
                }))
            })?;
        tracing::info!(
            student_id,
            status = %fields.status,
            date = %fields.date,
            index = block.index,
            "attendance recorded"
        );
        Ok(block)
    }

    /// Append the payload built by `build` to a live (not deleted) ledger.
    ///
    /// `rule` is checked under the names lock, which stays held until the
    /// block is appended. `build` sees the record as folded before the
    /// append. Returns the new block and the record as folded after it.
    pub(crate) fn append_to<F>(
        &self,
        kind: LedgerKind,
        id: &str,
        rule: &UniqueRule<'_>,
        build: F,
    ) -> HierarchyResult<(HashBlock, RecordView)>
    where
        F: FnOnce(&RecordView) -> HierarchyResult<Payload>,
    {
        let outcome = {
            let _gate = self.read_gate()?;
            let _names = match rule {
                UniqueRule::None => None,
                _ => {
                    let guard = self.lock_names()?;
                    rule.check(&*self.read_ledgers()?)?;
                    Some(guard)
                }
            };
            let shared = self.shared(kind, id)?;
            let mut ledger = lock_ledger(&shared)?;
            let before = RecordView::fold(&ledger);
            if before.status.is_deleted() {
                return Err(HierarchyError::EntityDeleted {
                    kind,
                    id: id.to_string(),
                });
            }
            let payload = build(&before)?;
            let block = ledger.append_with(payload, &self.mining_options())?;
            (block, RecordView::fold(&ledger))
        };
        self.after_mutation();
        Ok(outcome)
    }

    fn department_of_class(&self, class_id: &str) -> HierarchyResult<Option<String>> {
        let Some(class) = self.find(LedgerKind::Class, class_id)? else {
            return Ok(None);
        };
        let view = RecordView::fold(&*lock_ledger(&class)?);
        Ok(view.department_id)
    }

    // ---- Validation ----

    /// Validate every ledger and every child anchor, collecting all issues.
    ///
    /// A child is anchored when its genesis `prev_hash` equals the hash of
    /// any block in the parent ledger it names, so later growth of the parent
    /// never invalidates existing children.
    pub fn validate_hierarchy(&self) -> HierarchyResult<HierarchyReport> {
        let _gate = self.write_gate()?;
        let ledgers = self.read_ledgers()?;
        let mut errors = Vec::new();

        for kind in LedgerKind::ALL {
            for shared in ledgers.of(kind).values() {
                let (report, anchor, parent_id) = {
                    let ledger = lock_ledger(shared)?;
                    (
                        ledger.validate(),
                        ledger.anchor(),
                        ledger.parent_id().map(str::to_string),
                    )
                };
                let ChainReport {
                    ledger_id,
                    violations,
                    ..
                } = report;

                errors.extend(violations.into_iter().map(|v| HierarchyIssue::Ledger {
                    kind,
                    ledger_id: ledger_id.clone(),
                    index: v.index,
                    violation: v.kind,
                    description: v.description,
                }));

                match kind.parent() {
                    None => {
                        if !anchor.is_zero() {
                            errors.push(HierarchyIssue::Unanchored {
                                kind,
                                ledger_id,
                                parent_id: None,
                                anchor,
                            });
                        }
                    }
                    Some(parent_kind) => {
                        let parent = parent_id
                            .as_deref()
                            .and_then(|p| ledgers.of(parent_kind).get(p));
                        match parent {
                            None => errors.push(HierarchyIssue::MissingParent {
                                kind,
                                ledger_id,
                                parent_kind,
                                parent_id,
                            }),
                            Some(parent) => {
                                if !lock_ledger(parent)?.contains_hash(&anchor) {
                                    errors.push(HierarchyIssue::Unanchored {
                                        kind,
                                        ledger_id,
                                        parent_id,
                                        anchor,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        let report = HierarchyReport::new(ledgers.count(), errors);
        if report.is_valid {
            tracing::debug!(ledgers = report.ledgers_checked, "hierarchy valid");
        } else {
            tracing::warn!(issues = report.errors.len(), "hierarchy validation failed");
        }
        Ok(report)
    }

    // ---- Persistence ----

    /// Save the full hierarchy through the backend.
    pub fn persist(&self) -> HierarchyResult<()> {
        let _gate = self.write_gate()?;
        let snapshot = self.snapshot_locked()?;
        self.backend.save(&snapshot)?;
        self.autosave_blocked.store(false, Ordering::SeqCst);
        tracing::info!(
            backend = %self.backend.describe(),
            ledgers = snapshot.ledger_count(),
            "hierarchy persisted"
        );
        Ok(())
    }

    /// Replace the in-memory hierarchy with the backend's snapshot.
    ///
    /// Stored hashes are trusted; every violation found is logged and the
    /// ledger is kept. Ledgers filed under the wrong kind or id are skipped.
    /// Returns the number of ledgers restored.
    pub fn restore(&self) -> HierarchyResult<usize> {
        let mut snapshot = self.backend.load()?;
        let _gate = self.write_gate()?;

        let mut restored = Ledgers::default();
        let mut flagged = 0usize;
        for kind in LedgerKind::ALL {
            for (key, ledger) in std::mem::take(snapshot.ledgers_mut(kind)) {
                if ledger.kind() != kind || ledger.id() != key {
                    tracing::warn!(
                        %kind,
                        key = %key,
                        ledger_kind = %ledger.kind(),
                        ledger_id = ledger.id(),
                        "misfiled ledger skipped"
                    );
                    continue;
                }
                if !ledger.warn_on_violations().is_valid() {
                    flagged += 1;
                }
                restored
                    .of_mut(kind)
                    .insert(key, Arc::new(Mutex::new(ledger)));
            }
        }

        let count = restored.count();
        *self.write_ledgers()? = restored;
        tracing::info!(
            backend = %self.backend.describe(),
            ledgers = count,
            flagged,
            "hierarchy restored"
        );
        Ok(count)
    }

    /// Consistent copy of every ledger.
    pub fn snapshot(&self) -> HierarchyResult<Snapshot> {
        let _gate = self.write_gate()?;
        self.snapshot_locked()
    }

    fn snapshot_locked(&self) -> HierarchyResult<Snapshot> {
        let ledgers = self.read_ledgers()?;
        let mut snapshot = Snapshot::new();
        for kind in LedgerKind::ALL {
            for shared in ledgers.of(kind).values() {
                snapshot.insert(lock_ledger(shared)?.clone());
            }
        }
        Ok(snapshot)
    }

    pub(crate) fn after_mutation(&self) {
        if !self.config.persist_on_mutation {
            return;
        }
        if self.autosave_blocked.load(Ordering::SeqCst) {
            tracing::warn!(
                backend = %self.backend.describe(),
                "automatic persist skipped: the stored snapshot was never loaded"
            );
            return;
        }
        if let Err(e) = self.persist() {
            tracing::error!(
                backend = %self.backend.describe(),
                error = %e,
                "persist after mutation failed"
            );
        }
    }

    // ---- Read access ----

    /// Copy of one ledger.
    pub fn ledger(&self, kind: LedgerKind, id: &str) -> HierarchyResult<ChainLedger> {
        let shared = self.shared(kind, id)?;
        let ledger = lock_ledger(&shared)?.clone();
        Ok(ledger)
    }

    /// Ids of every ledger of `kind`, deleted records included.
    pub fn ledger_ids(&self, kind: LedgerKind) -> HierarchyResult<Vec<String>> {
        Ok(self.read_ledgers()?.of(kind).keys().cloned().collect())
    }

    pub(crate) fn find(&self, kind: LedgerKind, id: &str) -> HierarchyResult<Option<SharedLedger>> {
        Ok(self.read_ledgers()?.of(kind).get(id).cloned())
    }

    pub(crate) fn shared(&self, kind: LedgerKind, id: &str) -> HierarchyResult<SharedLedger> {
        self.find(kind, id)?
            .ok_or_else(|| HierarchyError::EntityNotFound {
                kind,
                id: id.to_string(),
            })
    }

    pub(crate) fn shared_all(&self, kind: LedgerKind) -> HierarchyResult<Vec<SharedLedger>> {
        Ok(self.read_ledgers()?.of(kind).values().cloned().collect())
    }

    pub(crate) fn read_gate(&self) -> HierarchyResult<RwLockReadGuard<'_, ()>> {
        self.gate.read().map_err(|_| HierarchyError::LockPoisoned)
    }

    fn write_gate(&self) -> HierarchyResult<RwLockWriteGuard<'_, ()>> {
        self.gate.write().map_err(|_| HierarchyError::LockPoisoned)
    }

    fn lock_names(&self) -> HierarchyResult<MutexGuard<'_, ()>> {
        self.names.lock().map_err(|_| HierarchyError::LockPoisoned)
    }

    pub(crate) fn read_ledgers(&self) -> HierarchyResult<RwLockReadGuard<'_, Ledgers>> {
        self.ledgers.read().map_err(|_| HierarchyError::LockPoisoned)
    }

    fn write_ledgers(&self) -> HierarchyResult<RwLockWriteGuard<'_, Ledgers>> {
        self.ledgers.write().map_err(|_| HierarchyError::LockPoisoned)
    }

    fn mining_options(&self) -> MiningOptions {
        MiningOptions {
            budget: self.config.mining.budget(),
            cancel: Some(self.cancel.clone()),
        }
    }
}

pub(crate) fn lock_ledger(shared: &SharedLedger) -> HierarchyResult<MutexGuard<'_, ChainLedger>> {
    shared.lock().map_err(|_| HierarchyError::LockPoisoned)
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn duplicate(kind: LedgerKind, id: &str) -> HierarchyError {
    HierarchyError::DuplicateEntity {
        kind,
        id: id.to_string(),
    }
}
