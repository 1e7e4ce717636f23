//! Read-side views folded from ledger payloads.
//!
//! Ledgers never interpret their payloads; everything that looks like a
//! "current record" is computed here by replaying the metadata blocks in
//! order. Deleted records are filtered out of every listing.

use chrono::NaiveDate;
use serde::Serialize;

use bams_ledger::{AttendanceMark, ChainLedger, HashBlock, Payload};
use bams_types::{BlockHash, LedgerKind, RecordStatus};

use crate::error::{HierarchyError, HierarchyResult};
use crate::store::{lock_ledger, HierarchyStore};

/// Current state of one department, class, or student.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecordView {
    pub id: String,
    pub kind: LedgerKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    pub status: RecordStatus,
    pub block_count: u64,
    pub latest_block_hash: BlockHash,
}

impl RecordView {
    /// Replay a ledger's metadata blocks into its current record.
    pub fn fold(ledger: &ChainLedger) -> Self {
        let mut view = Self {
            id: ledger.id().to_string(),
            kind: ledger.kind(),
            name: String::new(),
            roll_number: None,
            department_id: None,
            class_id: None,
            status: RecordStatus::Active,
            block_count: ledger.block_count(),
            latest_block_hash: ledger.tip().hash,
        };

        for block in ledger.blocks() {
            match &block.payload {
                Payload::Genesis(g) => match ledger.kind() {
                    LedgerKind::Department => {}
                    LedgerKind::Class => view.department_id = g.parent_id.clone(),
                    LedgerKind::Student => view.class_id = g.parent_id.clone(),
                },
                Payload::CreateDepartment(r) => {
                    view.name = r.name.clone();
                }
                Payload::CreateClass(r) => {
                    view.name = r.name.clone();
                    view.department_id = Some(r.department_id.clone());
                }
                Payload::CreateStudent(r) => {
                    view.name = r.name.clone();
                    view.roll_number = Some(r.roll_number.clone());
                    view.department_id = Some(r.department_id.clone());
                    view.class_id = Some(r.class_id.clone());
                }
                Payload::UpdateMetadata(u) => {
                    if let Some(name) = &u.name {
                        view.name = name.clone();
                    }
                    if let Some(roll) = &u.roll_number {
                        view.roll_number = Some(roll.clone());
                    }
                }
                Payload::SoftDelete(_) | Payload::AttendanceMark(_) => {}
            }
            if let Some(status) = block.payload.record_status() {
                // Deleted is terminal.
                if view.status.is_active() {
                    view.status = status;
                }
            }
        }
        view
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.id.to_lowercase().contains(needle)
            || self
                .roll_number
                .as_deref()
                .is_some_and(|r| r.to_lowercase().contains(needle))
    }
}

/// Narrows [`HierarchyStore::list`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub department_id: Option<String>,
    pub class_id: Option<String>,
}

impl ListFilter {
    fn accepts(&self, view: &RecordView) -> bool {
        same(&self.department_id, &view.department_id) && same(&self.class_id, &view.class_id)
    }
}

/// Narrows [`HierarchyStore::filtered_attendance`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttendanceFilter {
    pub department_id: Option<String>,
    pub class_id: Option<String>,
    pub date: Option<NaiveDate>,
    /// Only today's marks (UTC). Takes precedence over `date`.
    pub for_today: bool,
}

impl AttendanceFilter {
    fn accepts(&self, mark: &AttendanceMark, today: NaiveDate) -> bool {
        let date = if self.for_today { Some(today) } else { self.date };
        date.map_or(true, |d| d == mark.date)
            && same(&self.department_id, &mark.department_id)
            && same(&self.class_id, &mark.class_id)
    }
}

fn same(wanted: &Option<String>, actual: &Option<String>) -> bool {
    wanted.as_ref().map_or(true, |w| actual.as_ref() == Some(w))
}

/// One attendance mark with the block that carries it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub block_index: u64,
    pub block_hash: BlockHash,
    pub timestamp: i64,
    #[serde(flatten)]
    pub mark: AttendanceMark,
}

impl AttendanceRecord {
    pub fn from_block(block: &HashBlock) -> Option<Self> {
        block.payload.as_attendance().map(|mark| Self {
            block_index: block.index,
            block_hash: block.hash,
            timestamp: block.timestamp,
            mark: mark.clone(),
        })
    }
}

fn newest_first(records: &mut [AttendanceRecord]) {
    records.sort_by(|a, b| {
        b.mark
            .date
            .cmp(&a.mark.date)
            .then(b.timestamp.cmp(&a.timestamp))
            .then(a.mark.student_id.cmp(&b.mark.student_id))
    });
}

pub(crate) fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

impl HierarchyStore {
    /// Current record of any status.
    pub fn view(&self, kind: LedgerKind, id: &str) -> HierarchyResult<RecordView> {
        let shared = self.shared(kind, id)?;
        let view = RecordView::fold(&*lock_ledger(&shared)?);
        Ok(view)
    }

    /// Current record, or `None` if absent or deleted.
    pub fn get(&self, kind: LedgerKind, id: &str) -> HierarchyResult<Option<RecordView>> {
        match self.view(kind, id) {
            Ok(view) if view.is_active() => Ok(Some(view)),
            Ok(_) | Err(HierarchyError::EntityNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Active records of `kind` accepted by `filter`, sorted by id.
    pub fn list(&self, kind: LedgerKind, filter: &ListFilter) -> HierarchyResult<Vec<RecordView>> {
        Ok(self
            .active_views(kind)?
            .into_iter()
            .filter(|v| filter.accepts(v))
            .collect())
    }

    /// Active records whose name, id, or roll number contains `query`,
    /// ignoring case.
    pub fn search(&self, kind: LedgerKind, query: &str) -> HierarchyResult<Vec<RecordView>> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .active_views(kind)?
            .into_iter()
            .filter(|v| v.matches(&needle))
            .collect())
    }

    /// Every attendance mark of one student, newest first.
    pub fn attendance_history(&self, student_id: &str) -> HierarchyResult<Vec<AttendanceRecord>> {
        let shared = self.shared(LedgerKind::Student, student_id)?;
        let mut records: Vec<AttendanceRecord> = lock_ledger(&shared)?
            .blocks()
            .iter()
            .filter_map(AttendanceRecord::from_block)
            .collect();
        newest_first(&mut records);
        Ok(records)
    }

    /// Attendance marks of active students accepted by `filter`, newest
    /// first.
    pub fn filtered_attendance(
        &self,
        filter: &AttendanceFilter,
    ) -> HierarchyResult<Vec<AttendanceRecord>> {
        let today = today();
        let mut records = Vec::new();
        for shared in self.shared_all(LedgerKind::Student)? {
            let ledger = lock_ledger(&shared)?;
            if !RecordView::fold(&ledger).is_active() {
                continue;
            }
            records.extend(
                ledger
                    .blocks()
                    .iter()
                    .filter_map(AttendanceRecord::from_block)
                    .filter(|r| filter.accepts(&r.mark, today)),
            );
        }
        newest_first(&mut records);
        Ok(records)
    }

    fn active_views(&self, kind: LedgerKind) -> HierarchyResult<Vec<RecordView>> {
        let mut views = Vec::new();
        for shared in self.shared_all(kind)? {
            let view = RecordView::fold(&*lock_ledger(&shared)?);
            if view.is_active() {
                views.push(view);
            }
        }
        Ok(views)
    }
}
