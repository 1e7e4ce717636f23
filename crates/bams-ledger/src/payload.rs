use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bams_types::{AttendanceStatus, LedgerKind, RecordStatus};

/// The transaction carried by a block.
///
/// Tagged by `"type"` on the wire. Every variant is a struct, so its JSON
/// encoding has a fixed field order and hashes identically however many
/// times it is re-serialized. The ledger never interprets payloads; only the
/// read-side projections do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    Genesis(GenesisRecord),
    CreateDepartment(DepartmentRecord),
    CreateClass(ClassRecord),
    CreateStudent(StudentRecord),
    UpdateMetadata(MetadataUpdate),
    SoftDelete(SoftDelete),
    AttendanceMark(AttendanceMark),
}

impl Payload {
    /// Wire tag of this payload.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Genesis(_) => "GENESIS",
            Self::CreateDepartment(_) => "CREATE_DEPARTMENT",
            Self::CreateClass(_) => "CREATE_CLASS",
            Self::CreateStudent(_) => "CREATE_STUDENT",
            Self::UpdateMetadata(_) => "UPDATE_METADATA",
            Self::SoftDelete(_) => "SOFT_DELETE",
            Self::AttendanceMark(_) => "ATTENDANCE_MARK",
        }
    }

    /// Record status this payload establishes, if it carries one.
    ///
    /// Genesis and attendance blocks leave the record status unchanged.
    pub fn record_status(&self) -> Option<RecordStatus> {
        match self {
            Self::Genesis(_) | Self::AttendanceMark(_) => None,
            Self::CreateDepartment(r) => Some(r.status),
            Self::CreateClass(r) => Some(r.status),
            Self::CreateStudent(r) => Some(r.status),
            Self::UpdateMetadata(u) => Some(u.status),
            Self::SoftDelete(_) => Some(RecordStatus::Deleted),
        }
    }

    pub fn as_attendance(&self) -> Option<&AttendanceMark> {
        match self {
            Self::AttendanceMark(mark) => Some(mark),
            _ => None,
        }
    }
}

/// Payload of block 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisRecord {
    pub message: String,
    pub id: String,
    pub kind: LedgerKind,
    /// Ledger this one is anchored to. `None` for departments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_at: i64,
}

impl GenesisRecord {
    pub fn new(kind: LedgerKind, id: &str, parent_id: Option<&str>, created_at: i64) -> Self {
        Self {
            message: format!("{} genesis", kind.label()),
            id: id.to_string(),
            kind,
            parent_id: parent_id.map(str::to_string),
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRecord {
    pub name: String,
    pub status: RecordStatus,
    pub recorded_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub department_id: String,
    pub status: RecordStatus,
    pub recorded_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub name: String,
    pub roll_number: String,
    pub department_id: String,
    pub class_id: String,
    pub status: RecordStatus,
    pub recorded_at: i64,
}

/// Partial metadata change. Absent fields keep their previous value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll_number: Option<String>,
    pub status: RecordStatus,
    pub recorded_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftDelete {
    pub recorded_at: i64,
}

/// One attendance mark. Carries a copy of the student's identity at marking
/// time so filters never need to consult other ledgers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMark {
    pub student_id: String,
    pub status: AttendanceStatus,
    pub date: NaiveDate,
    pub student_name: String,
    pub roll_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    pub recorded_at: i64,
}
