use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Layer of the hierarchy a ledger belongs to.
///
/// Departments are roots. Classes anchor to a department, students anchor to
/// a class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Department,
    Class,
    Student,
}

impl LedgerKind {
    pub const ALL: [LedgerKind; 3] = [Self::Department, Self::Class, Self::Student];

    /// The kind of ledger this kind anchors to, if any.
    pub fn parent(&self) -> Option<LedgerKind> {
        match self {
            Self::Department => None,
            Self::Class => Some(Self::Department),
            Self::Student => Some(Self::Class),
        }
    }

    /// Lowercase name, as used in snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::Class => "class",
            Self::Student => "student",
        }
    }

    /// Uppercase label used in genesis messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Department => "DEPARTMENT",
            Self::Class => "CLASS",
            Self::Student => "STUDENT",
        }
    }

    /// Prefix for generated entity ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Department => "DEPT",
            Self::Class => "CLASS",
            Self::Student => "STU",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "department" | "departments" | "dept" => Ok(Self::Department),
            "class" | "classes" => Ok(Self::Class),
            "student" | "students" => Ok(Self::Student),
            _ => Err(TypeError::UnknownKind(s.to_string())),
        }
    }
}
