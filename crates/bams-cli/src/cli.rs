use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use bams_types::LedgerKind;

#[derive(Parser)]
#[command(
    name = "bams",
    about = "Blockchain attendance management: tamper-evident department, class, and student ledgers",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the snapshot file (overrides config and BAMS_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage departments
    #[command(alias = "dept")]
    Department {
        #[command(subcommand)]
        action: RecordAction,
    },
    /// Manage classes
    Class {
        #[command(subcommand)]
        action: RecordAction,
    },
    /// Manage students
    Student {
        #[command(subcommand)]
        action: RecordAction,
    },
    /// Mark attendance for a student
    Attend(AttendArgs),
    /// List attendance records
    Attendance(AttendanceArgs),
    /// Show every block of one ledger
    Show(ShowArgs),
    /// Validate every ledger and every parent anchor
    Validate,
}

impl Command {
    /// Ledger kind a record subcommand operates on.
    pub fn record_kind(&self) -> Option<LedgerKind> {
        match self {
            Self::Department { .. } => Some(LedgerKind::Department),
            Self::Class { .. } => Some(LedgerKind::Class),
            Self::Student { .. } => Some(LedgerKind::Student),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
pub enum RecordAction {
    /// Register a new record
    Add(AddArgs),
    /// List active records
    List(ListArgs),
    /// Search active records by name, id, or roll number
    Search { query: String },
    /// Change a record's name or roll number
    Update(UpdateArgs),
    /// Soft-delete a record
    Delete { id: String },
}

#[derive(Args)]
pub struct AddArgs {
    pub name: String,
    /// Parent department (classes and students)
    #[arg(long)]
    pub department: Option<String>,
    /// Parent class (students)
    #[arg(long)]
    pub class: Option<String>,
    /// Roll number (students)
    #[arg(long)]
    pub roll: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub class: Option<String>,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub roll: Option<String>,
}

#[derive(Args)]
pub struct AttendArgs {
    pub student: String,
    /// Present, Absent, or Leave
    pub status: String,
    /// Calendar date (YYYY-MM-DD), today if omitted
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Args)]
pub struct AttendanceArgs {
    #[arg(long, conflicts_with = "today")]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub today: bool,
    #[arg(long)]
    pub class: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
    /// One student's full history
    #[arg(long, conflicts_with_all = ["date", "today", "class", "department"])]
    pub student: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub kind: LedgerKind,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_department_add() {
        let cli = Cli::try_parse_from(["bams", "department", "add", "Physics"]).unwrap();
        if let Command::Department {
            action: RecordAction::Add(args),
        } = cli.command
        {
            assert_eq!(args.name, "Physics");
            assert!(args.department.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_dept_alias() {
        let cli = Cli::try_parse_from(["bams", "dept", "list"]).unwrap();
        assert_eq!(cli.command.record_kind(), Some(LedgerKind::Department));
    }

    #[test]
    fn parse_student_add() {
        let cli = Cli::try_parse_from([
            "bams", "student", "add", "Ada", "--roll", "R1", "--department", "DEPT_A", "--class",
            "CLASS_A",
        ])
        .unwrap();
        assert_eq!(cli.command.record_kind(), Some(LedgerKind::Student));
        if let Command::Student {
            action: RecordAction::Add(args),
        } = cli.command
        {
            assert_eq!(args.roll, Some("R1".into()));
            assert_eq!(args.class, Some("CLASS_A".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_class_update() {
        let cli =
            Cli::try_parse_from(["bams", "class", "update", "CLASS_A", "--name", "Year 2"]).unwrap();
        if let Command::Class {
            action: RecordAction::Update(args),
        } = cli.command
        {
            assert_eq!(args.id, "CLASS_A");
            assert_eq!(args.name, Some("Year 2".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_attend_with_date() {
        let cli =
            Cli::try_parse_from(["bams", "attend", "STU_A", "present", "--date", "2025-01-01"])
                .unwrap();
        if let Command::Attend(args) = cli.command {
            assert_eq!(args.status, "present");
            assert_eq!(args.date, NaiveDate::from_ymd_opt(2025, 1, 1));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn bad_date_is_rejected() {
        assert!(Cli::try_parse_from(["bams", "attend", "S", "Present", "--date", "01/01/2025"])
            .is_err());
    }

    #[test]
    fn today_conflicts_with_date() {
        assert!(Cli::try_parse_from(["bams", "attendance", "--today", "--date", "2025-01-01"])
            .is_err());
        let cli = Cli::try_parse_from(["bams", "attendance", "--today", "--class", "C"]).unwrap();
        if let Command::Attendance(args) = cli.command {
            assert!(args.today);
            assert_eq!(args.class, Some("C".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_show_kind() {
        let cli = Cli::try_parse_from(["bams", "show", "students", "STU_A"]).unwrap();
        if let Command::Show(args) = cli.command {
            assert_eq!(args.kind, LedgerKind::Student);
            assert_eq!(args.id, "STU_A");
        } else {
            panic!("wrong command");
        }
        assert!(Cli::try_parse_from(["bams", "show", "staff", "T"]).is_err());
    }

    #[test]
    fn parse_validate() {
        let cli = Cli::try_parse_from(["bams", "validate"]).unwrap();
        assert!(matches!(cli.command, Command::Validate));
    }

    #[test]
    fn parse_globals() {
        let cli = Cli::try_parse_from([
            "bams", "validate", "--verbose", "--format", "json", "--data-dir", "/tmp/bams",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/bams")));
    }
}
