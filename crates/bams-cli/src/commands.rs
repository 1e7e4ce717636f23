use anyhow::Context;
use colored::Colorize;
use serde::Serialize;

use bams_hierarchy::{
    AttendanceFilter, AttendanceRecord, ChainLedger, HierarchyConfig, HierarchyReport,
    HierarchyStore, ListFilter, MetadataUpdate, RecordView,
};
use bams_types::{AttendanceStatus, LedgerKind};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let store = HierarchyStore::open_file(config);
    let format = cli.format;
    let kind = cli.command.record_kind();

    match cli.command {
        Command::Department { action } | Command::Class { action } | Command::Student { action } => {
            let kind = kind.context("record command without a kind")?;
            cmd_record(&store, kind, action, format)
        }
        Command::Attend(args) => cmd_attend(&store, args, format),
        Command::Attendance(args) => cmd_attendance(&store, args, format),
        Command::Show(args) => cmd_show(&store, args, format),
        Command::Validate => cmd_validate(&store, format),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<HierarchyConfig> {
    let mut config = HierarchyConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    tracing::debug!(snapshot = %config.snapshot_path().display(), "configuration loaded");
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_record(
    store: &HierarchyStore,
    kind: LedgerKind,
    action: RecordAction,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match action {
        RecordAction::Add(args) => {
            let view = match kind {
                LedgerKind::Department => store.register_department(&args.name)?,
                LedgerKind::Class => {
                    let department = args
                        .department
                        .as_deref()
                        .context("--department is required to add a class")?;
                    store.register_class(&args.name, department)?
                }
                LedgerKind::Student => {
                    let roll = args.roll.as_deref().context("--roll is required to add a student")?;
                    let department = args
                        .department
                        .as_deref()
                        .context("--department is required to add a student")?;
                    let class = args
                        .class
                        .as_deref()
                        .context("--class is required to add a student")?;
                    store.register_student(&args.name, roll, department, class)?
                }
            };
            print_record_change("Created", &view, format)
        }
        RecordAction::List(args) => {
            let filter = ListFilter {
                department_id: args.department,
                class_id: args.class,
            };
            print_records(&store.list(kind, &filter)?, kind, format)
        }
        RecordAction::Search { query } => print_records(&store.search(kind, &query)?, kind, format),
        RecordAction::Update(args) => {
            let update = MetadataUpdate {
                name: args.name,
                roll_number: args.roll,
                ..MetadataUpdate::default()
            };
            let view = store.update_record(kind, &args.id, update)?;
            print_record_change("Updated", &view, format)
        }
        RecordAction::Delete { id } => {
            let view = store.delete_record(kind, &id)?;
            print_record_change("Deleted", &view, format)
        }
    }
}

fn print_record_change(verb: &str, view: &RecordView, format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(view);
    }
    println!(
        "{} {verb} {} {} {}",
        "✓".green().bold(),
        view.kind,
        view.id.yellow().bold(),
        view.name.bold()
    );
    println!(
        "  Ledger: {} blocks, tip {}",
        view.block_count,
        view.latest_block_hash.short_hex().dimmed()
    );
    Ok(())
}

fn print_records(views: &[RecordView], kind: LedgerKind, format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        return print_json(&views);
    }
    if views.is_empty() {
        println!("No active {kind} records.");
        return Ok(());
    }
    for view in views {
        let mut line = format!("{}  {}", view.id.yellow(), view.name.bold());
        if let Some(roll) = &view.roll_number {
            line.push_str(&format!("  roll {roll}"));
        }
        if let Some(class) = &view.class_id {
            line.push_str(&format!("  class {}", class.cyan()));
        }
        if let Some(department) = &view.department_id {
            line.push_str(&format!("  dept {}", department.cyan()));
        }
        println!("{line}  {}", format!("({} blocks)", view.block_count).dimmed());
    }
    Ok(())
}

fn cmd_attend(store: &HierarchyStore, args: AttendArgs, format: OutputFormat) -> anyhow::Result<()> {
    let record = store.mark_attendance(&args.student, &args.status, args.date)?;
    if let OutputFormat::Json = format {
        return print_json(&record);
    }
    println!(
        "{} Marked {} {} on {}",
        "✓".green().bold(),
        record.mark.student_name.bold(),
        colored_status(record.mark.status),
        record.mark.date
    );
    println!(
        "  Block #{} {}",
        record.block_index,
        record.block_hash.short_hex().dimmed()
    );
    Ok(())
}

fn cmd_attendance(
    store: &HierarchyStore,
    args: AttendanceArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let records = match args.student {
        Some(student) => store.attendance_history(&student)?,
        None => store.filtered_attendance(&AttendanceFilter {
            department_id: args.department,
            class_id: args.class,
            date: args.date,
            for_today: args.today,
        })?,
    };
    if let OutputFormat::Json = format {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No attendance records.");
        return Ok(());
    }
    for record in &records {
        print_attendance_line(record);
    }
    Ok(())
}

fn print_attendance_line(record: &AttendanceRecord) {
    let mark = &record.mark;
    println!(
        "{}  {:<8} {}  {} ({})",
        mark.date,
        colored_status(mark.status),
        mark.student_id.yellow(),
        mark.student_name,
        mark.roll_number
    );
}

fn colored_status(status: AttendanceStatus) -> colored::ColoredString {
    match status {
        AttendanceStatus::Present => status.to_string().green(),
        AttendanceStatus::Absent => status.to_string().red(),
        AttendanceStatus::Leave => status.to_string().yellow(),
    }
}

fn cmd_show(store: &HierarchyStore, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ledger = store.ledger(args.kind, &args.id)?;
    if let OutputFormat::Json = format {
        return print_json(&ledger);
    }
    print_ledger(&ledger);
    Ok(())
}

fn print_ledger(ledger: &ChainLedger) {
    let report = ledger.validate();
    let failing = report.failing_indices();

    println!(
        "{} {} ({} blocks, anchor {})",
        ledger.kind(),
        ledger.id().yellow().bold(),
        ledger.block_count(),
        ledger.anchor().short_hex().dimmed()
    );
    for block in ledger.blocks() {
        let mark = if failing.contains(&block.index) {
            "✗".red().bold()
        } else {
            "✓".green()
        };
        println!(
            "  {mark} #{:<3} {}  prev {}  nonce {:<8} {}",
            block.index,
            block.hash.short_hex().yellow(),
            block.prev_hash.short_hex().dimmed(),
            block.nonce,
            block.payload.type_name()
        );
    }
    for violation in &report.violations {
        println!("  {} {violation}", "!".red().bold());
    }
}

fn cmd_validate(store: &HierarchyStore, format: OutputFormat) -> anyhow::Result<()> {
    let report = store.validate_hierarchy()?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }
    report.into_result()?;
    Ok(())
}

fn print_report(report: &HierarchyReport) {
    if report.is_valid {
        println!("{} {}", "✓".green().bold(), report.message);
        return;
    }
    println!("{} {}", "✗".red().bold(), report.message);
    for issue in &report.errors {
        println!("  {} {issue}", "-".red());
    }
}
