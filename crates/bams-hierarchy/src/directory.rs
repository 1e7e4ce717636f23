use chrono::NaiveDate;
use uuid::Uuid;

use bams_ledger::{
    ClassRecord, DepartmentRecord, MetadataUpdate, Payload, SoftDelete, StudentRecord,
};
use bams_types::{AttendanceStatus, LedgerKind, RecordStatus};

use crate::error::{HierarchyError, HierarchyResult};
use crate::projection::{today, AttendanceRecord, RecordView};
use crate::store::{lock_ledger, now_ms, AttendanceFields, HierarchyStore, Ledgers};

/// Name constraint checked before mining and again, under the names lock,
/// right before the write.
pub(crate) enum UniqueRule<'a> {
    None,
    /// Active class names are unique within a department, ignoring case.
    ClassName {
        department_id: &'a str,
        name: &'a str,
        except: Option<&'a str>,
    },
    /// Active roll numbers are unique within a class.
    RollNumber {
        class_id: &'a str,
        roll_number: &'a str,
        except: Option<&'a str>,
    },
}

impl UniqueRule<'_> {
    pub(crate) fn check(&self, ledgers: &Ledgers) -> HierarchyResult<()> {
        let (kind, field, value, scope, except) = match *self {
            Self::None => return Ok(()),
            Self::ClassName {
                department_id,
                name,
                except,
            } => (LedgerKind::Class, "name", name, department_id, except),
            Self::RollNumber {
                class_id,
                roll_number,
                except,
            } => (LedgerKind::Student, "roll number", roll_number, class_id, except),
        };

        for (id, shared) in ledgers.of(kind) {
            if except == Some(id.as_str()) {
                continue;
            }
            let view = RecordView::fold(&*lock_ledger(shared)?);
            if view.is_active() && self.collides(&view) {
                return Err(HierarchyError::DuplicateName {
                    kind,
                    field,
                    value: value.to_string(),
                    scope: format!("{} {scope}", kind.parent().unwrap_or(kind)),
                });
            }
        }
        Ok(())
    }

    fn collides(&self, view: &RecordView) -> bool {
        match *self {
            Self::None => false,
            Self::ClassName {
                department_id,
                name,
                ..
            } => {
                view.department_id.as_deref() == Some(department_id)
                    && view.name.eq_ignore_ascii_case(name)
            }
            Self::RollNumber {
                class_id,
                roll_number,
                ..
            } => {
                view.class_id.as_deref() == Some(class_id)
                    && view.roll_number.as_deref() == Some(roll_number)
            }
        }
    }
}

/// `DEPT_`, `CLASS_` or `STU_` followed by nine uppercase hex digits.
pub fn generate_id(kind: LedgerKind) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(9)
        .collect();
    format!("{}_{}", kind.id_prefix(), suffix.to_ascii_uppercase())
}

fn required(field: &'static str, value: &str) -> HierarchyResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(HierarchyError::InvalidField {
            field,
            reason: "must not be empty".into(),
        });
    }
    Ok(trimmed.to_string())
}

impl HierarchyStore {
    /// Create a department record with a generated id.
    pub fn register_department(&self, name: &str) -> HierarchyResult<RecordView> {
        let name = required("name", name)?;
        let id = generate_id(LedgerKind::Department);
        let payload = Payload::CreateDepartment(DepartmentRecord {
            name,
            status: RecordStatus::Active,
            recorded_at: now_ms(),
        });
        self.register(LedgerKind::Department, &id, None, payload, &UniqueRule::None)
    }

    /// Create a class record under an active department.
    pub fn register_class(&self, name: &str, department_id: &str) -> HierarchyResult<RecordView> {
        let name = required("name", name)?;
        self.active_parent(LedgerKind::Department, department_id)?;

        let id = generate_id(LedgerKind::Class);
        let payload = Payload::CreateClass(ClassRecord {
            name: name.clone(),
            department_id: department_id.to_string(),
            status: RecordStatus::Active,
            recorded_at: now_ms(),
        });
        let rule = UniqueRule::ClassName {
            department_id,
            name: &name,
            except: None,
        };
        self.register(LedgerKind::Class, &id, Some(department_id), payload, &rule)
    }

    /// Create a student record in an active class of the given department.
    pub fn register_student(
        &self,
        name: &str,
        roll_number: &str,
        department_id: &str,
        class_id: &str,
    ) -> HierarchyResult<RecordView> {
        let name = required("name", name)?;
        let roll_number = required("roll_number", roll_number)?;
        self.active_parent(LedgerKind::Department, department_id)?;
        let class = self.active_parent(LedgerKind::Class, class_id)?;
        if class.department_id.as_deref() != Some(department_id) {
            return Err(HierarchyError::ParentMismatch {
                class_id: class_id.to_string(),
                department_id: department_id.to_string(),
            });
        }

        let id = generate_id(LedgerKind::Student);
        let payload = Payload::CreateStudent(StudentRecord {
            name,
            roll_number: roll_number.clone(),
            department_id: department_id.to_string(),
            class_id: class_id.to_string(),
            status: RecordStatus::Active,
            recorded_at: now_ms(),
        });
        let rule = UniqueRule::RollNumber {
            class_id,
            roll_number: &roll_number,
            except: None,
        };
        self.register(LedgerKind::Student, &id, Some(class_id), payload, &rule)
    }

    fn register(
        &self,
        kind: LedgerKind,
        id: &str,
        parent_id: Option<&str>,
        payload: Payload,
        rule: &UniqueRule<'_>,
    ) -> HierarchyResult<RecordView> {
        let ledger = {
            let _gate = self.read_gate()?;
            self.mint(kind, id, parent_id, Some(payload), rule)?
        };
        self.after_mutation();
        Ok(RecordView::fold(&ledger))
    }

    fn active_parent(&self, kind: LedgerKind, id: &str) -> HierarchyResult<RecordView> {
        let view = self.view(kind, id).map_err(|e| match e {
            HierarchyError::EntityNotFound { kind, id } => {
                HierarchyError::ParentNotFound { kind, id }
            }
            other => other,
        })?;
        if view.status.is_deleted() {
            return Err(HierarchyError::EntityDeleted {
                kind,
                id: id.to_string(),
            });
        }
        Ok(view)
    }

    /// Append an `UPDATE_METADATA` block. Absent fields keep their value.
    pub fn update_record(
        &self,
        kind: LedgerKind,
        id: &str,
        update: MetadataUpdate,
    ) -> HierarchyResult<RecordView> {
        let name = update.name.as_deref().map(|n| required("name", n)).transpose()?;
        let roll_number = match update.roll_number.as_deref() {
            Some(_) if kind != LedgerKind::Student => {
                return Err(HierarchyError::InvalidField {
                    field: "roll_number",
                    reason: format!("a {kind} has no roll number"),
                })
            }
            Some(roll) => Some(required("roll_number", roll)?),
            None => None,
        };

        let current = self.view(kind, id)?;
        let rule = match (kind, &name, &roll_number) {
            (LedgerKind::Class, Some(name), _) => current.department_id.as_deref().map(|d| {
                UniqueRule::ClassName {
                    department_id: d,
                    name,
                    except: Some(id),
                }
            }),
            (LedgerKind::Student, _, Some(roll)) => current.class_id.as_deref().map(|c| {
                UniqueRule::RollNumber {
                    class_id: c,
                    roll_number: roll,
                    except: Some(id),
                }
            }),
            _ => None,
        }
        .unwrap_or(UniqueRule::None);

        let (_, view) = self.append_to(kind, id, &rule, |_| {
            Ok(Payload::UpdateMetadata(MetadataUpdate {
                name: name.clone(),
                roll_number: roll_number.clone(),
                status: update.status,
                recorded_at: now_ms(),
            }))
        })?;
        tracing::info!(%kind, id, "record updated");
        Ok(view)
    }

    /// Append a `SOFT_DELETE` block. The ledger stays; the record is hidden
    /// from listings and takes no further appends.
    pub fn delete_record(&self, kind: LedgerKind, id: &str) -> HierarchyResult<RecordView> {
        let (_, view) = self.append_to(kind, id, &UniqueRule::None, |_| {
            Ok(Payload::SoftDelete(SoftDelete {
                recorded_at: now_ms(),
            }))
        })?;
        tracing::info!(%kind, id, "record deleted");
        Ok(view)
    }

    /// Parse `status` and record attendance for `date` (today, UTC, if
    /// absent).
    pub fn mark_attendance(
        &self,
        student_id: &str,
        status: &str,
        date: Option<NaiveDate>,
    ) -> HierarchyResult<AttendanceRecord> {
        let status: AttendanceStatus = status
            .parse()
            .map_err(|_| HierarchyError::InvalidStatus(status.to_string()))?;
        let fields = AttendanceFields {
            status,
            date: date.unwrap_or_else(today),
        };
        let block = self.append_attendance(student_id, fields)?;
        AttendanceRecord::from_block(&block).ok_or_else(|| HierarchyError::InvalidField {
            field: "payload",
            reason: "appended block is not an attendance mark".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school() -> (HierarchyStore, RecordView, RecordView) {
        let store = HierarchyStore::in_memory();
        let dept = store.register_department("Physics").unwrap();
        let class = store.register_class("Year 1", &dept.id).unwrap();
        (store, dept, class)
    }

    #[test]
    fn generated_ids_have_prefix_and_hex_suffix() {
        let id = generate_id(LedgerKind::Student);
        let suffix = id.strip_prefix("STU_").unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(generate_id(LedgerKind::Student), id);
        assert!(generate_id(LedgerKind::Department).starts_with("DEPT_"));
    }

    #[test]
    fn register_writes_genesis_and_metadata() {
        let (store, dept, class) = school();
        assert_eq!(dept.name, "Physics");
        assert_eq!(dept.block_count, 2);
        assert_eq!(class.department_id.as_deref(), Some(dept.id.as_str()));

        let ledger = store.ledger(LedgerKind::Class, &class.id).unwrap();
        assert_eq!(ledger.blocks()[1].payload.type_name(), "CREATE_CLASS");
        assert!(store.validate_hierarchy().unwrap().is_valid);
    }

    #[test]
    fn empty_names_are_rejected() {
        let store = HierarchyStore::in_memory();
        assert!(matches!(
            store.register_department("   ").unwrap_err(),
            HierarchyError::InvalidField { field: "name", .. }
        ));
        assert!(store.ledger_ids(LedgerKind::Department).unwrap().is_empty());
    }

    #[test]
    fn class_names_are_unique_per_department() {
        let (store, dept, _) = school();
        let err = store.register_class("year 1", &dept.id).unwrap_err();
        assert!(matches!(err, HierarchyError::DuplicateName { kind: LedgerKind::Class, .. }));
        assert_eq!(store.ledger_ids(LedgerKind::Class).unwrap().len(), 1);

        let other = store.register_department("Chemistry").unwrap();
        store.register_class("Year 1", &other.id).unwrap();
    }

    #[test]
    fn deleted_class_frees_its_name() {
        let (store, dept, class) = school();
        store.delete_record(LedgerKind::Class, &class.id).unwrap();
        store.register_class("Year 1", &dept.id).unwrap();
    }

    #[test]
    fn roll_numbers_are_unique_per_class() {
        let (store, dept, class) = school();
        store.register_student("Ada", "R1", &dept.id, &class.id).unwrap();
        let err = store
            .register_student("Bob", "R1", &dept.id, &class.id)
            .unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::DuplicateName {
                field: "roll number",
                ..
            }
        ));
    }

    #[test]
    fn student_class_must_belong_to_department() {
        let (store, _, class) = school();
        let other = store.register_department("Chemistry").unwrap();
        let err = store
            .register_student("Ada", "R1", &other.id, &class.id)
            .unwrap_err();
        assert!(matches!(err, HierarchyError::ParentMismatch { .. }));
    }

    #[test]
    fn missing_or_deleted_parents_are_rejected() {
        let (store, dept, class) = school();
        assert!(matches!(
            store.register_class("Y2", "DEPT_NONE").unwrap_err(),
            HierarchyError::ParentNotFound { .. }
        ));

        store.delete_record(LedgerKind::Class, &class.id).unwrap();
        assert!(matches!(
            store
                .register_student("Ada", "R1", &dept.id, &class.id)
                .unwrap_err(),
            HierarchyError::EntityDeleted {
                kind: LedgerKind::Class,
                ..
            }
        ));
    }

    #[test]
    fn update_changes_only_given_fields() {
        let (store, dept, class) = school();
        let ada = store.register_student("Ada", "R1", &dept.id, &class.id).unwrap();

        let updated = store
            .update_record(
                LedgerKind::Student,
                &ada.id,
                MetadataUpdate {
                    roll_number: Some("R9".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.roll_number.as_deref(), Some("R9"));
        assert_eq!(updated.block_count, 3);
    }

    #[test]
    fn update_rejects_conflicts_and_misplaced_fields() {
        let (store, dept, class) = school();
        let second = store.register_class("Year 2", &dept.id).unwrap();

        let err = store
            .update_record(
                LedgerKind::Class,
                &second.id,
                MetadataUpdate {
                    name: Some("YEAR 1".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, HierarchyError::DuplicateName { .. }));

        // Renaming to its own name is not a conflict.
        store
            .update_record(
                LedgerKind::Class,
                &class.id,
                MetadataUpdate {
                    name: Some("Year 1".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let err = store
            .update_record(
                LedgerKind::Department,
                &dept.id,
                MetadataUpdate {
                    roll_number: Some("R1".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidField { field: "roll_number", .. }));
    }

    #[test]
    fn concurrent_roll_changes_keep_roll_numbers_unique() {
        let (store, dept, class) = school();
        let students: Vec<RecordView> = ["R1", "R2", "R3", "R4"]
            .iter()
            .enumerate()
            .map(|(i, roll)| {
                store
                    .register_student(&format!("Student {i}"), roll, &dept.id, &class.id)
                    .unwrap()
            })
            .collect();

        let outcomes: Vec<HierarchyResult<()>> = std::thread::scope(|scope| {
            let mut handles: Vec<_> = students
                .iter()
                .map(|student| {
                    let store = &store;
                    scope.spawn(move || {
                        store
                            .update_record(
                                LedgerKind::Student,
                                &student.id,
                                MetadataUpdate {
                                    roll_number: Some("R9".into()),
                                    ..Default::default()
                                },
                            )
                            .map(|_| ())
                    })
                })
                .collect();
            let (store, dept, class) = (&store, &dept, &class);
            handles.push(scope.spawn(move || {
                store
                    .register_student("Late joiner", "R9", &dept.id, &class.id)
                    .map(|_| ())
            }));
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        for outcome in &outcomes {
            if let Err(e) = outcome {
                assert!(matches!(e, HierarchyError::DuplicateName { .. }), "{e}");
            }
        }
        let holders = store
            .list(
                LedgerKind::Student,
                &crate::ListFilter {
                    class_id: Some(class.id.clone()),
                    ..Default::default()
                },
            )
            .unwrap()
            .into_iter()
            .filter(|s| s.roll_number.as_deref() == Some("R9"))
            .count();
        assert_eq!(holders, 1);
    }

    #[test]
    fn deleted_is_terminal() {
        let (store, dept, class) = school();
        let ada = store.register_student("Ada", "R1", &dept.id, &class.id).unwrap();
        let deleted = store.delete_record(LedgerKind::Student, &ada.id).unwrap();
        assert_eq!(deleted.status, RecordStatus::Deleted);

        let before = store.ledger(LedgerKind::Student, &ada.id).unwrap();
        for result in [
            store.delete_record(LedgerKind::Student, &ada.id).map(|_| ()),
            store
                .update_record(LedgerKind::Student, &ada.id, MetadataUpdate::default())
                .map(|_| ()),
            store.mark_attendance(&ada.id, "Present", None).map(|_| ()),
        ] {
            assert!(matches!(result, Err(HierarchyError::EntityDeleted { .. })));
        }
        assert_eq!(store.ledger(LedgerKind::Student, &ada.id).unwrap(), before);
    }

    #[test]
    fn mark_attendance_parses_status_and_defaults_date() {
        let (store, dept, class) = school();
        let ada = store.register_student("Ada", "R1", &dept.id, &class.id).unwrap();

        let record = store.mark_attendance(&ada.id, "leave", None).unwrap();
        assert_eq!(record.mark.status, AttendanceStatus::Leave);
        assert_eq!(record.mark.date, today());
        assert_eq!(record.mark.class_id.as_deref(), Some(class.id.as_str()));

        let err = store.mark_attendance(&ada.id, "Late", None).unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidStatus(s) if s == "Late"));
        assert_eq!(store.attendance_history(&ada.id).unwrap().len(), 1);
    }
}
