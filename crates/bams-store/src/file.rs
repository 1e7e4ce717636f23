use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};
use crate::snapshot::Snapshot;
use crate::traits::SnapshotStore;

/// Snapshot stored as one pretty-printed JSON file.
///
/// Saves write a sibling temp file and rename it over the target, so a crash
/// mid-save leaves the previous snapshot intact.
#[derive(Clone, Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `dir/file_name`.
    pub fn in_dir(dir: impl AsRef<Path>, file_name: &str) -> Self {
        Self::new(dir.as_ref().join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the current file to `<name>.corrupt-<UTC timestamp>` beside it.
    pub fn back_up(&self) -> StoreResult<PathBuf> {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(format!(
            ".corrupt-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        ));
        let backup = self.path.with_file_name(name);
        fs::copy(&self.path, &backup)?;
        tracing::warn!(
            path = %self.path.display(),
            backup = %backup.display(),
            "snapshot copied aside before partial load"
        );
        Ok(backup)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    /// Loads every ledger that decodes.
    ///
    /// If any stored ledger is rejected, or the document itself is broken,
    /// the file is first copied aside (see [`FileSnapshotStore::back_up`]) so
    /// a later save cannot destroy the only copy.
    fn load(&self) -> StoreResult<Snapshot> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no snapshot file, starting empty");
            return Ok(Snapshot::default());
        }
        let bytes = fs::read(&self.path)?;
        let decoded = match std::str::from_utf8(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))
            .and_then(Snapshot::decode_json)
        {
            Ok(decoded) => decoded,
            Err(e) => {
                let backup = self.back_up()?;
                return Err(StoreError::CorruptSnapshot {
                    path: self.path.clone(),
                    backup,
                    reason: e.to_string(),
                });
            }
        };

        if !decoded.is_complete() {
            let backup = self.back_up()?;
            for rejected in &decoded.rejected {
                tracing::warn!(
                    kind = %rejected.kind,
                    key = %rejected.key,
                    reason = %rejected.reason,
                    backup = %backup.display(),
                    "undecodable ledger skipped"
                );
            }
        }
        tracing::debug!(
            path = %self.path.display(),
            ledgers = decoded.snapshot.ledger_count(),
            rejected = decoded.rejected.len(),
            "snapshot loaded"
        );
        Ok(decoded.snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)?;

        let json = snapshot.to_json()?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        tracing::debug!(
            path = %self.path.display(),
            bytes = json.len(),
            ledgers = snapshot.ledger_count(),
            "snapshot saved"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bams_ledger::{ChainLedger, Payload, SoftDelete};
    use bams_types::{BlockHash, LedgerKind};

    fn sample() -> Snapshot {
        let dept =
            ChainLedger::create_genesis(BlockHash::ZERO, LedgerKind::Department, "DEPT_A", None)
                .unwrap();
        let mut class = ChainLedger::create_genesis(
            dept.tip().hash,
            LedgerKind::Class,
            "CLASS_A",
            Some("DEPT_A"),
        )
        .unwrap();
        class
            .append(Payload::SoftDelete(SoftDelete { recorded_at: 9 }))
            .unwrap();

        let mut snapshot = Snapshot::new();
        snapshot.insert(dept);
        snapshot.insert(class);
        snapshot
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::in_dir(dir.path(), "bams_structure.json");
        assert!(store.load().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::in_dir(dir.path().join("nested"), "snap.json");
        let snapshot = sample();

        store.save(&snapshot).unwrap();
        assert!(store.path().exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, snapshot);
        for ledger in loaded.classes.values() {
            assert!(ledger.validate().is_valid());
        }
    }

    #[test]
    fn save_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::in_dir(dir.path(), "snap.json");
        store.save(&sample()).unwrap();
        store.save(&Snapshot::new()).unwrap();

        assert!(store.load().unwrap().is_empty());
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::in_dir(dir.path(), "snap.json");
        fs::write(store.path(), "{ not json").unwrap();

        match store.load().unwrap_err() {
            StoreError::CorruptSnapshot { backup, .. } => {
                assert_eq!(fs::read_to_string(backup).unwrap(), "{ not json");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_ledger_is_skipped_and_file_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::in_dir(dir.path(), "snap.json");
        store.save(&sample()).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        value["classes"]["CLASS_A"]["blocks"][1]["payload"]["type"] = "NO_SUCH_PAYLOAD".into();
        let corrupted = value.to_string();
        fs::write(store.path(), &corrupted).unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.departments.contains_key("DEPT_A"));
        assert!(loaded.classes.is_empty());

        // Saving the partial load must not destroy the rejected ledger.
        store.save(&loaded).unwrap();
        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p != store.path())
            .collect();
        assert_eq!(backups.len(), 1);
        assert!(backups[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("snap.json.corrupt-"));
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), corrupted);
    }

    #[test]
    fn clean_load_makes_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::in_dir(dir.path(), "snap.json");
        store.save(&sample()).unwrap();
        store.load().unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
