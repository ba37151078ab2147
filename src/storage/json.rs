use std::{
    fs::{self, File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use log::{debug, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    models::store::{CURRENT_VERSION, Store},
    storage::{
        Storage, StorageError,
        migrations::{apply_migrations, detect_version},
    },
};

const BACKUPS_KEPT: usize = 5;

/// Store persisted as one pretty-printed JSON document.
///
/// Writers are serialized through an exclusive lock on a sibling `.lock` file.
/// The previous version is copied into `backups/` first, then the new document
/// is written to a temp file and renamed over the old one.
pub struct JsonFileStorage {
    path: PathBuf,
}

/// Exclusive hold on the store's lock file, released on drop
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("event=store_unlock status=failed error={e}");
        }
    }
}

/// Storage that owns the lock for a whole load-mutate-save cycle
pub struct LockedJsonStorage<'a> {
    storage: &'a JsonFileStorage,
    _lock: StoreLock,
}

impl Storage for LockedJsonStorage<'_> {
    fn load(&self) -> Result<Store, StorageError> {
        self.storage.read()
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        self.storage.write(store)
    }
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Blocks until no other writer holds the store, and keeps it until the
    /// returned storage is dropped
    pub fn lock_for_update(&self) -> Result<LockedJsonStorage<'_>, StorageError> {
        Ok(LockedJsonStorage {
            storage: self,
            _lock: self.lock()?,
        })
    }

    fn backup_dir(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or(Path::new("."))
            .join("backups")
    }

    fn lock(&self) -> Result<StoreLock, StorageError> {
        let lock_path = self.path.with_extension("lock");
        let save_failed = |source: std::io::Error| StorageError::SaveFailed {
            path: lock_path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(save_failed)?;
        file.lock_exclusive().map_err(save_failed)?;
        Ok(StoreLock { file })
    }

    /// Copies the current store file into the backup directory, if there is one
    fn backup_current(&self) -> Result<(), StorageError> {
        if !self.path.exists() {
            return Ok(());
        }

        let backup_dir = self.backup_dir();
        fs::create_dir_all(&backup_dir).map_err(|source| StorageError::BackupFailed {
            path: backup_dir.clone(),
            source,
        })?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store.json".to_string());
        // Fixed-width nanoseconds keep lexical order equal to chronological order.
        let stamp = jiff::Timestamp::now().as_nanosecond();
        let backup_path = backup_dir.join(format!("{stamp:020}-{file_name}"));

        fs::copy(&self.path, &backup_path).map_err(|source| StorageError::BackupFailed {
            path: backup_path.clone(),
            source,
        })?;
        debug!("event=store_backup path={}", backup_path.display());
        Ok(())
    }

    fn prune_backups(&self) -> Result<(), StorageError> {
        let backup_dir = self.backup_dir();
        let cleanup_failed = |source: std::io::Error| StorageError::CleanupFailed {
            dir: backup_dir.clone(),
            source,
        };

        let entries = match fs::read_dir(&backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(cleanup_failed(e)),
        };

        let mut backups: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        backups.sort();

        let excess = backups.len().saturating_sub(BACKUPS_KEPT);
        for stale in &backups[..excess] {
            fs::remove_file(stale).map_err(cleanup_failed)?;
        }
        Ok(())
    }

    fn parse(&self, content: &str) -> Result<Store, StorageError> {
        let parse_failed = |source: serde_json::Error| StorageError::ParseFailed {
            path: self.path.clone(),
            source,
        };

        let mut document: Value = serde_json::from_str(content).map_err(parse_failed)?;
        let version = detect_version(&document, &self.path)?;
        if version > CURRENT_VERSION {
            return Err(StorageError::FutureVersion(version));
        }
        if version < CURRENT_VERSION {
            info!(
                "event=store_migrate from={} to={} path={}",
                version,
                CURRENT_VERSION,
                self.path.display()
            );
            document = apply_migrations(document, version, CURRENT_VERSION)?;
        }
        if let Some(object) = document.as_object_mut() {
            object.insert("version".to_string(), Value::from(CURRENT_VERSION));
        }

        serde_json::from_value(document).map_err(parse_failed)
    }

    fn read(&self) -> Result<Store, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => self.parse(&content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("event=store_init path={}", self.path.display());
                Ok(Store::default())
            }
            Err(source) => Err(StorageError::LoadFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Caller must hold the lock
    fn write(&self, store: &Store) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(store)
            .map_err(|source| StorageError::SerializeFailed { source })?;

        self.backup_current()?;
        self.prune_backups()?;

        let temp_path = PathBuf::from(format!("{}.tmp.{}", self.path.display(), Uuid::new_v4()));
        let written = fs::write(&temp_path, json).and_then(|()| fs::rename(&temp_path, &self.path));
        if let Err(source) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::SaveFailed {
                path: self.path.clone(),
                source,
            });
        }

        debug!(
            "event=store_saved path={} projects={} tasks={}",
            self.path.display(),
            store.projects.len(),
            store.tasks.len()
        );
        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Store, StorageError> {
        self.read()
    }

    fn save(&self, store: &Store) -> Result<(), StorageError> {
        let _lock = self.lock()?;
        self.write(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{project::Project, task::Task};
    use jiff::Timestamp;

    fn storage_in(dir: &tempfile::TempDir) -> JsonFileStorage {
        JsonFileStorage::new(dir.path().join("store.json"))
    }

    #[test]
    fn test_missing_file_loads_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage_in(&dir).load().unwrap();

        assert_eq!(store.version, CURRENT_VERSION);
        assert!(store.projects.is_empty());
    }

    #[test]
    fn test_save_and_load_keeps_deadline_history() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        let mut store = Store::default();
        let start: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut project = Project::new(
            store.user_id,
            "Garden".to_string(),
            String::new(),
            Default::default(),
            start,
        )
        .unwrap();
        project.update_time_period(start, Some("2024-02-01T00:00:00Z".parse().unwrap()), "initial");
        project.update_time_period(start, Some("2024-03-01T00:00:00Z".parse().unwrap()), "extended");
        project
            .add_milestone(
                "Beds".to_string(),
                String::new(),
                None,
                Some("2024-01-15T00:00:00Z".parse().unwrap()),
                "initial",
            )
            .unwrap();
        let project_id = project.id;
        store.add_project(project);
        store.add_task(
            Task::new(store.user_id, "Buy soil".to_string(), Some(project_id), None).unwrap(),
        );

        storage.save(&store).unwrap();
        let loaded = storage.load().unwrap();

        assert_eq!(loaded.user_id, store.user_id);
        let loaded_project = loaded.get_project(project_id).unwrap();
        assert_eq!(loaded_project.deadlines, store.projects[0].deadlines);
        assert_eq!(loaded_project.last_deadline, store.projects[0].last_deadline);
        assert_eq!(
            loaded_project.milestones[0].deadlines,
            store.projects[0].milestones[0].deadlines
        );
        assert_eq!(loaded.tasks[0].task_number, 1);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        fs::write(dir.path().join("store.json"), "{ this is not valid json }").unwrap();

        assert!(matches!(
            storage.load(),
            Err(StorageError::ParseFailed { .. })
        ));
    }

    #[test]
    fn test_load_rejects_deadline_with_two_owners() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        let document = serde_json::json!({
            "version": 1,
            "user_id": Uuid::new_v4(),
            "projects": [{
                "id": Uuid::new_v4(),
                "user_id": Uuid::new_v4(),
                "name": "Broken",
                "slug": "broken",
                "description": "",
                "status": "active",
                "start": "2024-01-01T00:00:00Z",
                "last_deadline": "2024-02-01T00:00:00Z",
                "completed_at": null,
                "created_at": "2024-01-01T00:00:00Z",
                "deadlines": [{
                    "id": Uuid::new_v4(),
                    "due": "2024-02-01T00:00:00Z",
                    "reason": "initial",
                    "type": "project",
                    "project_id": Uuid::new_v4(),
                    "milestone_id": Uuid::new_v4(),
                    "task_id": null
                }]
            }],
            "tasks": []
        });
        fs::write(dir.path().join("store.json"), document.to_string()).unwrap();

        assert!(matches!(
            storage.load(),
            Err(StorageError::ParseFailed { .. })
        ));
    }

    #[test]
    fn test_load_unversioned_store() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        fs::write(
            dir.path().join("store.json"),
            r#"{"projects": [], "tasks": []}"#,
        )
        .unwrap();

        let store = storage.load().unwrap();
        assert_eq!(store.version, CURRENT_VERSION);
    }

    #[test]
    fn test_load_future_version() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        fs::write(
            dir.path().join("store.json"),
            r#"{"version": 999, "projects": [], "tasks": []}"#,
        )
        .unwrap();

        assert!(matches!(
            storage.load(),
            Err(StorageError::FutureVersion(999))
        ));
    }

    #[test]
    fn test_backups_start_on_second_save_and_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        let backups = dir.path().join("backups");
        let store = Store::default();

        storage.save(&store).unwrap();
        assert!(!backups.exists());

        for _ in 0..7 {
            storage.save(&store).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let count = fs::read_dir(&backups).unwrap().flatten().count();
        assert_eq!(count, BACKUPS_KEPT);
    }

    #[test]
    fn test_failed_backup_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        let store = Store::default();
        storage.save(&store).unwrap();
        fs::write(dir.path().join("backups"), "not a directory").unwrap();

        assert!(matches!(
            storage.save(&store),
            Err(StorageError::BackupFailed { .. })
        ));
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_locked_updates_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let start: Timestamp = "2024-01-01T00:00:00Z".parse().unwrap();
        let mut store = Store::default();
        let project = Project::new(
            store.user_id,
            "Garden".to_string(),
            String::new(),
            Default::default(),
            start,
        )
        .unwrap();
        let project_id = project.id;
        store.add_project(project);
        JsonFileStorage::new(path.clone()).save(&store).unwrap();

        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let first = {
            let path = path.clone();
            std::thread::spawn(move || {
                let storage = JsonFileStorage::new(path);
                let locked = storage.lock_for_update().unwrap();
                locked_tx.send(()).unwrap();
                let mut store = locked.load().unwrap();
                std::thread::sleep(std::time::Duration::from_millis(50));
                store.get_project_mut(project_id).unwrap().update_time_period(
                    start,
                    Some("2024-02-01T00:00:00Z".parse().unwrap()),
                    "A",
                );
                locked.save(&store).unwrap();
            })
        };

        locked_rx.recv().unwrap();
        let storage = JsonFileStorage::new(path);
        {
            let locked = storage.lock_for_update().unwrap();
            let mut store = locked.load().unwrap();
            store.get_project_mut(project_id).unwrap().update_time_period(
                start,
                Some("2024-03-01T00:00:00Z".parse().unwrap()),
                "B",
            );
            locked.save(&store).unwrap();
        }
        first.join().unwrap();

        let loaded = storage.load().unwrap();
        let reasons: Vec<&str> = loaded.projects[0]
            .deadlines
            .iter()
            .map(|d| d.reason())
            .collect();
        assert_eq!(reasons, vec!["A", "B"]);
    }
}
