//! # Feature: Backups
//!
//! Timestamp-named JSON snapshots of the board under `<data_dir>/backups`.
//! Every operation reports failure as a value; nothing here returns an error
//! to the IPC layer.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Listing entry for one backup file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub name: String,
    /// Modification time, Unix epoch milliseconds
    pub time: u64,
    pub size: u64,
}

/// Outcome of save/read/delete operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackupOutcome {
    pub fn ok() -> Self {
        BackupOutcome {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        BackupOutcome {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        BackupStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot. A JSON string is written verbatim, anything else pretty-printed.
    pub fn save(&self, snapshot: &serde_json::Value) -> BackupOutcome {
        let name = backup_file_name();
        match self.write_snapshot(&name, snapshot) {
            Ok(()) => {
                info!("Saved backup {}", name);
                BackupOutcome {
                    success: true,
                    file: Some(name),
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!("save-backup failed: {:#}", e);
                BackupOutcome::failed(format!("{:#}", e))
            }
        }
    }

    /// `.json` files, newest first. Missing directory or IO faults list as empty.
    pub fn list(&self) -> Vec<BackupInfo> {
        match self.read_listing() {
            Ok(backups) => backups,
            Err(e) => {
                warn!("list-backups failed: {:#}", e);
                Vec::new()
            }
        }
    }

    pub fn read(&self, name: &str) -> BackupOutcome {
        let path = match self.resolve(name) {
            Ok(path) => path,
            Err(e) => return BackupOutcome::failed(e.to_string()),
        };
        if !path.exists() {
            return BackupOutcome::failed("not found");
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => BackupOutcome {
                success: true,
                content: Some(content),
                ..Default::default()
            },
            Err(e) => {
                warn!("read-backup {} failed: {}", name, e);
                BackupOutcome::failed(e.to_string())
            }
        }
    }

    /// Deleting a backup that does not exist succeeds
    pub fn delete(&self, name: &str) -> BackupOutcome {
        let path = match self.resolve(name) {
            Ok(path) => path,
            Err(e) => return BackupOutcome::failed(e.to_string()),
        };
        if !path.exists() {
            return BackupOutcome::ok();
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted backup {}", name);
                BackupOutcome::ok()
            }
            Err(e) => {
                warn!("delete-backup {} failed: {}", name, e);
                BackupOutcome::failed(e.to_string())
            }
        }
    }

    pub fn delete_all(&self) -> BackupOutcome {
        if !self.dir.exists() {
            return BackupOutcome::ok();
        }
        match self.remove_json_files() {
            Ok(count) => {
                info!("Deleted {} backups", count);
                BackupOutcome::ok()
            }
            Err(e) => {
                warn!("delete-all-backups failed: {:#}", e);
                BackupOutcome::failed(format!("{:#}", e))
            }
        }
    }

    fn write_snapshot(&self, name: &str, snapshot: &serde_json::Value) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let body = match snapshot {
            serde_json::Value::String(raw) => raw.clone(),
            other => serde_json::to_string_pretty(other)?,
        };
        let path = self.dir.join(name);
        std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))
    }

    fn read_listing(&self) -> Result<Vec<BackupInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut backups = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".json") {
                continue;
            }
            let meta = entry.metadata()?;
            let time = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            backups.push(BackupInfo {
                name,
                time,
                size: meta.len(),
            });
        }
        backups.sort_by(|a, b| b.time.cmp(&a.time).then_with(|| b.name.cmp(&a.name)));
        Ok(backups)
    }

    fn remove_json_files(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                std::fs::remove_file(&path)
                    .with_context(|| format!("removing {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Backup names are plain file names inside the backups directory
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(anyhow!("invalid backup name"));
        }
        Ok(self.dir.join(name))
    }
}

/// `backup-<ISO 8601 with ':' and '.' replaced by '-'>.json`
pub fn backup_file_name() -> String {
    let stamp = Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("backup-{}.json", stamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, BackupStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BackupStore::new(dir.path().join("backups"));
        (dir, store)
    }

    #[test]
    fn test_file_name_format() {
        let name = backup_file_name();
        assert!(name.starts_with("backup-"));
        assert!(name.ends_with("Z.json"));
        assert!(!name.contains(':'));
        assert_eq!(name.matches('.').count(), 1);
    }

    #[test]
    fn test_save_then_read() {
        let (_dir, store) = store();
        let saved = store.save(&json!({"reminders": []}));
        assert!(saved.success);

        let read = store.read(saved.file.as_deref().unwrap());
        assert!(read.success);
        assert!(read.content.unwrap().contains("\"reminders\""));
    }

    #[test]
    fn test_string_snapshot_written_verbatim() {
        let (_dir, store) = store();
        let saved = store.save(&json!("{\"raw\":true}"));
        let read = store.read(saved.file.as_deref().unwrap());
        assert_eq!(read.content.as_deref(), Some("{\"raw\":true}"));
    }

    #[test]
    fn test_read_missing_is_failure_value() {
        let (_dir, store) = store();
        let read = store.read("backup-nope.json");
        assert!(!read.success);
        assert_eq!(read.error.as_deref(), Some("not found"));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let (_dir, store) = store();
        assert!(!store.read("../nodeboard-store.json").success);
        assert!(!store.delete("a/b.json").success);
    }

    #[test]
    fn test_list_newest_first_and_json_only() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("backup-b.json"), "{}").unwrap();
        std::fs::write(store.dir().join("backup-a.json"), "{\"a\":1}").unwrap();
        std::fs::write(store.dir().join("notes.txt"), "x").unwrap();
        let older = UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        std::fs::File::options()
            .write(true)
            .open(store.dir().join("backup-b.json"))
            .unwrap()
            .set_modified(older)
            .unwrap();

        let list = store.list();
        let names: Vec<&str> = list.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["backup-a.json", "backup-b.json"]);
        assert_eq!(list[0].size, 7);
    }

    #[test]
    fn test_missing_dir_lists_empty_and_deletes_ok() {
        let (_dir, store) = store();
        assert!(store.list().is_empty());
        assert!(store.delete_all().success);
        assert!(store.delete("backup-x.json").success);
    }

    #[test]
    fn test_delete_all_keeps_other_files() {
        let (_dir, store) = store();
        store.save(&json!({"n": 1}));
        std::fs::write(store.dir().join("keep.txt"), "x").unwrap();

        assert!(store.delete_all().success);
        assert!(store.list().is_empty());
        assert!(store.dir().join("keep.txt").exists());
    }
}
