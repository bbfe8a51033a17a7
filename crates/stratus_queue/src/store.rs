//! Filesystem-backed queue store.
//!
//! Each partition is a directory under the queue root holding `{id}.json`
//! files. Every transition is a `rename` within the same volume:
//! - `claim` renames `pending/{id}.json` into `processing/`. If two
//!   processors race, the second rename finds no source and loses.
//! - `complete` writes the terminal record to a hidden temp file, syncs
//!   it, renames it into `completed/` or `failed/`, and only then removes
//!   the processing copy.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use stratus_core::{Partition, RequestRecord, RequestStatus};
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};

const RECORD_EXTENSION: &str = "json";

/// Result of trying to claim a pending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// This caller owns the record; it now lives at the given path.
    Claimed(PathBuf),
    /// The record was no longer pending (another processor took it).
    Lost,
}

/// Queue partitions rooted at one directory.
#[derive(Debug, Clone)]
pub struct QueueStore {
    root: PathBuf,
}

impl QueueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create any missing partition directory.
    pub fn ensure_layout(&self) -> QueueResult<()> {
        for partition in Partition::all() {
            fs::create_dir_all(self.partition_dir(partition))?;
        }
        Ok(())
    }

    pub fn partition_dir(&self, partition: Partition) -> PathBuf {
        self.root.join(partition.dir_name())
    }

    pub fn record_path(&self, partition: Partition, id: &str) -> PathBuf {
        self.partition_dir(partition)
            .join(format!("{}.{}", id, RECORD_EXTENSION))
    }

    /// Write a new request into `pending`.
    pub fn enqueue(&self, record: &RequestRecord) -> QueueResult<PathBuf> {
        record.validate()?;
        self.ensure_layout()?;

        if let Some(partition) = self.locate_partition(&record.id) {
            return Err(QueueError::Duplicate(format!(
                "{} is already in {}",
                record.id, partition
            )));
        }

        let mut pending = record.clone();
        pending.status = RequestStatus::Pending;
        let path = self.write_atomic(Partition::Pending, &pending)?;
        info!("Enqueued request {}", record.id);
        Ok(path)
    }

    /// Ids currently present in a partition, sorted. Temp files and
    /// anything that is not `*.json` are ignored.
    pub fn scan(&self, partition: Partition) -> QueueResult<Vec<String>> {
        let dir = self.partition_dir(partition);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if !stem.starts_with('.') => ids.push(stem.to_string()),
                _ => {}
            }
        }
        ids.sort();
        debug!("Found {} record(s) in {}", ids.len(), partition);
        Ok(ids)
    }

    /// Atomically move a record from `pending` to `processing`.
    pub fn claim(&self, id: &str) -> QueueResult<Claim> {
        let from = self.record_path(Partition::Pending, id);
        let to = self.record_path(Partition::Processing, id);
        fs::create_dir_all(self.partition_dir(Partition::Processing))?;

        match fs::rename(&from, &to) {
            Ok(()) => {
                debug!("Claimed request {}", id);
                Ok(Claim::Claimed(to))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Request {} was claimed elsewhere", id);
                Ok(Claim::Lost)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Raw file contents of a record.
    pub fn read_raw(&self, partition: Partition, id: &str) -> QueueResult<String> {
        let path = self.record_path(partition, id);
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => QueueError::NotFound(format!("{} in {}", id, partition)),
            _ => e.into(),
        })
    }

    pub fn load(&self, partition: Partition, id: &str) -> QueueResult<RequestRecord> {
        let content = self.read_raw(partition, id)?;
        Ok(RequestRecord::from_json(&content)?)
    }

    fn locate_partition(&self, id: &str) -> Option<Partition> {
        Partition::all()
            .into_iter()
            .find(|p| self.record_path(*p, id).exists())
    }

    /// Find which partition holds `id` and load the record from it.
    pub fn locate(&self, id: &str) -> QueueResult<Option<(Partition, RequestRecord)>> {
        match self.locate_partition(id) {
            Some(partition) => Ok(Some((partition, self.load(partition, id)?))),
            None => Ok(None),
        }
    }

    /// Persist a terminal record and drop the processing copy.
    ///
    /// Writing an identical terminal record twice leaves the queue in the
    /// same state.
    pub fn complete(&self, record: &RequestRecord) -> QueueResult<PathBuf> {
        if !record.status.is_terminal() {
            return Err(QueueError::InvalidTransition {
                id: record.id.clone(),
                message: format!("{} is not a terminal status", record.status),
            });
        }

        let partition = record.status.partition();
        let path = self.write_atomic(partition, record)?;

        let processing = self.record_path(Partition::Processing, &record.id);
        match fs::remove_file(&processing) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Terminal record written but {:?} could not be removed: {}", processing, e);
                return Err(e.into());
            }
        }

        debug!("Request {} recorded in {}", record.id, partition);
        Ok(path)
    }

    fn write_atomic(&self, partition: Partition, record: &RequestRecord) -> QueueResult<PathBuf> {
        let dir = self.partition_dir(partition);
        fs::create_dir_all(&dir)?;

        let final_path = self.record_path(partition, &record.id);
        let tmp_path = dir.join(format!(".{}.{}.tmp", record.id, RECORD_EXTENSION));
        let content = record.to_json()?;

        let written = File::create(&tmp_path).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, &final_path)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Barrier};
    use tempfile::tempdir;

    fn record(id: &str) -> RequestRecord {
        RequestRecord::new(id, "web_app", json!({"app_name": "blog", "environment": "dev"}))
    }

    #[test]
    fn test_enqueue_and_scan() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());

        store.enqueue(&record("r2")).unwrap();
        store.enqueue(&record("r1")).unwrap();
        fs::write(store.partition_dir(Partition::Pending).join("notes.txt"), "x").unwrap();
        fs::write(store.partition_dir(Partition::Pending).join(".r3.json.tmp"), "{}").unwrap();

        assert_eq!(store.scan(Partition::Pending).unwrap(), vec!["r1", "r2"]);
        assert!(store.scan(Partition::Completed).unwrap().is_empty());
    }

    #[test]
    fn test_enqueue_rejects_duplicates() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());
        store.enqueue(&record("r1")).unwrap();

        assert!(matches!(store.enqueue(&record("r1")), Err(QueueError::Duplicate(_))));
    }

    #[test]
    fn test_scan_missing_partition_is_empty() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path().join("queue"));
        assert!(store.scan(Partition::Pending).unwrap().is_empty());
    }

    #[test]
    fn test_claim_moves_record() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());
        store.enqueue(&record("r1")).unwrap();

        let claim = store.claim("r1").unwrap();
        assert_eq!(claim, Claim::Claimed(store.record_path(Partition::Processing, "r1")));
        assert!(!store.record_path(Partition::Pending, "r1").exists());
        assert_eq!(store.claim("r1").unwrap(), Claim::Lost);
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());
        store.enqueue(&record("r1")).unwrap();

        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));
        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let store = store.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.claim("r1").unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|c| matches!(c, Claim::Claimed(_)))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.scan(Partition::Processing).unwrap(), vec!["r1"]);
    }

    #[test]
    fn test_complete_writes_terminal_and_removes_processing() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());
        store.enqueue(&record("r1")).unwrap();
        store.claim("r1").unwrap();

        let mut done = store.load(Partition::Processing, "r1").unwrap();
        done.mark_completed(json!({"url": "https://blog"}));
        store.complete(&done).unwrap();
        // Second write of the same terminal record changes nothing.
        store.complete(&done).unwrap();

        assert!(store.scan(Partition::Processing).unwrap().is_empty());
        let (partition, loaded) = store.locate("r1").unwrap().unwrap();
        assert_eq!(partition, Partition::Completed);
        assert_eq!(loaded, done);
        assert!(fs::read_dir(store.partition_dir(Partition::Completed))
            .unwrap()
            .all(|e| !e.unwrap().file_name().to_string_lossy().ends_with(".tmp")));
    }

    #[test]
    fn test_complete_rejects_non_terminal_status() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());
        let result = store.complete(&record("r1"));
        assert!(matches!(result, Err(QueueError::InvalidTransition { .. })));
    }

    #[test]
    fn test_read_missing_record() {
        let dir = tempdir().unwrap();
        let store = QueueStore::new(dir.path());
        assert!(matches!(
            store.read_raw(Partition::Processing, "nope"),
            Err(QueueError::NotFound(_))
        ));
        assert!(store.locate("nope").unwrap().is_none());
    }
}
