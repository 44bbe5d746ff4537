//! Append-only JSON-lines file repository.
//!
//! One `AuditLogEntry` per line, every organization in the same file, lines
//! in insertion order.  The file is only ever opened for appending; reads
//! parse it from the top.  This is the store the CLI uses so a chain
//! survives between invocations.
//!
//! Separate processes may append to the same file.  `lock_chain` takes an
//! exclusive advisory lock on a sidecar `<store>.lock` file, which strictly
//! serialized writers hold across read-latest + insert.  The lock covers
//! the whole store, not one organization.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use fs2::FileExt;
use tracing::debug;

use provena_contracts::{
    entry::AuditLogEntry,
    error::{LedgerError, LedgerResult},
};
use provena_core::traits::{AuditLogRepository, ChainGuard};

pub struct JsonLinesAuditLogRepository {
    path: PathBuf,
    lock_path: PathBuf,
    /// Serializes appends from this process so lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonLinesAuditLogRepository {
    /// Open the store at `path`, creating the file (not its parent
    /// directories) if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let path = path.into();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| storage_error(&path, "open", e))?;

        debug!(path = %path.display(), "json-lines audit store opened");

        Ok(Self {
            lock_path: lock_path_for(&path),
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Every entry in the file, in insertion order.
    pub fn read_all(&self) -> LedgerResult<Vec<AuditLogEntry>> {
        let contents =
            fs::read_to_string(&self.path).map_err(|e| storage_error(&self.path, "read", e))?;

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| {
                serde_json::from_str(line).map_err(|e| LedgerError::Storage {
                    reason: format!(
                        "malformed entry at {}:{}: {}",
                        self.path.display(),
                        idx + 1,
                        e
                    ),
                })
            })
            .collect()
    }

    fn read_org(&self, org_id: &str) -> LedgerResult<Vec<AuditLogEntry>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.organization_id == org_id)
            .collect())
    }
}

impl AuditLogRepository for JsonLinesAuditLogRepository {
    fn insert(&self, entry: &AuditLogEntry) -> LedgerResult<()> {
        let mut line = serde_json::to_string(entry).map_err(|e| LedgerError::Serialization {
            reason: format!("failed to serialize audit entry {}: {}", entry.id, e),
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| storage_error(&self.path, "open", e))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|e| storage_error(&self.path, "append to", e))
    }

    fn find_latest_by_org(&self, org_id: &str) -> LedgerResult<Option<AuditLogEntry>> {
        Ok(self
            .read_org(org_id)?
            .into_iter()
            .enumerate()
            .max_by_key(|(idx, e)| (e.timestamp, *idx))
            .map(|(_, e)| e))
    }

    fn find_all_by_org_ordered_by_time(&self, org_id: &str) -> LedgerResult<Vec<AuditLogEntry>> {
        let mut entries = self.read_org(org_id)?;
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    fn lock_chain(&self, org_id: &str) -> LedgerResult<Option<ChainGuard>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| storage_error(&self.lock_path, "open lock file for", e))?;
        file.lock_exclusive()
            .map_err(|e| storage_error(&self.lock_path, "lock", e))?;

        debug!(
            organization_id = %org_id,
            lock = %self.lock_path.display(),
            "audit store locked"
        );

        Ok(Some(ChainGuard::new(StoreLock { file })))
    }
}

/// Holds the sidecar lock file; unlocks on drop.
struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// `audit.jsonl` → `audit.jsonl.lock`.
fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn storage_error(path: &Path, op: &str, e: std::io::Error) -> LedgerError {
    LedgerError::Storage {
        reason: format!("failed to {} audit store '{}': {}", op, path.display(), e),
    }
}
