//! Lock store backed by a shared directory.
//!
//! Each resource key maps to `<dir>/<encoded key>.json` holding one
//! [`LockRecord`]. Conditional operations take an OS advisory lock on the
//! sibling `<encoded key>.guard` file, evaluate the precondition against the
//! record on disk, and replace or remove the record before letting go. The OS
//! drops the advisory lock when a holder process dies, so a crash mid-operation
//! cannot wedge the key. Guard files are never deleted.

use super::store::{
    DeleteOutcome, DeletePrecondition, LockStore, WriteOutcome, WritePrecondition,
    evaluate_delete, evaluate_write,
};
use super::types::{LockRecord, ResourceKey};
use crate::error::{GateError, Result};
use crate::fs::{atomic_write, remove_if_exists};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const RECORD_EXTENSION: &str = "json";
const GUARD_EXTENSION: &str = "guard";

/// Backoff between guard `try_lock` attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    guard_timeout: Duration,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created lazily.
    ///
    /// `guard_timeout` bounds how long one operation waits for another process
    /// touching the same key; exceeding it reports the store as unavailable.
    pub fn new(dir: impl Into<PathBuf>, guard_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            guard_timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, key: &ResourceKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_key(key.as_str()), RECORD_EXTENSION))
    }

    fn guard_path(&self, key: &ResourceKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_key(key.as_str()), GUARD_EXTENSION))
    }

    fn lock_key(&self, key: &ResourceKey) -> Result<KeyGuard> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            GateError::StoreUnavailable(format!(
                "failed to create lock directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let guard_path = self.guard_path(key);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&guard_path)
            .map_err(|e| {
                GateError::StoreUnavailable(format!(
                    "failed to open guard file '{}': {}",
                    guard_path.display(),
                    e
                ))
            })?;

        let deadline = Instant::now() + self.guard_timeout;
        let contended = fs2::lock_contended_error();

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(KeyGuard { file }),
                Err(e) if e.raw_os_error() == contended.raw_os_error() => {
                    if Instant::now() >= deadline {
                        return Err(GateError::StoreUnavailable(format!(
                            "timed out after {:?} waiting for guard '{}'",
                            self.guard_timeout,
                            guard_path.display()
                        )));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(GateError::StoreUnavailable(format!(
                        "failed to lock guard file '{}': {}",
                        guard_path.display(),
                        e
                    )));
                }
            }
        }
    }
}

/// Holds the per-key advisory lock until dropped.
struct KeyGuard {
    file: File,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn read_record(path: &Path) -> Result<Option<LockRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(GateError::StoreUnavailable(format!(
                "failed to read lock record '{}': {}",
                path.display(),
                e
            )));
        }
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        GateError::StoreUnavailable(format!(
            "corrupt lock record '{}': {}",
            path.display(),
            e
        ))
    })
}

impl LockStore for FileStore {
    fn read(&self, key: &ResourceKey) -> Result<Option<LockRecord>> {
        // Records are replaced by rename, so an unguarded read never sees a partial file.
        read_record(&self.record_path(key))
    }

    fn conditional_write(
        &self,
        key: &ResourceKey,
        precondition: WritePrecondition,
        record: LockRecord,
    ) -> Result<WriteOutcome> {
        let _guard = self.lock_key(key)?;
        let path = self.record_path(key);

        let outcome = evaluate_write(read_record(&path)?, precondition);
        if matches!(outcome, WriteOutcome::Applied { .. }) {
            atomic_write(&path, record.to_json()?.as_bytes())?;
        }
        Ok(outcome)
    }

    fn delete(&self, key: &ResourceKey, precondition: DeletePrecondition) -> Result<DeleteOutcome> {
        let _guard = self.lock_key(key)?;
        let path = self.record_path(key);

        let outcome = evaluate_delete(read_record(&path)?, precondition);
        if matches!(outcome, DeleteOutcome::Deleted(_)) {
            remove_if_exists(&path)?;
        }
        Ok(outcome)
    }

    fn list(&self) -> Result<Vec<(ResourceKey, LockRecord)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GateError::StoreUnavailable(format!(
                    "failed to read lock directory '{}': {}",
                    self.dir.display(),
                    e
                )));
            }
        };

        let mut locks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                GateError::StoreUnavailable(format!("failed to read lock directory entry: {}", e))
            })?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let key = match decode_key(stem).and_then(|raw| ResourceKey::parse(&raw).ok()) {
                Some(key) => key,
                None => {
                    tracing::warn!(path = %path.display(), "skipping lock file with undecodable name");
                    continue;
                }
            };

            // Released between read_dir and now.
            if let Some(record) = read_record(&path)? {
                locks.push((key, record));
            }
        }

        locks.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(locks)
    }
}

/// Percent-encode everything outside `[A-Za-z0-9._-]` so a key is a flat file name.
pub(crate) fn encode_key(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

pub(crate) fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
