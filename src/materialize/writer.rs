//! Atomic file writer
//!
//! Every file is written to a temporary file in its target directory and
//! then renamed into place, so a reader only ever sees a missing file or a
//! whole one. Writes to the same path take a per-path async lock; unrelated
//! paths are written concurrently. Each write is bounded by a timeout; a
//! write that misses its deadline is abandoned before the rename, so a file
//! reported as failed never appears later.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::errors::{MaterializeError, MaterializeResult};

/// A rendered file waiting to be written, relative to the output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub size: usize,
    /// Hex SHA-256 of the content
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
    pub conflict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct MaterializationResult {
    pub written: Vec<WrittenFile>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
}

impl MaterializationResult {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn sort(&mut self) {
        self.written.sort_by(|a, b| a.path.cmp(&b.path));
        self.skipped.sort_by(|a, b| a.path.cmp(&b.path));
        self.failed.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub overwrite_existing: bool,
    /// Existing files are failures instead of skips
    pub strict: bool,
    pub timeout: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            overwrite_existing: false,
            strict: false,
            timeout: Duration::from_secs(10),
        }
    }
}

impl From<&crate::options::GenerationOptions> for WriteOptions {
    fn from(options: &crate::options::GenerationOptions) -> Self {
        WriteOptions {
            overwrite_existing: options.overwrite_existing,
            strict: options.strict_conflicts,
            timeout: Duration::from_secs(options.write_timeout_secs),
        }
    }
}

enum Outcome {
    Written(WrittenFile),
    Skipped(SkippedFile),
}

pub fn checksum(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Rejects absolute paths and any `..` component
pub fn check_relative(path: &Path) -> MaterializeResult<()> {
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || path.as_os_str().is_empty() {
        return Err(MaterializeError::PathTraversal(path.to_path_buf()));
    }
    Ok(())
}

/// Decides, under one lock, whether a write commits or is abandoned on timeout
#[derive(Debug, Default)]
struct WriteGate {
    abandoned: bool,
    /// Set once the rename ran, true when the target was created or replaced
    committed: Option<bool>,
}

fn lock_gate(gate: &std::sync::Mutex<WriteGate>) -> std::sync::MutexGuard<'_, WriteGate> {
    match gate.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_atomic(
    target: &Path,
    content: &str,
    overwrite: bool,
    gate: &std::sync::Mutex<WriteGate>,
) -> MaterializeResult<bool> {
    let dir = target
        .parent()
        .ok_or_else(|| MaterializeError::PathTraversal(target.to_path_buf()))?;
    std::fs::create_dir_all(dir).map_err(|e| MaterializeError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| MaterializeError::io(target, e))?;
    tmp.write_all(content.as_bytes())
        .and_then(|_| tmp.flush())
        .map_err(|e| MaterializeError::io(target, e))?;

    // The temp file is removed on drop, so an abandoned write leaves nothing behind
    let mut state = lock_gate(gate);
    if state.abandoned {
        return Err(MaterializeError::Aborted {
            path: target.to_path_buf(),
            reason: "abandoned after timeout".to_string(),
        });
    }
    let created = if overwrite {
        tmp.persist(target)
            .map_err(|e| MaterializeError::io(target, e.error))?;
        true
    } else {
        match tmp.persist_noclobber(target) {
            Ok(_) => true,
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => false,
            Err(e) => return Err(MaterializeError::io(target, e.error)),
        }
    };
    state.committed = Some(created);
    Ok(created)
}

/// Writes files under one output root
///
/// Cloning shares the per-path locks, so clones used from different tasks
/// still serialise writes to the same file.
#[derive(Debug, Clone)]
pub struct Materializer {
    root: PathBuf,
    options: WriteOptions,
    locks: Arc<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl Materializer {
    pub fn new(root: impl Into<PathBuf>, options: WriteOptions) -> Self {
        Materializer {
            root: root.into(),
            options,
            locks: Arc::new(std::sync::Mutex::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the lock entry for `path` once no other writer holds or awaits it
    fn release_lock(&self, path: &Path, lock: Arc<Mutex<()>>) {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        match self.locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Writes one file, honouring the overwrite policy
    async fn write_one(&self, file: PendingFile) -> MaterializeResult<Outcome> {
        check_relative(&file.path)?;
        let target = self.root.join(&file.path);

        let lock = self.lock_for(&target);
        let outcome = {
            let _guard = lock.lock().await;
            self.write_locked(&target, file).await
        };
        self.release_lock(&target, lock);
        outcome
    }

    async fn write_locked(&self, target: &Path, file: PendingFile) -> MaterializeResult<Outcome> {
        let target = target.to_path_buf();
        if !self.options.overwrite_existing && target.exists() {
            return self.existing(file.path);
        }

        let size = file.content.len();
        let sum = checksum(&file.content);
        let overwrite = self.options.overwrite_existing;
        let gate = Arc::new(std::sync::Mutex::new(WriteGate::default()));
        let blocking_gate = Arc::clone(&gate);
        let blocking_target = target.clone();
        let write = tokio::task::spawn_blocking(move || {
            write_atomic(&blocking_target, &file.content, overwrite, &blocking_gate)
        });

        let created = match tokio::time::timeout(self.options.timeout, write).await {
            Err(_) => {
                let mut state = lock_gate(&gate);
                match state.committed {
                    // The rename won the race against the deadline
                    Some(created) => created,
                    None => {
                        state.abandoned = true;
                        return Err(MaterializeError::Timeout {
                            path: target,
                            secs: self.options.timeout.as_secs(),
                        });
                    }
                }
            }
            Ok(Err(join_error)) => {
                return Err(MaterializeError::Aborted {
                    path: target,
                    reason: join_error.to_string(),
                })
            }
            Ok(Ok(result)) => result?,
        };

        if !created {
            return self.existing(file.path);
        }
        debug!("Wrote {} ({} bytes)", target.display(), size);
        Ok(Outcome::Written(WrittenFile {
            path: file.path,
            size,
            checksum: sum,
        }))
    }

    fn existing(&self, path: PathBuf) -> MaterializeResult<Outcome> {
        if self.options.strict {
            return Err(MaterializeError::Conflict(path));
        }
        Ok(Outcome::Skipped(SkippedFile {
            path,
            reason: "file exists and overwrite is disabled".to_string(),
        }))
    }

    /// Writes every file, collecting a per-file outcome
    pub async fn materialize(&self, files: Vec<PendingFile>) -> MaterializationResult {
        info!("Materializing {} file(s) under {}", files.len(), self.root.display());
        let mut set = JoinSet::new();
        for file in files {
            let materializer = self.clone();
            let path = file.path.clone();
            set.spawn(async move { (path, materializer.write_one(file).await) });
        }

        let mut result = MaterializationResult::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(Outcome::Written(file)))) => result.written.push(file),
                Ok((_, Ok(Outcome::Skipped(file)))) => result.skipped.push(file),
                Ok((path, Err(error))) => {
                    warn!("Failed to write {}: {}", path.display(), error);
                    result.failed.push(FailedFile {
                        conflict: error.is_conflict(),
                        error: error.to_string(),
                        path,
                    });
                }
                Err(join_error) => {
                    warn!("Write task aborted: {}", join_error);
                    result.failed.push(FailedFile {
                        path: PathBuf::new(),
                        error: join_error.to_string(),
                        conflict: false,
                    });
                }
            }
        }
        result.sort();

        info!(
            "Materialized: {} written, {} skipped, {} failed",
            result.written.len(),
            result.skipped.len(),
            result.failed.len()
        );
        result
    }
}

/// Writes `files` under `root` with a fresh [`Materializer`]
pub async fn materialize(
    files: Vec<PendingFile>,
    root: impl Into<PathBuf>,
    options: WriteOptions,
) -> MaterializationResult {
    Materializer::new(root, options).materialize(files).await
}
