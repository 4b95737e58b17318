/*!
# Backup session

Keeps a pristine copy of every file before the first byte of it is
rewritten and puts the copies back at the end of the run.

`X` is copied to `X` + suffix. Restoring removes the rewritten `X` and renames
the copy back. Restoration is best effort: a missing or unrestorable backup
is reported and the remaining files are still restored.

A session that is dropped with backups still pending restores them, so an
early return or a panic between backup and restore does not leave rewritten
sources behind.
*/

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::DevirtError;

/// Default suffix of backup copies
pub const DEFAULT_BACKUP_SUFFIX: &str = ".noifgo.bak";

/// One file tracked by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    pub backup: PathBuf,
    pub backed_up: bool,
}

/// Outcome of [`BackupSession::restore_all`]
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<PathBuf>,
    /// Files whose backup vanished before restoration
    pub missing: Vec<PathBuf>,
    /// Files that could not be put back
    pub failed: Vec<(PathBuf, DevirtError)>,
}

impl RestoreReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.failed.is_empty()
    }
}

impl fmt::Display for RestoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} restored", self.restored.len())?;
        if !self.missing.is_empty() {
            write!(f, ", {} missing backups", self.missing.len())?;
        }
        if !self.failed.is_empty() {
            write!(f, ", {} unrecoverable", self.failed.len())?;
        }
        Ok(())
    }
}

/// Owner of every backup taken during one run
#[derive(Debug)]
pub struct BackupSession {
    suffix: String,
    entries: Vec<BackupEntry>,
}

impl BackupSession {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[BackupEntry] {
        &self.entries
    }

    /// Sibling path the backup of `path` is written to.
    pub fn backup_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(&self.suffix);
        PathBuf::from(name)
    }

    /// Copies `path` to its backup the first time it is seen.
    ///
    /// Refuses to overwrite a backup this session did not write, because
    /// that copy may be the only pristine version of the file.
    pub fn ensure_backup(&mut self, path: &Path) -> Result<(), DevirtError> {
        if self.entries.iter().any(|e| e.path == path && e.backed_up) {
            return Ok(());
        }

        let backup = self.backup_path(path);
        if backup.exists() {
            return Err(DevirtError::StaleBackup {
                path: path.to_path_buf(),
                backup,
            });
        }
        fs::copy(path, &backup).map_err(|e| DevirtError::io(path, e))?;
        tracing::debug!("backed up {} to {}", path.display(), backup.display());

        self.entries.retain(|e| e.path != path);
        self.entries.push(BackupEntry {
            path: path.to_path_buf(),
            backup,
            backed_up: true,
        });
        Ok(())
    }

    /// Restores every backed up file; never stops at the first failure.
    pub fn restore_all(&mut self) -> RestoreReport {
        let mut report = RestoreReport::default();
        for entry in self.entries.drain(..).filter(|e| e.backed_up) {
            if !entry.backup.exists() {
                tracing::warn!("backup of {} is missing", entry.path.display());
                report.missing.push(entry.path);
                continue;
            }
            match restore_one(&entry) {
                Ok(()) => {
                    tracing::debug!("restored {}", entry.path.display());
                    report.restored.push(entry.path);
                }
                Err(err) => {
                    tracing::error!("could not restore {}: {}", entry.path.display(), err);
                    report.failed.push((entry.path, err));
                }
            }
        }
        report
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| e.backed_up)
    }
}

impl Drop for BackupSession {
    fn drop(&mut self) {
        if self.has_pending() {
            let report = self.restore_all();
            tracing::warn!("backup session dropped with pending backups: {}", report);
        }
    }
}

fn restore_one(entry: &BackupEntry) -> Result<(), DevirtError> {
    if entry.path.exists() {
        fs::remove_file(&entry.path).map_err(|e| DevirtError::io(&entry.path, e))?;
    }
    fs::rename(&entry.backup, &entry.path).map_err(|e| DevirtError::io(&entry.backup, e))
}
