//! Crash-safe staging of target-directory writes
//!
//! In the default transactional mode every requested write lands in a
//! sibling `<path>.tmp.<txid>` file. [`MigrationTransaction::commit`]
//! publishes all staged files at once, moving any pre-existing targets to
//! `<path>.bak.<txid>`; dropping the transaction without committing
//! restores the pre-transaction state and removes the staging files.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::fsio::{FileStreamProvider, IoFailure, ReadStream, WriteStream};

/// How writes requested through the transaction reach the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Stage writes, publish on commit, revert on drop.
    Transactional,
    /// Write directly to the destination, no backups.
    WriteThrough,
    /// Discard all writes.
    DryRun,
}

pub struct MigrationTransaction {
    mode: TransactionMode,
    transaction_id: String,
    staged: Mutex<BTreeSet<PathBuf>>,
}

impl MigrationTransaction {
    pub fn new(mode: TransactionMode) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            mode,
            transaction_id: timestamp.to_string(),
            staged: Mutex::new(BTreeSet::new()),
        }
    }

    /// Maps the CLI flags onto a mode: `--dry-run` wins over
    /// `--no-backup`, and with neither the default is transactional.
    pub fn from_flags(no_backup: bool, dry_run: bool) -> Self {
        let mode = if dry_run {
            TransactionMode::DryRun
        } else if no_backup {
            TransactionMode::WriteThrough
        } else {
            TransactionMode::Transactional
        };
        Self::new(mode)
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Publishes every staged file: existing destinations move to their
    /// backup name, then staging files move into place.
    ///
    /// Individual rename failures are logged and do not abort the pass.
    pub fn commit(&self) {
        if self.mode != TransactionMode::Transactional {
            return;
        }

        let staged = std::mem::take(&mut *self.staged.lock());
        if staged.is_empty() {
            return;
        }

        info!("committing changes");

        for path in staged {
            if path.exists() {
                if let Err(e) = fs::rename(&path, self.backup_path(&path)) {
                    warn!("unable to back up \"{}\": {}", path.display(), e);
                }
            }

            let temporary = self.temporary_path(&path);
            if let Err(e) = fs::rename(&temporary, &path) {
                warn!(
                    "unable to publish \"{}\", staged data left at \"{}\": {}",
                    path.display(),
                    temporary.display(),
                    e
                );
            }
        }
    }

    fn temporary_path(&self, path: &Path) -> PathBuf {
        self.suffixed_path(path, "tmp")
    }

    fn backup_path(&self, path: &Path) -> PathBuf {
        self.suffixed_path(path, "bak")
    }

    fn suffixed_path(&self, path: &Path, kind: &str) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(format!(".{}.{}", kind, self.transaction_id));
        PathBuf::from(name)
    }

    fn create_parents(&self, path: &Path) -> Result<(), IoFailure> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| IoFailure::new(path, e))?;
            }
        }
        Ok(())
    }
}

impl FileStreamProvider for MigrationTransaction {
    fn read_stream(&self, path: &Path) -> Result<ReadStream, IoFailure> {
        let actual = if self.mode == TransactionMode::Transactional
            && self.staged.lock().contains(path)
        {
            self.temporary_path(path)
        } else {
            path.to_owned()
        };

        let file = File::open(&actual).map_err(|e| IoFailure::new(path, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn write_stream(&self, path: &Path) -> Result<WriteStream, IoFailure> {
        match self.mode {
            TransactionMode::DryRun => Ok(Box::new(io::sink())),
            TransactionMode::WriteThrough => {
                self.create_parents(path)?;
                let file = File::create(path).map_err(|e| IoFailure::new(path, e))?;
                Ok(Box::new(BufWriter::new(file)))
            }
            TransactionMode::Transactional => {
                self.create_parents(path)?;
                let mut staged = self.staged.lock();
                let file = File::create(self.temporary_path(path))
                    .map_err(|e| IoFailure::new(path, e))?;
                staged.insert(path.to_owned());
                Ok(Box::new(BufWriter::new(file)))
            }
        }
    }
}

impl Drop for MigrationTransaction {
    fn drop(&mut self) {
        if self.mode != TransactionMode::Transactional {
            return;
        }

        let staged = std::mem::take(&mut *self.staged.lock());
        if staged.is_empty() {
            return;
        }

        info!("reverting changes");

        for path in staged {
            let backup = self.backup_path(&path);
            if !path.exists() && backup.exists() {
                if let Err(e) = fs::rename(&backup, &path) {
                    warn!("unable to restore \"{}\": {}", path.display(), e);
                }
            }

            let temporary = self.temporary_path(&path);
            if temporary.exists() {
                if let Err(e) = fs::remove_file(&temporary) {
                    warn!("leftover staging file \"{}\": {}", temporary.display(), e);
                }
            }
        }
    }
}
