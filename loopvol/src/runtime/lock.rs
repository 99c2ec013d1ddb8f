//! Cross-process lock serializing volume lifecycle operations.
//!
//! Uses flock(2) on a lock file so that two `loopvol` processes never run
//! the minor scan, node creation and bind steps at the same time. Readers
//! take the lock shared and only need read access to the lock file.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use loopvol_shared::errors::{LoopvolError, LoopvolResult};

/// Guard holding a lock on a lock file.
///
/// The lock is released when the guard is dropped, or when the process
/// exits/crashes.
#[derive(Debug)]
pub struct OperationLock {
    file: File,
    path: PathBuf,
}

impl OperationLock {
    /// Acquire the lock, blocking until any other holder releases it.
    pub fn acquire(lock_path: &Path) -> LoopvolResult<Self> {
        Self::lock(lock_path, libc::LOCK_EX)
    }

    /// Acquire the lock without waiting.
    ///
    /// Fails with `Internal` if another holder has it.
    pub fn try_acquire(lock_path: &Path) -> LoopvolResult<Self> {
        Self::lock(lock_path, libc::LOCK_EX | libc::LOCK_NB)
    }

    /// Acquire the lock shared, blocking while a writer holds it.
    ///
    /// An existing lock file is opened read-only.
    pub fn acquire_shared(lock_path: &Path) -> LoopvolResult<Self> {
        match OpenOptions::new().read(true).open(lock_path) {
            Ok(file) => Self::flock(file, lock_path, libc::LOCK_SH),
            Err(e) if e.kind() == ErrorKind::NotFound => Self::lock(lock_path, libc::LOCK_SH),
            Err(e) => Err(LoopvolError::Environment(format!(
                "failed to open lock file {}: {}",
                lock_path.display(),
                e
            ))),
        }
    }

    fn lock(lock_path: &Path, operation: libc::c_int) -> LoopvolResult<Self> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LoopvolError::Environment(format!(
                    "failed to create lock directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| {
                LoopvolError::Environment(format!(
                    "failed to open lock file {}: {}",
                    lock_path.display(),
                    e
                ))
            })?;

        Self::flock(file, lock_path, operation)
    }

    fn flock(file: File, lock_path: &Path, operation: libc::c_int) -> LoopvolResult<Self> {
        let result = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::WouldBlock {
                return Err(LoopvolError::Internal(format!(
                    "Another loopvol operation holds the lock: {}",
                    lock_path.display()
                )));
            }
            return Err(LoopvolError::Environment(format!(
                "failed to acquire lock {}: {}",
                lock_path.display(),
                err
            )));
        }

        tracing::debug!(lock_path = %lock_path.display(), "Acquired operation lock");

        Ok(OperationLock {
            file,
            path: lock_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        tracing::debug!(lock_path = %self.path.display(), "Released operation lock");
    }
}
