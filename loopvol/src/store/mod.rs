//! Backing-file store.
//!
//! One regular file per volume under the root directory. The directory
//! listing is the volume registry; nothing else is persisted.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use loopvol_shared::VolumeLayout;
use loopvol_shared::constants::volume::BACKING_FILE_MODE;
use loopvol_shared::errors::{LoopvolError, LoopvolResult};
use nix::errno::Errno;
use nix::fcntl::{FallocateFlags, fallocate};

pub struct BackingStore {
    layout: VolumeLayout,
    size_bytes: u64,
}

impl BackingStore {
    pub fn new(layout: VolumeLayout, size_bytes: u64) -> Self {
        Self { layout, size_bytes }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn backing_path(&self, name: &str) -> PathBuf {
        self.layout.backing_file(name)
    }

    /// Make sure the root directory exists. Idempotent.
    pub fn ensure_root(&self) -> LoopvolResult<()> {
        let root = self.layout.root();
        std::fs::create_dir_all(root).map_err(|e| {
            LoopvolError::Environment(format!(
                "Failed to create backing root {}: {}",
                root.display(),
                e
            ))
        })
    }

    /// Exclusively create the backing file of `name` and pre-allocate it.
    ///
    /// An existing file means the volume exists: `AlreadyExists`.
    pub fn create_backing_file(&self, name: &str) -> LoopvolResult<PathBuf> {
        let path = self.backing_path(name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(BACKING_FILE_MODE)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => LoopvolError::AlreadyExists(format!(
                    "backing file {} already exists",
                    path.display()
                )),
                _ => LoopvolError::Storage(format!(
                    "Failed to create backing file {}: {}",
                    path.display(),
                    e
                )),
            })?;

        self.allocate(&file, &path)?;

        tracing::info!(
            "Created backing file: {} ({}MiB)",
            path.display(),
            self.size_bytes / (1024 * 1024)
        );
        Ok(path)
    }

    /// Reserve blocks up front so writes through the loop device cannot hit
    /// ENOSPC later. Filesystems without fallocate get a sparse file.
    fn allocate(&self, file: &File, path: &Path) -> LoopvolResult<()> {
        // validated by LoopvolOptions::validate
        let len = self.size_bytes as libc::off_t;
        let result = fallocate(file, FallocateFlags::empty(), 0, len);
        self.finish_allocation(result, file, path)
    }

    fn finish_allocation(
        &self,
        result: nix::Result<()>,
        file: &File,
        path: &Path,
    ) -> LoopvolResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(Errno::EOPNOTSUPP) => {
                tracing::warn!(
                    "fallocate unsupported for {}, falling back to sparse file",
                    path.display()
                );
                file.set_len(self.size_bytes).map_err(|e| {
                    LoopvolError::Storage(format!("Failed to size {}: {}", path.display(), e))
                })
            }
            Err(errno) => Err(LoopvolError::Storage(format!(
                "Failed to allocate {} with error: {}",
                path.display(),
                errno.desc()
            ))),
        }
    }

    /// Names of every backing file, sorted.
    pub fn list_backing_files(&self) -> LoopvolResult<Vec<String>> {
        let root = self.layout.root();
        let entries = std::fs::read_dir(root).map_err(|e| {
            LoopvolError::Environment(format!("Failed to read {}: {}", root.display(), e))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                LoopvolError::Environment(format!("Failed to read {}: {}", root.display(), e))
            })?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                tracing::debug!("Skipping directory in backing root: {:?}", entry.file_name());
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        names.sort();
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.backing_path(name).is_file()
    }

    /// Remove the backing file of `name`. Absent file: `NotFound`.
    pub fn delete_backing_file(&self, name: &str) -> LoopvolResult<()> {
        let path = self.backing_path(name);
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                LoopvolError::NotFound(format!("backing file {} does not exist", path.display()))
            }
            _ => LoopvolError::Storage(format!(
                "Failed to remove backing file {}: {}",
                path.display(),
                e
            )),
        })?;

        tracing::info!("Removed backing file: {}", path.display());
        Ok(())
    }
}
