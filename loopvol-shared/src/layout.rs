//! Filesystem layout definitions for backing files and loop device nodes.
//!
//! - `VolumeLayout`: backing-store root, one file per volume
//! - `DeviceLayout`: device directory holding `loop<minor>` nodes

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::constants::loop_device::NAME_PREFIX;

/// Suffix appended to the root's file name to form the lock file.
const LOCK_SUFFIX: &str = ".lock";

// ============================================================================
// VOLUME LAYOUT
// ============================================================================

/// Backing-store directory layout.
///
/// ```text
/// {root}.lock        # operation lock (sibling, never listed as a volume)
/// {root}/
/// ├── {volume-1}     # backing file, named exactly as the volume
/// └── {volume-2}
/// ```
#[derive(Clone, Debug)]
pub struct VolumeLayout {
    root: PathBuf,
}

impl VolumeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory holding backing files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Backing file of a volume: {root}/{name}
    pub fn backing_file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Default lock file: {root}.lock
    ///
    /// Kept outside the root so the lock never shows up as a volume.
    pub fn lock_file(&self) -> PathBuf {
        let mut name = self
            .root
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("loopvol"));
        name.push(LOCK_SUFFIX);
        match self.root.parent() {
            Some(parent) => parent.join(name),
            None => PathBuf::from("/").join(name),
        }
    }
}

// ============================================================================
// DEVICE LAYOUT
// ============================================================================

/// Device directory layout (`/dev` on a real host).
#[derive(Clone, Debug)]
pub struct DeviceLayout {
    dev_dir: PathBuf,
}

impl DeviceLayout {
    pub fn new(dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
        }
    }

    pub fn dev_dir(&self) -> &Path {
        &self.dev_dir
    }

    /// Node path for a minor: {dev_dir}/loop{minor}
    pub fn node_path(&self, minor: u32) -> PathBuf {
        self.dev_dir.join(format!("{}{}", NAME_PREFIX, minor))
    }
}

/// Parse the minor number out of a loop node name.
///
/// Only `loop<digits>` matches; `loop-control`, `loop0p1` and names
/// without the prefix return `None`.
pub fn parse_loop_minor(file_name: &str) -> Option<u32> {
    let suffix = file_name.strip_prefix(NAME_PREFIX)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}
