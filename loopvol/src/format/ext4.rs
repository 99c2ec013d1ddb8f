use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use loopvol_shared::errors::{LoopvolError, LoopvolResult};

use super::FilesystemFormatter;
use crate::util;

/// Formats devices with ext4 through `mkfs.ext4`.
pub struct Ext4Formatter {
    mkfs: String,
}

impl Ext4Formatter {
    /// `mkfs` is a tool name or path, resolved with `util::find_binary`.
    pub fn new(mkfs: impl Into<String>) -> Self {
        Self { mkfs: mkfs.into() }
    }

    fn mkfs_path(&self) -> LoopvolResult<PathBuf> {
        util::find_binary(&self.mkfs)
    }
}

impl FilesystemFormatter for Ext4Formatter {
    fn format(&self, device: &Path, label: &str) -> LoopvolResult<()> {
        let mkfs = self.mkfs_path()?;

        tracing::info!("Formatting {} with ext4 (label={})", device.display(), label);
        let start = std::time::Instant::now();

        // https://man7.org/linux/man-pages/man8/mke2fs.8.html
        // -F: force, the target is a loop device rather than a partition
        // -q: quiet
        // -L: volume label, later resolved by `blkid -L`
        let output = util::run_tool(
            &mkfs,
            [
                OsStr::new("-F"),
                OsStr::new("-q"),
                OsStr::new("-L"),
                OsStr::new(label),
                device.as_os_str(),
            ],
        )?;

        if !output.success() {
            return Err(LoopvolError::format(
                format!(
                    "Failed to create filesystem on {} (exit code {:?})",
                    device.display(),
                    output.code()
                ),
                output.combined(),
            ));
        }

        tracing::info!("Formatted {} in {:?}", device.display(), start.elapsed());
        Ok(())
    }
}
