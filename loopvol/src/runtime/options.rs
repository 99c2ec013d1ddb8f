//! Configuration for loopvol.

use std::path::PathBuf;

use loopvol_shared::VolumeLayout;
use loopvol_shared::constants::{loop_device, paths, tools, volume};
use loopvol_shared::errors::{LoopvolError, LoopvolResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// Tool Paths
// ============================================================================

/// External tools used to drive the loop subsystem.
///
/// Bare names are looked up through `util::find_binary`; anything containing
/// a `/` is used as given.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    /// Loop attach/detach tool.
    #[serde(default = "default_losetup")]
    pub losetup: String,

    /// Label lookup tool.
    #[serde(default = "default_blkid")]
    pub blkid: String,

    /// ext4 formatter (must accept `-L <label>`).
    #[serde(default = "default_mkfs")]
    pub mkfs: String,
}

fn default_losetup() -> String {
    tools::LOSETUP.to_string()
}

fn default_blkid() -> String {
    tools::BLKID.to_string()
}

fn default_mkfs() -> String {
    tools::MKFS_EXT4.to_string()
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            losetup: default_losetup(),
            blkid: default_blkid(),
            mkfs: default_mkfs(),
        }
    }
}

// ============================================================================
// Loopvol Options
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoopvolOptions {
    /// Directory holding one backing file per volume.
    ///
    /// Default: /tmp/docker-volumes
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Directory scanned for, and receiving, `loop<N>` nodes.
    ///
    /// Default: /dev
    #[serde(default = "default_dev_dir")]
    pub dev_dir: PathBuf,

    /// Size every backing file is pre-allocated to.
    ///
    /// Default: 100 MiB
    #[serde(default = "default_volume_size_bytes")]
    pub volume_size_bytes: u64,

    /// Lowest minor number handed out.
    ///
    /// Default: 1000
    #[serde(default = "default_min_minor")]
    pub min_minor: u32,

    /// Lock file serializing lifecycle operations across processes.
    ///
    /// None: `{root_dir}.lock`
    #[serde(default)]
    pub lock_file: Option<PathBuf>,

    /// Tear down partially created volumes when `create` fails.
    ///
    /// Default: false (partial state is left for `remove` or the operator)
    #[serde(default)]
    pub rollback_on_failure: bool,

    #[serde(default)]
    pub tools: ToolPaths,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_ROOT)
}

fn default_dev_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DEV_DIR)
}

fn default_volume_size_bytes() -> u64 {
    volume::DEFAULT_SIZE_BYTES
}

fn default_min_minor() -> u32 {
    loop_device::MIN_MINOR
}

impl Default for LoopvolOptions {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            dev_dir: default_dev_dir(),
            volume_size_bytes: default_volume_size_bytes(),
            min_minor: default_min_minor(),
            lock_file: None,
            rollback_on_failure: false,
            tools: ToolPaths::default(),
        }
    }
}

impl LoopvolOptions {
    /// Options rooted at `root_dir`, everything else default.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn layout(&self) -> VolumeLayout {
        VolumeLayout::new(&self.root_dir)
    }

    /// Effective lock file path.
    pub fn lock_path(&self) -> PathBuf {
        self.lock_file
            .clone()
            .unwrap_or_else(|| self.layout().lock_file())
    }

    pub fn validate(&self) -> LoopvolResult<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(LoopvolError::Config("root_dir must not be empty".into()));
        }
        if self.dev_dir.as_os_str().is_empty() {
            return Err(LoopvolError::Config("dev_dir must not be empty".into()));
        }
        if self.volume_size_bytes == 0 {
            return Err(LoopvolError::Config(
                "volume_size_bytes must be greater than zero".into(),
            ));
        }
        if i64::try_from(self.volume_size_bytes).is_err() {
            return Err(LoopvolError::Config(format!(
                "volume_size_bytes {} is too large",
                self.volume_size_bytes
            )));
        }
        if self.min_minor > loop_device::MAX_MINOR {
            return Err(LoopvolError::Config(format!(
                "min_minor {} exceeds the kernel limit {}",
                self.min_minor,
                loop_device::MAX_MINOR
            )));
        }
        if let Some(lock) = &self.lock_file
            && lock.starts_with(&self.root_dir)
        {
            return Err(LoopvolError::Config(format!(
                "lock_file {} must not live inside root_dir",
                lock.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = LoopvolOptions::default();
        assert_eq!(opts.root_dir, PathBuf::from("/tmp/docker-volumes"));
        assert_eq!(opts.dev_dir, PathBuf::from("/dev"));
        assert_eq!(opts.volume_size_bytes, 100 * 1024 * 1024);
        assert_eq!(opts.min_minor, 1000);
        assert!(!opts.rollback_on_failure);
        assert_eq!(opts.tools.mkfs, "mkfs.ext4");
        assert_eq!(opts.lock_path(), PathBuf::from("/tmp/docker-volumes.lock"));
        opts.validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: LoopvolOptions =
            serde_json::from_str(r#"{"root_dir": "/srv/vols", "tools": {"blkid": "/sbin/blkid"}}"#)
                .unwrap();
        assert_eq!(opts.root_dir, PathBuf::from("/srv/vols"));
        assert_eq!(opts.dev_dir, PathBuf::from("/dev"));
        assert_eq!(opts.tools.blkid, "/sbin/blkid");
        assert_eq!(opts.tools.losetup, "losetup");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut opts = LoopvolOptions::default();
        opts.volume_size_bytes = 0;
        assert!(matches!(opts.validate(), Err(LoopvolError::Config(_))));

        let mut opts = LoopvolOptions::default();
        opts.min_minor = 1 << 20;
        assert!(opts.validate().is_err());

        let mut opts = LoopvolOptions::with_root("/srv/vols");
        opts.lock_file = Some(PathBuf::from("/srv/vols/.lock"));
        assert!(opts.validate().is_err());
    }
}
