//! Loop device node creation and binding.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use loopvol_shared::constants::loop_device::{MAJOR, NODE_MODE};
use loopvol_shared::constants::tools::BLKID_NOT_FOUND_EXIT;
use loopvol_shared::errors::{LoopvolError, LoopvolResult};
use loopvol_shared::layout::parse_loop_minor;
use nix::errno::Errno;
use nix::sys::stat::{Mode, SFlag, makedev, mknod};

use crate::runtime::options::ToolPaths;
use crate::util::{self, ToolOutput};

/// Primitives for managing loop device nodes and their bindings.
///
/// `LoopBinder` talks to the real kernel; tests substitute an in-memory host.
pub trait DeviceBinder: Send + Sync {
    /// Create a block node at `path` with the loop major and `minor`.
    ///
    /// Must fail with `AlreadyExists` if `path` exists, so node creation
    /// doubles as minor reservation.
    fn create_node(&self, path: &Path, minor: u32) -> LoopvolResult<()>;

    /// Attach `backing` to the loop device at `path`.
    fn bind(&self, path: &Path, backing: &Path) -> LoopvolResult<()>;

    /// Detach whatever is attached at `path`.
    fn unbind(&self, path: &Path) -> LoopvolResult<()>;

    /// Resolve the device currently carrying filesystem label `label`.
    fn find_device_by_label(&self, label: &str) -> LoopvolResult<PathBuf>;

    /// Delete the node file at `path`.
    fn remove_node(&self, path: &Path) -> LoopvolResult<()>;
}

/// Host implementation: mknod(2), `losetup` and `blkid`.
pub struct LoopBinder {
    tools: ToolPaths,
}

impl LoopBinder {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }

    fn losetup<I, S>(&self, args: I) -> LoopvolResult<ToolOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let losetup = util::find_binary(&self.tools.losetup)?;
        util::run_tool(&losetup, args)
    }
}

impl DeviceBinder for LoopBinder {
    fn create_node(&self, path: &Path, minor: u32) -> LoopvolResult<()> {
        let dev = makedev(MAJOR, u64::from(minor));
        match mknod(path, SFlag::S_IFBLK, Mode::from_bits_truncate(NODE_MODE), dev) {
            Ok(()) => {
                tracing::debug!("Created device node {} ({}:{})", path.display(), MAJOR, minor);
                Ok(())
            }
            Err(Errno::EEXIST) => Err(LoopvolError::AlreadyExists(format!(
                "device node {} already exists",
                path.display()
            ))),
            Err(errno) => Err(LoopvolError::device(
                format!("Failed to make device node {}", path.display()),
                errno.desc(),
            )),
        }
    }

    fn bind(&self, path: &Path, backing: &Path) -> LoopvolResult<()> {
        let output = self.losetup([path.as_os_str(), backing.as_os_str()])?;
        if !output.success() {
            return Err(LoopvolError::device(
                format!(
                    "Failed to setup loopback device node {} for backing file {} (exit code {:?})",
                    path.display(),
                    backing.display(),
                    output.code()
                ),
                output.combined(),
            ));
        }

        tracing::info!("Bound {} to {}", path.display(), backing.display());
        Ok(())
    }

    fn unbind(&self, path: &Path) -> LoopvolResult<()> {
        let output = self.losetup([std::ffi::OsStr::new("-d"), path.as_os_str()])?;
        if !output.success() {
            return Err(LoopvolError::device(
                format!(
                    "Failed to detach loopback device node {} (exit code {:?})",
                    path.display(),
                    output.code()
                ),
                output.combined(),
            ));
        }

        tracing::info!("Detached loopback device {}", path.display());
        Ok(())
    }

    fn find_device_by_label(&self, label: &str) -> LoopvolResult<PathBuf> {
        let blkid = util::find_binary(&self.tools.blkid)?;
        let output = util::run_tool(&blkid, ["-L", label])?;

        if output.code() == Some(BLKID_NOT_FOUND_EXIT) {
            return Err(LoopvolError::NotFound(format!(
                "no device carries label {}",
                label
            )));
        }
        if !output.success() {
            return Err(LoopvolError::device(
                format!(
                    "Failed to find device for label {} via blkid (exit code {:?})",
                    label,
                    output.code()
                ),
                output.combined(),
            ));
        }

        parse_label_lookup(label, &output.stdout)
    }

    fn remove_node(&self, path: &Path) -> LoopvolResult<()> {
        std::fs::remove_file(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                LoopvolError::NotFound(format!("device node {} does not exist", path.display()))
            }
            _ => LoopvolError::device(
                format!("Failed to remove device node {}", path.display()),
                e.to_string(),
            ),
        })?;

        tracing::debug!("Removed device node {}", path.display());
        Ok(())
    }
}

/// Interpret `blkid -L` stdout: the first line is the device path, and it
/// has to name a loop device.
pub fn parse_label_lookup(label: &str, stdout: &str) -> LoopvolResult<PathBuf> {
    let device = stdout.lines().next().map(str::trim).unwrap_or_default();
    if device.is_empty() {
        return Err(LoopvolError::NotFound(format!(
            "no device carries label {}",
            label
        )));
    }

    let device = PathBuf::from(device);
    let is_loop = device
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_loop_minor)
        .is_some();
    if !is_loop {
        return Err(LoopvolError::device(
            format!(
                "Label {} resolves to {}, which is not a loop device; refusing to tear it down",
                label,
                device.display()
            ),
            stdout.trim(),
        ));
    }

    Ok(device)
}
