//! Test fixtures for loopvol.
//!
//! `FakeHost` stands in for the kernel loop subsystem: device nodes are plain
//! files in a temp directory, bindings and filesystem labels live in memory.
//! `TestVolumes` wires a `VolumeManager` to a fresh temp root and a `FakeHost`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use loopvol::format::FilesystemFormatter;
use loopvol::loopdev::DeviceBinder;
use loopvol::{LoopvolOptions, VolumeManager};
use loopvol_shared::errors::{LoopvolError, LoopvolResult};
use parking_lot::Mutex;
use tempfile::TempDir;

/// Backing file size used by fixtures (1 MiB keeps tests cheap).
pub const TEST_VOLUME_SIZE: u64 = 1024 * 1024;

/// A primitive invoked on the fake host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeCall {
    CreateNode(PathBuf, u32),
    Bind(PathBuf, PathBuf),
    Unbind(PathBuf),
    FindByLabel(String),
    RemoveNode(PathBuf),
    Format(PathBuf, String),
}

#[derive(Default)]
struct FakeState {
    /// device -> backing file
    bindings: HashMap<PathBuf, PathBuf>,
    /// label -> device
    labels: HashMap<String, PathBuf>,
    calls: Vec<FakeCall>,
    fail_bind: bool,
    fail_format: bool,
    fail_unbind_bound: bool,
}

/// In-memory loop subsystem. Clones share state.
#[derive(Clone, Default)]
pub struct FakeHost {
    state: Arc<Mutex<FakeState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Backing file bound to `device`, if any.
    pub fn binding(&self, device: &Path) -> Option<PathBuf> {
        self.state.lock().bindings.get(device).cloned()
    }

    /// Device carrying `label`, if any.
    pub fn labelled(&self, label: &str) -> Option<PathBuf> {
        self.state.lock().labels.get(label).cloned()
    }

    pub fn bound_devices(&self) -> usize {
        self.state.lock().bindings.len()
    }

    pub fn fail_bind(&self, fail: bool) {
        self.state.lock().fail_bind = fail;
    }

    pub fn fail_format(&self, fail: bool) {
        self.state.lock().fail_format = fail;
    }

    /// Make detaching a bound device fail.
    pub fn fail_unbind_bound(&self, fail: bool) {
        self.state.lock().fail_unbind_bound = fail;
    }

    /// Pretend an earlier run left `label` on `device`.
    pub fn seed_label(&self, label: &str, device: &Path, backing: &Path) {
        let mut state = self.state.lock();
        state
            .bindings
            .insert(device.to_path_buf(), backing.to_path_buf());
        state
            .labels
            .insert(label.to_string(), device.to_path_buf());
    }
}

impl DeviceBinder for FakeHost {
    fn create_node(&self, path: &Path, minor: u32) -> LoopvolResult<()> {
        self.state
            .lock()
            .calls
            .push(FakeCall::CreateNode(path.to_path_buf(), minor));

        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    LoopvolError::AlreadyExists(path.display().to_string())
                }
                _ => LoopvolError::device("mknod failed", e.to_string()),
            })?;
        Ok(())
    }

    fn bind(&self, path: &Path, backing: &Path) -> LoopvolResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(FakeCall::Bind(path.to_path_buf(), backing.to_path_buf()));

        if state.fail_bind {
            return Err(LoopvolError::device(
                format!("Failed to setup loopback device node {}", path.display()),
                "losetup: injected failure",
            ));
        }
        if state.bindings.contains_key(path) {
            return Err(LoopvolError::device(
                format!("Failed to setup loopback device node {}", path.display()),
                "losetup: device or resource busy",
            ));
        }
        if !path.exists() {
            return Err(LoopvolError::device(
                format!("Failed to setup loopback device node {}", path.display()),
                "losetup: no such file or directory",
            ));
        }

        state
            .bindings
            .insert(path.to_path_buf(), backing.to_path_buf());
        Ok(())
    }

    fn unbind(&self, path: &Path) -> LoopvolResult<()> {
        let mut state = self.state.lock();
        state.calls.push(FakeCall::Unbind(path.to_path_buf()));

        if !state.bindings.contains_key(path) {
            return Err(LoopvolError::device(
                format!("Failed to detach loopback device node {}", path.display()),
                "losetup: No such device or address",
            ));
        }
        if state.fail_unbind_bound {
            return Err(LoopvolError::device(
                format!("Failed to detach loopback device node {}", path.display()),
                "losetup: injected failure",
            ));
        }

        state.bindings.remove(path);
        // A detached device no longer exposes its superblock
        state.labels.retain(|_, device| device != path);
        Ok(())
    }

    fn find_device_by_label(&self, label: &str) -> LoopvolResult<PathBuf> {
        let mut state = self.state.lock();
        state.calls.push(FakeCall::FindByLabel(label.to_string()));

        state
            .labels
            .get(label)
            .cloned()
            .ok_or_else(|| LoopvolError::NotFound(format!("no device carries label {}", label)))
    }

    fn remove_node(&self, path: &Path) -> LoopvolResult<()> {
        self.state
            .lock()
            .calls
            .push(FakeCall::RemoveNode(path.to_path_buf()));

        std::fs::remove_file(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoopvolError::NotFound(path.display().to_string()),
            _ => LoopvolError::device("remove node failed", e.to_string()),
        })
    }
}

impl FilesystemFormatter for FakeHost {
    fn format(&self, device: &Path, label: &str) -> LoopvolResult<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(FakeCall::Format(device.to_path_buf(), label.to_string()));

        if state.fail_format {
            return Err(LoopvolError::format(
                format!("Failed to create filesystem on {}", device.display()),
                "mkfs.ext4: injected failure",
            ));
        }
        if !state.bindings.contains_key(device) {
            return Err(LoopvolError::format(
                format!("Failed to create filesystem on {}", device.display()),
                "mkfs.ext4: Device size reported to be zero",
            ));
        }

        state
            .labels
            .insert(label.to_string(), device.to_path_buf());
        Ok(())
    }
}

/// A `VolumeManager` over a temp root and device directory.
pub struct TestVolumes {
    pub manager: VolumeManager,
    pub host: FakeHost,
    pub root: PathBuf,
    pub dev_dir: PathBuf,
    _dir: TempDir,
}

impl TestVolumes {
    pub fn new() -> Self {
        Self::with_options(|_| {})
    }

    /// Fixture with options adjusted by `configure` before the manager is built.
    pub fn with_options(configure: impl FnOnce(&mut LoopvolOptions)) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path().join("vols");
        let dev_dir = dir.path().join("dev");
        std::fs::create_dir_all(&dev_dir).expect("Failed to create dev dir");

        let mut options = LoopvolOptions::with_root(&root);
        options.dev_dir = dev_dir.clone();
        options.volume_size_bytes = TEST_VOLUME_SIZE;
        configure(&mut options);

        let host = FakeHost::new();
        let manager =
            VolumeManager::with_backends(options, Box::new(host.clone()), Box::new(host.clone()))
                .expect("Failed to build volume manager");

        Self {
            manager,
            host,
            root,
            dev_dir,
            _dir: dir,
        }
    }

    /// Create a placeholder `loop<minor>` node.
    pub fn touch_node(&self, minor: u32) -> PathBuf {
        let path = self.dev_dir.join(format!("loop{}", minor));
        std::fs::write(&path, "").expect("Failed to create node placeholder");
        path
    }

    /// Names of files currently in the root (empty if the root is missing).
    pub fn backing_files(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// Names of files currently in the device directory.
    pub fn nodes(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dev_dir)
            .expect("Failed to read dev dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for TestVolumes {
    fn default() -> Self {
        Self::new()
    }
}
