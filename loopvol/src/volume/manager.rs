//! Volume lifecycle: create, list, remove.

use std::path::{Path, PathBuf};

use loopvol_shared::errors::{LoopvolError, LoopvolResult};
use loopvol_shared::layout::{DeviceLayout, parse_loop_minor};
use parking_lot::{Mutex, MutexGuard};

use super::{CreatedVolume, Volume, validate_name};
use crate::format::{Ext4Formatter, FilesystemFormatter};
use crate::loopdev::{DeviceBinder, LoopBinder, MinorAllocator};
use crate::runtime::lock::OperationLock;
use crate::runtime::options::LoopvolOptions;
use crate::store::BackingStore;

/// Held for the duration of one lifecycle operation.
struct OperationGuard<'a> {
    _local: MutexGuard<'a, ()>,
    _file: OperationLock,
}

/// What a failed `create` managed to set up before the failure.
#[derive(Default)]
struct Provisioned {
    backing_file: Option<PathBuf>,
    node: Option<PathBuf>,
    bound: bool,
}

/// Orchestrates backing store, allocator, binder and formatter.
///
/// Stateless between calls: every operation re-derives volumes from the
/// backing store and devices from the device directory and label lookup.
pub struct VolumeManager {
    options: LoopvolOptions,
    store: BackingStore,
    allocator: MinorAllocator,
    binder: Box<dyn DeviceBinder>,
    formatter: Box<dyn FilesystemFormatter>,
    op_lock: Mutex<()>,
}

impl VolumeManager {
    /// Manager driving the host's loop subsystem.
    pub fn new(options: LoopvolOptions) -> LoopvolResult<Self> {
        let binder = Box::new(LoopBinder::new(options.tools.clone()));
        let formatter = Box::new(Ext4Formatter::new(options.tools.mkfs.clone()));
        Self::with_backends(options, binder, formatter)
    }

    /// Manager with explicit device and filesystem backends.
    pub fn with_backends(
        options: LoopvolOptions,
        binder: Box<dyn DeviceBinder>,
        formatter: Box<dyn FilesystemFormatter>,
    ) -> LoopvolResult<Self> {
        options.validate()?;

        let store = BackingStore::new(options.layout(), options.volume_size_bytes);
        let allocator =
            MinorAllocator::new(DeviceLayout::new(&options.dev_dir), options.min_minor);

        Ok(Self {
            options,
            store,
            allocator,
            binder,
            formatter,
            op_lock: Mutex::new(()),
        })
    }

    pub fn options(&self) -> &LoopvolOptions {
        &self.options
    }

    /// Read-only operations share the file lock with each other.
    fn serialize_shared(&self) -> LoopvolResult<OperationGuard<'_>> {
        let local = self.op_lock.lock();
        let file = OperationLock::acquire_shared(&self.options.lock_path())?;
        Ok(OperationGuard {
            _local: local,
            _file: file,
        })
    }

    fn serialize(&self) -> LoopvolResult<OperationGuard<'_>> {
        let local = self.op_lock.lock();
        let file = OperationLock::acquire(&self.options.lock_path())?;
        Ok(OperationGuard {
            _local: local,
            _file: file,
        })
    }

    /// Provision a new volume: backing file, loop node, binding, ext4.
    ///
    /// Any failure after the backing file exists leaves the partial volume in
    /// place unless `rollback_on_failure` is set.
    pub fn create(&self, name: &str) -> LoopvolResult<CreatedVolume> {
        validate_name(name)?;
        let _guard = self.serialize()?;

        let mut provisioned = Provisioned::default();
        match self.provision(name, &mut provisioned) {
            Ok(created) => Ok(created),
            Err(e) => {
                if self.options.rollback_on_failure {
                    self.rollback(name, &provisioned);
                } else if provisioned.backing_file.is_some() {
                    tracing::warn!(
                        volume = name,
                        device = ?provisioned.node,
                        bound = provisioned.bound,
                        "create failed, leaving partial volume for remove"
                    );
                }
                Err(e)
            }
        }
    }

    fn provision(&self, name: &str, provisioned: &mut Provisioned) -> LoopvolResult<CreatedVolume> {
        self.store.ensure_root()?;

        let backing_file = self.store.create_backing_file(name)?;
        provisioned.backing_file = Some(backing_file.clone());

        let node = self.allocator.reserve(self.binder.as_ref())?;
        provisioned.node = Some(node.path.clone());

        // A node removed without being detached leaves its binding behind
        // in the kernel; clear it before reusing the minor.
        let mut ignored = Vec::new();
        if let Err(e) = self.binder.unbind(&node.path) {
            let e = e.ignored(format!("stale detach of {}", node.path.display()));
            tracing::debug!("{}", e);
            ignored.push(e);
        }

        self.binder.bind(&node.path, &backing_file)?;
        provisioned.bound = true;

        self.formatter.format(&node.path, name)?;

        tracing::info!(
            "Created volume {} on {} (backing {})",
            name,
            node.path.display(),
            backing_file.display()
        );

        Ok(CreatedVolume {
            volume: Volume::new(name),
            backing_file,
            device: node.path,
            minor: node.minor,
            ignored,
        })
    }

    /// Undo whatever `provision` set up, best-effort, newest first.
    fn rollback(&self, name: &str, provisioned: &Provisioned) {
        tracing::info!(volume = name, "Rolling back failed create");

        if let Some(node) = &provisioned.node {
            if provisioned.bound {
                self.best_effort("detach", || self.binder.unbind(node));
            }
            self.best_effort("remove node", || self.binder.remove_node(node));
        }
        if provisioned.backing_file.is_some() {
            self.best_effort("delete backing file", || {
                self.store.delete_backing_file(name)
            });
        }
    }

    fn best_effort(&self, step: &str, f: impl FnOnce() -> LoopvolResult<()>) {
        if let Err(e) = f() {
            tracing::warn!("{}", e.ignored(step));
        }
    }

    /// Every volume in the backing store, sorted by name.
    pub fn list(&self) -> LoopvolResult<Vec<Volume>> {
        let _guard = self.serialize_shared()?;
        self.store.ensure_root()?;

        let volumes: Vec<Volume> = self
            .store
            .list_backing_files()?
            .into_iter()
            .map(Volume::new)
            .collect();

        tracing::debug!("Listed {} volume(s)", volumes.len());
        Ok(volumes)
    }

    /// Look up a single volume by name.
    pub fn get(&self, name: &str) -> LoopvolResult<Option<Volume>> {
        validate_name(name)?;
        Ok(self.store.exists(name).then(|| Volume::new(name)))
    }

    /// Tear down a volume: detach its device, delete the backing file,
    /// remove the node. The first failing step aborts the rest.
    ///
    /// Nothing is detached unless `name` has a backing file and its label
    /// resolves to a node this manager could have allocated.
    pub fn remove(&self, name: &str) -> LoopvolResult<()> {
        validate_name(name)?;
        let _guard = self.serialize()?;

        if !self.store.exists(name) {
            return Err(LoopvolError::NotFound(format!("volume {} does not exist", name)));
        }

        let device = self.binder.find_device_by_label(name).map_err(|e| match e {
            LoopvolError::NotFound(_) => {
                LoopvolError::NotFound(format!("volume {} has no bound device", name))
            }
            other => other,
        })?;
        self.check_managed_device(name, &device)?;
        tracing::info!("Detaching loopback device {} for volume {}", device.display(), name);

        self.binder.unbind(&device)?;
        self.store.delete_backing_file(name)?;
        self.binder.remove_node(&device)?;

        tracing::info!("Removed volume {}", name);
        Ok(())
    }

    /// Refuse devices outside the device directory or below the minor floor.
    /// Those belong to the host, even when they carry a volume's label.
    fn check_managed_device(&self, name: &str, device: &Path) -> LoopvolResult<()> {
        let in_dev_dir = device.parent() == Some(self.options.dev_dir.as_path());
        let minor = device
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_loop_minor);

        match minor {
            Some(minor) if in_dev_dir && minor >= self.options.min_minor => Ok(()),
            _ => Err(LoopvolError::device(
                format!(
                    "Label {} resolves to {}, which loopvol does not manage; refusing to detach it",
                    name,
                    device.display()
                ),
                "",
            )),
        }
    }

    /// Loop devices are attached from the moment they are bound.
    pub fn attach(&self, name: &str) -> LoopvolResult<()> {
        validate_name(name)?;
        tracing::debug!(volume = name, "attach is a no-op for loop volumes");
        Ok(())
    }

    /// See `attach`.
    pub fn detach(&self, name: &str) -> LoopvolResult<()> {
        validate_name(name)?;
        tracing::debug!(volume = name, "detach is a no-op for loop volumes");
        Ok(())
    }
}
