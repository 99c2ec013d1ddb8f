//! Filesystem creation on bound loop devices.
//!
//! The label written here is the only durable link between a volume name
//! and its device.

mod ext4;

use std::path::Path;

use loopvol_shared::errors::LoopvolResult;

pub use ext4::Ext4Formatter;

/// Lays down a filesystem labelled `label` on `device`.
pub trait FilesystemFormatter: Send + Sync {
    fn format(&self, device: &Path, label: &str) -> LoopvolResult<()>;
}
