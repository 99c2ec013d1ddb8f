//! Loop minor number allocation.

use std::path::PathBuf;

use loopvol_shared::constants::loop_device::{MAX_MINOR, MAX_RESERVE_ATTEMPTS};
use loopvol_shared::errors::{LoopvolError, LoopvolResult};
use loopvol_shared::layout::{DeviceLayout, parse_loop_minor};

use super::binder::DeviceBinder;

/// A device node created for a freshly reserved minor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedNode {
    pub minor: u32,
    pub path: PathBuf,
}

/// Picks loop minors by scanning the device directory.
///
/// The directory is the only record of which minors are taken; nothing is
/// tracked in memory.
pub struct MinorAllocator {
    layout: DeviceLayout,
    min_minor: u32,
}

impl MinorAllocator {
    pub fn new(layout: DeviceLayout, min_minor: u32) -> Self {
        Self { layout, min_minor }
    }

    /// One past the highest `loop<N>` node present, never below `min_minor`.
    ///
    /// Advisory only: the minor is not reserved. Use `reserve` to claim one.
    pub fn next_free_minor(&self) -> LoopvolResult<u32> {
        let dev_dir = self.layout.dev_dir();
        let entries = std::fs::read_dir(dev_dir).map_err(|e| {
            LoopvolError::Environment(format!("Failed to read {}: {}", dev_dir.display(), e))
        })?;

        let max_found = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(parse_loop_minor))
            .max();

        let next = match max_found {
            Some(max) => max.saturating_add(1).max(self.min_minor),
            None => self.min_minor,
        };

        tracing::debug!(?max_found, next, "Scanned {} for loop nodes", dev_dir.display());
        Ok(next)
    }

    /// Claim a minor by creating its device node.
    ///
    /// Node creation fails with `AlreadyExists` when another process won the
    /// race for a minor; the next one is tried instead.
    pub fn reserve(&self, binder: &dyn DeviceBinder) -> LoopvolResult<ReservedNode> {
        let mut minor = self.next_free_minor()?;

        for _ in 0..MAX_RESERVE_ATTEMPTS {
            if minor > MAX_MINOR {
                return Err(LoopvolError::Environment(format!(
                    "loop minor space exhausted (next candidate {} > {})",
                    minor, MAX_MINOR
                )));
            }

            let path = self.layout.node_path(minor);
            match binder.create_node(&path, minor) {
                Ok(()) => {
                    tracing::info!("Reserved loop minor {} at {}", minor, path.display());
                    return Ok(ReservedNode { minor, path });
                }
                Err(e) if e.is_already_exists() => {
                    tracing::debug!("Minor {} taken concurrently, trying next", minor);
                    minor += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Err(LoopvolError::Environment(format!(
            "could not reserve a loop minor after {} attempts",
            MAX_RESERVE_ATTEMPTS
        )))
    }
}
