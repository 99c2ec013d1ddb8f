//! Named volumes and their lifecycle.

mod manager;

use std::path::PathBuf;

use loopvol_shared::constants::volume::MAX_NAME_LEN;
use loopvol_shared::errors::{LoopvolError, LoopvolResult};
use serde::{Deserialize, Serialize};

pub use manager::VolumeManager;

/// A volume as reported by `list`.
///
/// Only the name is persisted (as the backing file name); everything else is
/// derived when an operation runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
}

impl Volume {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Result of a successful `create`.
#[derive(Debug)]
pub struct CreatedVolume {
    pub volume: Volume,
    pub backing_file: PathBuf,
    pub device: PathBuf,
    pub minor: u32,
    /// Best-effort steps that failed without failing the create.
    pub ignored: Vec<LoopvolError>,
}

/// Check that `name` can be used both as a file name and as an ext4 label.
pub fn validate_name(name: &str) -> LoopvolResult<()> {
    let reject = |reason: &str| {
        Err(LoopvolError::InvalidArgument(format!(
            "invalid volume name {:?}: {}",
            name, reason
        )))
    };

    if name.is_empty() {
        return reject("must not be empty");
    }
    if name.len() > MAX_NAME_LEN {
        return reject("longer than 16 bytes (ext4 label limit)");
    }
    if name == "." || name == ".." {
        return reject("reserved path component");
    }
    if name.contains('/') || name.contains('\0') {
        return reject("must not contain '/' or NUL");
    }
    if name.starts_with('-') {
        return reject("must not start with '-'");
    }
    if name.chars().any(char::is_control) {
        return reject("must not contain control characters");
    }
    Ok(())
}
