pub mod process;

use std::path::{Path, PathBuf};

use loopvol_shared::constants::envs;
use loopvol_shared::errors::{LoopvolError, LoopvolResult};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub use process::{ToolOutput, run_tool};

/// Find an external tool binary.
///
/// A name containing `/` is taken as a path and only checked for existence.
/// Otherwise `LOOPVOL_TOOL_DIR` is searched first, then every `PATH` entry.
///
/// # Returns
/// * `Ok(PathBuf)` - Path to the found binary
/// * `Err(...)` - Binary not found in any expected location
pub fn find_binary(binary_name: &str) -> LoopvolResult<PathBuf> {
    let mut search_dirs = Vec::new();

    if let Ok(tool_dir) = std::env::var(envs::LOOPVOL_TOOL_DIR) {
        search_dirs.push(PathBuf::from(tool_dir));
    }

    if let Some(path) = std::env::var_os("PATH") {
        search_dirs.extend(std::env::split_paths(&path));
    }

    find_binary_in(binary_name, &search_dirs)
}

/// Find `binary_name` in `search_dirs`, in order.
pub fn find_binary_in(binary_name: &str, search_dirs: &[PathBuf]) -> LoopvolResult<PathBuf> {
    if binary_name.contains('/') {
        let path = Path::new(binary_name);
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(LoopvolError::Environment(format!(
            "Binary '{}' not found",
            binary_name
        )));
    }

    for dir in search_dirs {
        let candidate = dir.join(binary_name);
        tracing::trace!("Finding binary {:?} in path: {:?}", binary_name, candidate);
        if candidate.is_file() {
            tracing::debug!(binary = %candidate.display(), "Found binary");
            return Ok(candidate);
        }
    }

    let locations = search_dirs
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(LoopvolError::Environment(format!(
        "Binary '{}' not found.\nSearched locations:\n{}",
        binary_name, locations
    )))
}

/// Install the stderr tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `debug` or `info` depending on the flag.
pub fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init();
}
