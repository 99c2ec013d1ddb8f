//! Configuration loading for loopvol CLI.

use std::path::Path;

use loopvol::LoopvolOptions;
use tracing::warn;

/// Load options from a JSON file.
///
/// Returns defaults if no file is given, or the file cannot be read or parsed.
pub fn load_config(config_path: Option<&Path>) -> LoopvolOptions {
    config_path.and_then(try_load_json).unwrap_or_default()
}

fn try_load_json(config_path: &Path) -> Option<LoopvolOptions> {
    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(e) => {
            warn!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            );
            return None;
        }
    };

    match serde_json::from_str::<LoopvolOptions>(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(
                "Failed to parse config file {}: {}",
                config_path.display(),
                e
            );
            None
        }
    }
}
