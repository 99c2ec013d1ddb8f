//! CLI definition and argument parsing for loopvol-cli.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use loopvol::VolumeManager;
use loopvol_shared::constants::envs;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "loopvol", author, version, about = "Loop-device backed volumes")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
#[non_exhaustive]
pub enum Commands {
    /// Create one or more volumes
    Create(crate::commands::create::CreateArgs),

    /// List volumes
    #[command(visible_alias = "ls")]
    List(crate::commands::list::ListArgs),

    /// Remove one or more volumes
    Rm(crate::commands::rm::RmArgs),

    /// Attach a volume (no-op for loop volumes)
    Attach(crate::commands::attach::AttachArgs),

    /// Detach a volume (no-op for loop volumes)
    Detach(crate::commands::detach::DetachArgs),

    /// Read one JSON request from stdin and print the JSON response
    Run(crate::commands::run::RunArgs),
}

// ============================================================================
// GLOBAL FLAGS
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Directory holding backing files
    #[arg(long, global = true, env = envs::LOOPVOL_ROOT)]
    pub root: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true, env = envs::LOOPVOL_CONFIG)]
    pub config: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn create_manager(&self) -> anyhow::Result<VolumeManager> {
        let mut options = crate::config::load_config(self.config.as_deref());

        if let Some(root) = &self.root {
            options.root_dir = root.clone();
        }

        VolumeManager::new(options).map_err(Into::into)
    }
}
