use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::formatter::{self, OutputFormat};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output format: table, json or yaml
    #[arg(long, default_value = "table")]
    pub format: String,

    /// Only print volume names
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Serialize, Tabled)]
struct VolumeRow {
    #[tabled(rename = "NAME")]
    name: String,
}

pub fn execute(args: ListArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let format: OutputFormat = args.format.parse()?;
    let manager = global.create_manager()?;
    let volumes = manager.list()?;

    if args.quiet {
        for volume in &volumes {
            println!("{}", volume.name);
        }
        return Ok(());
    }

    let rows: Vec<VolumeRow> = volumes
        .iter()
        .map(|v| VolumeRow {
            name: v.name.clone(),
        })
        .collect();

    println!("{}", formatter::render(format, &volumes, &rows)?);
    Ok(())
}
