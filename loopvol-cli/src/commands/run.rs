use std::io::Read;

use clap::Args;
use loopvol::dispatch;

#[derive(Args, Debug)]
pub struct RunArgs {}

pub fn execute(_args: RunArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let request = dispatch::parse_request(&input)?;
    let manager = global.create_manager()?;
    let response = dispatch::dispatch(&manager, &request)?;

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}
