use clap::Args;

#[derive(Args, Debug)]
pub struct DetachArgs {
    /// Name of the volume
    pub name: String,
}

pub fn execute(args: DetachArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let manager = global.create_manager()?;
    manager.detach(&args.name)?;
    println!("{}", args.name);
    Ok(())
}
