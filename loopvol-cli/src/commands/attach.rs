use clap::Args;

#[derive(Args, Debug)]
pub struct AttachArgs {
    /// Name of the volume
    pub name: String,
}

pub fn execute(args: AttachArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let manager = global.create_manager()?;
    manager.attach(&args.name)?;
    println!("{}", args.name);
    Ok(())
}
