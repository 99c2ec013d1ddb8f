use clap::Args;

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Name of the volume(s) to remove
    #[arg(required = true, num_args = 1..)]
    pub names: Vec<String>,
}

pub fn execute(args: RmArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let manager = global.create_manager()?;

    let mut active_error = false;
    for name in args.names {
        if let Err(e) = manager.remove(&name) {
            eprintln!("Error removing volume '{}': {}", name, e);
            active_error = true;
        } else {
            println!("{}", name);
        }
    }

    if active_error {
        anyhow::bail!("Some volumes could not be removed");
    }
    Ok(())
}
