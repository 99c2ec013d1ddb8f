use clap::Args;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name of the volume(s) to create
    #[arg(required = true, num_args = 1..)]
    pub names: Vec<String>,
}

pub fn execute(args: CreateArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let manager = global.create_manager()?;

    let mut errors = Vec::new();
    for name in args.names {
        match manager.create(&name) {
            Ok(created) => {
                for ignored in &created.ignored {
                    tracing::debug!("{}", ignored);
                }
                println!("{}", name);
            }
            Err(e) => {
                eprintln!("Error creating volume '{}': {}", name, e);
                errors.push(name);
            }
        }
    }

    if !errors.is_empty() {
        anyhow::bail!("Failed to create {} volume(s)", errors.len());
    }
    Ok(())
}
