use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod campaign;
mod catalog;
mod cli;
mod compose;
mod conditions;
mod config;
mod error;
mod policy;
mod runs;
mod sink;
mod template;

use cli::{Command, PrepareArgs, RootArgs, SubmitArgs};
use template::{newest_template, write_metadata, ValidationTemplate};

/// Install a stderr subscriber honouring `RUST_LOG`, falling back to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = RootArgs::parse();

    match args.command {
        Command::Submit(args) => cmd_submit(args),
        Command::Prepare(args) => cmd_prepare(args),
    }
}

fn cmd_submit(args: SubmitArgs) -> Result<()> {
    let output = campaign::run_submit(&args)?;
    tracing::info!(
        script = %output.script.display(),
        request = %output.request.display(),
        "campaign composed"
    );
    Ok(())
}

fn cmd_prepare(args: PrepareArgs) -> Result<()> {
    let path = match args.template {
        Some(path) => path,
        None => newest_template(&args.template_dir)?,
    };
    println!(">> Processing template: {}", path.display());
    let template = ValidationTemplate::load(&path)?;
    println!(
        ">> Validation {} ({} {})",
        template.label(),
        template.week,
        template.year
    );
    for written in write_metadata(&template, &args.out)? {
        println!("{}", written.display());
    }
    Ok(())
}
