mod cli;
mod render;
mod run;

use clap::Parser;
use eyre::Result;
use std::process::ExitCode;

use crate::cli::{Cli, Commands};

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Some(dir) = &cli.config_dir {
        backsync_core::config::set_config_dir(dir);
    }

    let status = match &cli.command {
        Commands::Run(args) => run::run_backup(args)?,
        Commands::Check(args) => run::run_check(args)?,
    };

    Ok(status.into())
}
