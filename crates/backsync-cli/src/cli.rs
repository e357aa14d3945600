use backsync_core::BackupMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "backsync")]
#[command(about = "Incremental backup and mirror of local directories")]
#[command(after_help = "Run '<command> --help' for detailed options on each command.")]
pub struct Cli {
    /// Override the configuration directory for this invocation
    #[arg(long, global = true, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a backup described by a configuration file
    Run(RunArgs),
    /// Parse and validate a configuration file without running it
    Check(CheckArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Configuration file (defaults to backup.yaml in the configuration directory)
    pub config: Option<PathBuf>,
    /// Override the backup_type of the configuration
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
    /// Show a spinner with the latest event instead of the event stream
    #[arg(long, short = 'p', conflicts_with = "quiet")]
    pub progress: bool,
    /// Do not print engine events
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Configuration file (defaults to backup.yaml in the configuration directory)
    pub config: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Copy new and changed files, never delete
    Copy,
    /// Mirror the sources, deleting target entries missing from them
    Sync,
}

impl From<ModeArg> for BackupMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Copy => BackupMode::Copy,
            ModeArg::Sync => BackupMode::Sync,
        }
    }
}
