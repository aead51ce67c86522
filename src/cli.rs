use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mpdev")]
#[command(version)]
#[command(about = "Apply declarative marketplace resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (default: settings.toml in the config directory)
    #[arg(long, global = true, env = "MPDEV_SETTINGS")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply resources from definition files
    Apply(ApplyArgs),

    /// Check that every reference resolves, without applying anything
    Check(CheckArgs),
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Resource definition file (repeat for several)
    #[arg(short = 'f', long = "filename", required = true)]
    pub files: Vec<PathBuf>,

    /// Apply only the named resource
    #[arg(long, value_name = "NAME")]
    pub only: Option<String>,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Resource definition file (repeat for several)
    #[arg(short = 'f', long = "filename", required = true)]
    pub files: Vec<PathBuf>,
}
