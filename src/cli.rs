use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "taillight-install", about = "Signed TailLight driver installer")]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to the per-user config dir, if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Trust the certificate and install the driver package
    Install {
        /// Show the commands without running them
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the commands `install` would run
    Plan,
    /// Write a default configuration file
    Init {
        /// Directory holding TailLight.cer and TailLight.inf
        #[arg(long)]
        package_dir: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
        /// Print config path and exit
        #[arg(long)]
        show_path: bool,
    },
}
