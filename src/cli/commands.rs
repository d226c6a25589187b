//! CLI definition using clap.
//!
//! devstack takes no subcommands; every flag is optional.

use clap::Parser;
use std::path::PathBuf;

/// devstack - install, start and supervise the backend and frontend dev servers
#[derive(Parser, Debug)]
#[command(name = "devstack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root containing the backend and frontend directories
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}
