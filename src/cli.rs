//! Command line interface definitions.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Reconcile and replicate Vault configuration between clusters", long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration document
    #[arg(short, long, default_value = "./config.json")]
    pub config: PathBuf,
}
