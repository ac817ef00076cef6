pub mod scan;
pub mod seal;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "frontr")]
#[command(about = "Discovers and validates domain-fronting endpoints.")]
pub struct CommandLine {
    /// Verbose logging (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the configured targets for working front endpoints
    #[command(alias = "s")]
    Scan(ScanArgs),
    /// Seal a plaintext target document for distribution
    Seal(SealArgs),
}

#[derive(Args)]
pub struct ScanArgs {
    /// Base acceptance latency in milliseconds
    #[arg(long, default_value_t = 5_000)]
    pub threshold: u32,

    /// Directory for endpoint databases and cached documents
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Target document to use when no refreshed copy exists
    #[arg(long)]
    pub frontlist: Option<PathBuf>,

    /// Keep only definition lines containing this substring
    #[arg(long, default_value = "")]
    pub filter: String,
}

#[derive(Args)]
pub struct SealArgs {
    /// Plaintext target document to seal
    #[arg(long)]
    pub input: PathBuf,

    /// Where to write the sealed document
    #[arg(long)]
    pub output: PathBuf,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
