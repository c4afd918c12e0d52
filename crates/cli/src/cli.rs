use crate::commands::Commands;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "kresolve")]
#[command(
    about = "Build the targets referenced by Kubernetes manifests and substitute their image references",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG or KRESOLVE_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}
