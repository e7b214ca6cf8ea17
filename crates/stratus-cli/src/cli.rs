use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stratus",
    about = "Stratus: resource acquisition and tiered storage for pipeline data",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Operate on a filesystem cache
    Cache(CacheArgs),
    /// Pretty-print a flushed audit history
    History(HistoryArgs),
}

#[derive(Args)]
pub struct CacheArgs {
    /// Cache root directory
    #[arg(long)]
    pub rootdir: PathBuf,

    /// Cache kind segment
    #[arg(long, default_value = "stratus")]
    pub kind: String,

    /// Cache head directory segment
    #[arg(long, default_value = "store")]
    pub headdir: String,

    /// Flush the cache's audit history here after the operation
    #[arg(long)]
    pub audit: Option<PathBuf>,

    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Store a local file under an item path
    Insert { item: String, source: PathBuf },
    /// Fetch an item into a local file
    Retrieve { item: String, dest: PathBuf },
    /// Report whether an item is present
    Check { item: String },
    /// Remove an item
    Delete { item: String },
    /// List every item in the cache
    Catalog,
}

#[derive(Args)]
pub struct HistoryArgs {
    /// JSON history dump produced by `cache --audit`
    pub file: PathBuf,
}
