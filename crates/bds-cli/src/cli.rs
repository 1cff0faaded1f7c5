use std::path::PathBuf;

use bds_crypto::HashAlgorithm;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bds",
    about = "Balanced Disc Storage: content-addressed files on a balanced directory tree",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum KeyFormatArg {
    SizeSuffixed,
    Bare,
}

/// Storage settings; flags override values read from `--config`.
#[derive(Args, Debug, Default)]
pub struct StorageArgs {
    /// Storage root directory
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML file with storage settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum entries per tree directory
    #[arg(long, global = true)]
    pub dir_limit: Option<usize>,

    /// Read block size in bytes
    #[arg(long, global = true)]
    pub block_size: Option<usize>,

    /// Hash algorithm (sha256, blake3)
    #[arg(long, global = true)]
    pub algorithm: Option<HashAlgorithm>,

    /// Whether keys carry the byte-count suffix
    #[arg(long, global = true)]
    pub key_format: Option<KeyFormatArg>,

    /// Maximum members of an expanded archive
    #[arg(long, global = true)]
    pub max_archive_entries: Option<usize>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store files as blobs
    Add(PathsArgs),
    /// Expand .zip archives into the store
    AddArchive(PathsArgs),
    /// Print the key files would be stored under
    Key(PathsArgs),
    /// Print the path stored under a key
    Lookup(KeysArgs),
    /// Delete entries by key
    Delete(KeysArgs),
    /// Delete the entries matching the content of files
    DeleteFile(PathsArgs),
    /// List every stored key
    List,
}

#[derive(Args)]
pub struct PathsArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct KeysArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,
}
