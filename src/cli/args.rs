//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// repro-fetch - reproducible package fetcher
///
/// Fetches packages by SHA-256 digest from any mirror, so a later install is
/// bit-identical no matter when or where it runs.
#[derive(Parser, Debug)]
#[command(name = "repro-fetch")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "REPRO_FETCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory
    #[arg(long, global = true, env = "REPRO_FETCH_CACHE")]
    pub cache: Option<PathBuf>,

    /// Distro driver: auto, debian, ubuntu, alpine, none
    #[arg(long, global = true)]
    pub distro: Option<String>,

    /// Log format
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate hash manifests
    Hash(HashArgs),

    /// Fetch the files listed in hash manifests into the cache
    Download(DownloadArgs),

    /// Fetch, then install with the host package manager
    Install(InstallArgs),

    /// Inspect the content cache
    Cache(CacheArgs),

    /// Print a shell script that installs cached files
    Script(ScriptArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the hash command
#[derive(Parser, Debug)]
pub struct HashArgs {
    /// Subcommand for hash
    #[command(subcommand)]
    pub action: HashAction,
}

/// Hash subcommands
#[derive(Subcommand, Debug)]
pub enum HashAction {
    /// Write a manifest for packages (default: all installed) to stdout
    Generate {
        /// Omit entries already present with the same digest in this manifest
        #[arg(long)]
        dedupe: Option<PathBuf>,

        /// Package names
        packages: Vec<String>,
    },
}

/// Arguments for the download command
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// Provider URL template, tried in order (repeatable)
    #[arg(long = "provider", value_name = "URL")]
    pub providers: Vec<String>,

    /// Fetch files even if the exact package version is installed
    #[arg(long)]
    pub no_skip_installed: bool,

    /// Hash manifest files; later files override earlier ones
    #[arg(value_name = "SHA256SUMS", required = true)]
    pub manifests: Vec<PathBuf>,
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Provider URL template, tried in order (repeatable)
    #[arg(long = "provider", value_name = "URL")]
    pub providers: Vec<String>,

    /// Hash manifest files; later files override earlier ones
    #[arg(value_name = "SHA256SUMS", required = true)]
    pub manifests: Vec<PathBuf>,
}

/// Arguments for the script command
#[derive(Parser, Debug)]
pub struct ScriptArgs {
    /// Hash manifest files (default: ./SHA256SUMS)
    #[arg(value_name = "SHA256SUMS")]
    pub manifests: Vec<PathBuf>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cache directory
    Path,

    /// List cached blobs
    Ls {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the path of a cached blob
    Blob {
        /// SHA-256 digest
        digest: String,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
