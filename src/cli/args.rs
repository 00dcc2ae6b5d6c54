//! CLI argument definitions using clap derive

use crate::pipeline::MaterializeMode;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// simcache - content-addressed baseline cache for simfile analysis
///
/// Hashes chart files (plain or zstd-compressed), runs an external
/// analyzer once per unique chart, and stores its compressed output
/// under a sharded cache tree.
#[derive(Parser, Debug)]
#[command(name = "simcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SIMCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .simcache.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze every chart whose artifact is missing
    Build(BuildArgs),

    /// Verify every chart has a readable artifact
    Check(CheckArgs),

    /// Print the identity and cache slot of chart files
    Locate(LocateArgs),

    /// Check external tools and cache directories
    Status(StatusArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Leading positional mode for the build command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildMode {
    /// Recompute every artifact, overwriting existing slots
    Force,
}

/// Locations shared by commands that read the cache
#[derive(Args, Debug, Clone, Default)]
pub struct CacheLocationArgs {
    /// Root of the sharded artifact tree
    #[arg(long, env = "SIMCACHE_CACHE_ROOT")]
    pub cache_root: Option<PathBuf>,

    /// Artifact file suffix (e.g. json.zst)
    #[arg(long)]
    pub suffix: Option<String>,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// `force` recomputes every artifact
    #[arg(value_enum)]
    pub mode: Option<BuildMode>,

    /// Recompute every artifact, overwriting existing slots
    #[arg(long, env = "SIMCACHE_FORCE")]
    pub force: bool,

    /// Directory tree to scan for charts
    #[arg(short, long, env = "SIMCACHE_INPUT_ROOT")]
    pub input_root: Option<PathBuf>,

    #[command(flatten)]
    pub location: CacheLocationArgs,

    /// Analyzer executable
    #[arg(long, env = "SIMCACHE_ANALYZER")]
    pub analyzer: Option<PathBuf>,

    /// Extra analyzer argument placed before the chart path (repeatable)
    #[arg(long = "analyzer-arg", allow_hyphen_values = true)]
    pub analyzer_args: Vec<String>,

    /// Compressor executable
    #[arg(long, env = "SIMCACHE_COMPRESSOR")]
    pub compressor: Option<PathBuf>,

    /// Compression level
    #[arg(long, env = "SIMCACHE_ZSTD_LEVEL", allow_negative_numbers = true)]
    pub level: Option<i32>,

    /// Compression threads (0 = all cores)
    #[arg(long, env = "SIMCACHE_ZSTD_THREADS")]
    pub threads: Option<u32>,

    /// Where decompressed charts are placed while analyzing
    #[arg(long, value_enum)]
    pub materialize: Option<MaterializeMode>,

    /// Exit non-zero if any item fails
    #[arg(long)]
    pub strict: bool,
}

impl BuildArgs {
    /// Whether force was requested positionally or by flag
    pub fn is_forced(&self) -> bool {
        self.force || self.mode == Some(BuildMode::Force)
    }
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Only check inputs whose relative name contains this string
    pub filter: Option<String>,

    /// Match the filter exactly instead of as a substring
    #[arg(long, requires = "filter")]
    pub exact: bool,

    /// Skip inputs whose name contains this string (repeatable)
    #[arg(long)]
    pub skip: Vec<String>,

    /// List matching inputs without checking them
    #[arg(long)]
    pub list: bool,

    /// Directory tree to scan for charts
    #[arg(short, long, env = "SIMCACHE_INPUT_ROOT")]
    pub input_root: Option<PathBuf>,

    #[command(flatten)]
    pub location: CacheLocationArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the locate command
#[derive(Parser, Debug)]
pub struct LocateArgs {
    /// Chart files (.sm, .ssc, optionally .zst)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub location: CacheLocationArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Directory tree to scan for charts
    #[arg(short, long, env = "SIMCACHE_INPUT_ROOT")]
    pub input_root: Option<PathBuf>,

    #[command(flatten)]
    pub location: CacheLocationArgs,

    /// Analyzer executable
    #[arg(long, env = "SIMCACHE_ANALYZER")]
    pub analyzer: Option<PathBuf>,

    /// Compressor executable
    #[arg(long, env = "SIMCACHE_COMPRESSOR")]
    pub compressor: Option<PathBuf>,
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

/// Output format for reporting commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Table,
    /// JSON output
    Json,
}
