//! Configuration schema for simcache
//!
//! Configuration is stored at `~/.config/simcache/config.toml`, with an
//! optional project-local `.simcache.toml` layered on top.

use crate::cache::DEFAULT_ARTIFACT_SUFFIX;
use crate::pipeline::MaterializeMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input and cache locations
    pub paths: PathsConfig,

    /// External analyzer
    pub analyzer: AnalyzerConfig,

    /// External compressor
    pub compression: CompressionConfig,

    /// Batch behavior
    pub pipeline: PipelineConfig,
}

/// Input and cache locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory tree walked for chart files
    pub input_root: PathBuf,

    /// Root of the sharded artifact tree
    pub cache_root: PathBuf,

    /// Parent for the scratch directory (system temp dir if unset)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("tests/packs"),
            cache_root: PathBuf::from("tests/baseline"),
            scratch_dir: None,
        }
    }
}

/// Analyzer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Analyzer executable (path or name on PATH)
    pub program: Option<PathBuf>,

    /// Extra arguments placed before the chart path
    pub args: Vec<String>,

    /// Artifact file suffix, without the leading dot
    pub artifact_suffix: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            artifact_suffix: DEFAULT_ARTIFACT_SUFFIX.to_string(),
        }
    }
}

/// Compressor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// zstd executable
    pub program: PathBuf,

    /// Compression level
    pub level: i32,

    /// Worker threads (0 = all cores)
    pub threads: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("zstd"),
            level: 19,
            threads: 0,
        }
    }
}

/// Batch behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where decompressed charts are placed
    pub materialize: MaterializeMode,

    /// Exit non-zero when any item fails
    pub strict: bool,
}
