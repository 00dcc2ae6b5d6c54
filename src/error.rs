//! Error types for simcache
//!
//! All modules use `SimcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for simcache operations
pub type SimcacheResult<T> = Result<T, SimcacheError>;

/// All errors that can occur in simcache
#[derive(Error, Debug)]
pub enum SimcacheError {
    // Precondition errors
    #[error("No analyzer configured")]
    AnalyzerNotConfigured,

    #[error("Required tool not found: {name} ({program})")]
    ToolNotFound { name: String, program: PathBuf },

    #[error("Input root not found: {0}")]
    InputRootMissing(PathBuf),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Input errors
    #[error("Not a chart file: {0}")]
    NotAChart(PathBuf),

    #[error("Failed to decompress {path}: {source}")]
    Decompression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Analyzer and compressor errors
    #[error("Analyzer failed to start: {program}: {source}")]
    AnalyzerSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Analyzer exited with {}: {stderr_tail}", describe_exit(.exit_code))]
    Analyzer {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("Compressor failed to start: {program}: {source}")]
    CompressorSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compressor exited with {}: {stderr_tail}", describe_exit(.exit_code))]
    Compression {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Batch outcomes
    #[error("Interrupted")]
    Interrupted,

    #[error("{failed} item(s) failed")]
    BatchFailed { failed: usize },

    #[error("{count} input(s) without a valid artifact")]
    ArtifactsMissing { count: usize },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

impl SimcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error is an unmet precondition that aborts a batch
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::AnalyzerNotConfigured | Self::ToolNotFound { .. } | Self::InputRootMissing(_)
        )
    }

    /// Process exit code for errors reaching `main`
    ///
    /// Unmet preconditions exit 2, interrupts 130.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Interrupted => 130,
            e if e.is_precondition() => 2,
            _ => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AnalyzerNotConfigured => {
                Some("Set SIMCACHE_ANALYZER, pass --analyzer, or set [analyzer] program in config")
            }
            Self::ToolNotFound { .. } => Some("Check the program path or your PATH"),
            Self::InputRootMissing(_) => Some("Set SIMCACHE_INPUT_ROOT or pass --input-root"),
            Self::BatchFailed { .. } => Some("Rerun with -v to see per-item diagnostics"),
            Self::ArtifactsMissing { .. } => Some("Run: simcache build"),
            _ => None,
        }
    }
}
