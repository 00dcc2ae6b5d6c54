//! Chart input discovery
//!
//! Walks an input tree and classifies chart files by format and
//! on-disk encoding. Files that are not charts are ignored.

use crate::error::{SimcacheError, SimcacheResult};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Suffix appended to compressed chart files
pub const COMPRESSED_SUFFIX: &str = "zst";

/// Recognized chart formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartFormat {
    /// StepMania `.sm`
    Sm,
    /// StepMania 5 `.ssc`
    Ssc,
}

impl ChartFormat {
    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Sm => "sm",
            Self::Ssc => "ssc",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "sm" => Some(Self::Sm),
            "ssc" => Some(Self::Ssc),
            _ => None,
        }
    }
}

impl fmt::Display for ChartFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// How a chart is stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Zstd,
}

/// A chart file found in the input tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRef {
    /// Path as found on disk
    pub path: PathBuf,
    pub format: ChartFormat,
    pub encoding: Encoding,
}

impl InputRef {
    /// Classify a path by name alone, returning `None` for non-chart files
    ///
    /// `song.sm` and `song.SSC` are plain; `song.sm.zst` is compressed.
    pub fn classify(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (stem, encoding) = match name.rsplit_once('.') {
            Some((stem, ext)) if ext.eq_ignore_ascii_case(COMPRESSED_SUFFIX) => {
                (stem, Encoding::Zstd)
            }
            _ => (name, Encoding::Plain),
        };
        let (_, ext) = stem.rsplit_once('.')?;
        let format = ChartFormat::from_extension(ext)?;

        Some(Self {
            path: path.to_path_buf(),
            format,
            encoding,
        })
    }

    /// Whether the on-disk form is compressed
    pub fn is_compressed(&self) -> bool {
        self.encoding == Encoding::Zstd
    }

    /// The path with the compression suffix stripped
    ///
    /// For plain inputs this is the input path itself.
    pub fn plain_sibling(&self) -> PathBuf {
        match self.encoding {
            Encoding::Plain => self.path.clone(),
            Encoding::Zstd => self.path.with_extension(""),
        }
    }

    /// Display name relative to `root`, falling back to the full path
    pub fn relative_name(&self, root: &Path) -> String {
        self.path
            .strip_prefix(root)
            .unwrap_or(&self.path)
            .to_string_lossy()
            .to_string()
    }
}

/// Discover all chart inputs under `root`
///
/// Results are sorted by path so log output is stable; callers must not
/// rely on the order for correctness. Unreadable entries are skipped.
pub fn discover(root: &Path) -> SimcacheResult<Vec<InputRef>> {
    if !root.is_dir() {
        return Err(SimcacheError::InputRootMissing(root.to_path_buf()));
    }

    let mut inputs: Vec<InputRef> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| InputRef::classify(entry.path()))
        .collect();

    inputs.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("Discovered {} chart inputs under {}", inputs.len(), root.display());
    Ok(inputs)
}
