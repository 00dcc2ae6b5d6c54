//! Sharded cache slot layout
//!
//! Artifacts live at `<root>/<first 2 hex chars>/<identity>.<suffix>`.

use crate::cache::identity::ContentId;
use crate::error::{SimcacheError, SimcacheResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Number of identity characters used for the shard directory
pub const SHARD_WIDTH: usize = 2;

/// Default artifact suffix (analyzer JSON, zstd-compressed)
pub const DEFAULT_ARTIFACT_SUFFIX: &str = "json.zst";

/// Suffix of in-progress artifact files inside shard directories
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Directory name of a baseline tree checked out inside the cache root
const NESTED_ROOT: &str = "baseline";

/// Maps identities to slots under a cache root
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
    suffix: String,
}

/// What a scan of the cache root found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub artifacts: usize,
    pub bytes: u64,
    /// Partial files left behind by runs that were killed mid-item
    pub partials: usize,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into().trim_start_matches('.').to_string(),
        }
    }

    /// Layout rooted at `root`, or at `root/baseline` when that directory exists
    pub fn resolve(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        let root = root.into();
        let nested = root.join(NESTED_ROOT);
        if nested.is_dir() {
            debug!("Using nested cache root {}", nested.display());
            return Self::new(nested, suffix);
        }
        Self::new(root, suffix)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Slot for an identity. Pure; touches no files.
    pub fn slot_for(&self, id: &ContentId) -> CacheSlot {
        let hex = id.as_str();
        CacheSlot {
            path: self
                .root
                .join(&hex[..SHARD_WIDTH])
                .join(format!("{}.{}", hex, self.suffix)),
        }
    }

    /// Identity named by an artifact file, if `path` is one
    pub fn artifact_id(&self, path: &Path) -> Option<ContentId> {
        let name = path.file_name()?.to_str()?;
        let stem = name.strip_suffix(self.suffix.as_str())?.strip_suffix('.')?;
        ContentId::parse(stem)
    }

    /// Count artifacts and leftover partial files under the root
    pub fn scan(&self) -> CacheUsage {
        WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .fold(CacheUsage::default(), |mut usage, entry| {
                if is_partial(entry.path()) {
                    usage.partials += 1;
                } else if self.artifact_id(entry.path()).is_some() {
                    usage.artifacts += 1;
                    usage.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
                usage
            })
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX))
}

/// Location of one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSlot {
    path: PathBuf,
}

impl CacheSlot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shard directory holding the slot
    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Whether an artifact is present
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create the shard directory if missing
    pub fn ensure_parent(&self) -> SimcacheResult<()> {
        let parent = self.parent();
        if !parent.is_dir() {
            debug!("Creating shard directory {}", parent.display());
            fs::create_dir_all(parent).map_err(|e| {
                SimcacheError::io(format!("creating cache directory {}", parent.display()), e)
            })?;
        }
        Ok(())
    }
}
