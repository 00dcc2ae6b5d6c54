//! Transient plain copies of compressed charts
//!
//! The analyzer only accepts file paths, so compressed inputs are decoded
//! to disk before analysis. The materializer keeps a ledger of every file
//! it created and removes each one exactly once: at end of item in
//! sibling mode, at end of run in scratch mode, and on drop in any case.
//! Files it did not create are never touched.

use crate::error::{SimcacheError, SimcacheResult};
use crate::input::InputRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Where decoded copies are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MaterializeMode {
    /// Next to the compressed file, suffix stripped; removed after each item
    #[default]
    Sibling,
    /// Unique name in a per-run scratch directory; removed at end of run
    Scratch,
}

impl fmt::Display for MaterializeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sibling => write!(f, "sibling"),
            Self::Scratch => write!(f, "scratch"),
        }
    }
}

/// A plain-text chart ready for the analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainFile {
    pub path: PathBuf,
    /// True when this run created the file and must remove it
    pub owned: bool,
}

/// Creates plain copies and owns their cleanup
#[derive(Debug)]
pub struct Materializer {
    mode: MaterializeMode,
    scratch: Option<TempDir>,
    owned: Vec<PathBuf>,
}

impl Materializer {
    /// Create a materializer. Scratch mode creates its directory under
    /// `scratch_parent` or the system temp dir.
    pub fn new(mode: MaterializeMode, scratch_parent: Option<&Path>) -> SimcacheResult<Self> {
        let scratch = match mode {
            MaterializeMode::Sibling => None,
            MaterializeMode::Scratch => {
                let mut builder = tempfile::Builder::new();
                builder.prefix("simcache-");
                let dir = match scratch_parent {
                    Some(parent) => builder.tempdir_in(parent),
                    None => builder.tempdir(),
                }
                .map_err(|e| SimcacheError::io("creating scratch directory", e))?;
                debug!("Scratch directory: {}", dir.path().display());
                Some(dir)
            }
        };

        Ok(Self {
            mode,
            scratch,
            owned: Vec::new(),
        })
    }

    pub fn mode(&self) -> MaterializeMode {
        self.mode
    }

    #[cfg(test)]
    fn owned(&self) -> &[PathBuf] {
        &self.owned
    }

    /// Ensure a plain-text form of `input` exists on disk
    ///
    /// Plain inputs are returned as-is. A failed decode removes whatever
    /// was partially written before the error is returned.
    pub fn ensure_plain(&mut self, input: &InputRef) -> SimcacheResult<PlainFile> {
        if !input.is_compressed() {
            return Ok(PlainFile {
                path: input.path.clone(),
                owned: false,
            });
        }

        let path = match self.mode {
            MaterializeMode::Sibling => {
                let sibling = input.plain_sibling();
                if sibling.exists() {
                    debug!("Reusing existing plain file {}", sibling.display());
                    return Ok(PlainFile {
                        path: sibling,
                        owned: false,
                    });
                }
                decode_to_sibling(input, &sibling)?;
                sibling
            }
            MaterializeMode::Scratch => self.decode_to_scratch(input)?,
        };

        debug!("Materialized {} -> {}", input.path.display(), path.display());
        self.owned.push(path.clone());
        Ok(PlainFile { path, owned: true })
    }

    /// End-of-item release. Removes the file in sibling mode; scratch
    /// files wait for [`release_all`](Self::release_all).
    pub fn release_item(&mut self, plain: &PlainFile) {
        if !plain.owned || self.mode != MaterializeMode::Sibling {
            return;
        }
        if let Some(pos) = self.owned.iter().position(|p| p == &plain.path) {
            let path = self.owned.swap_remove(pos);
            remove_transient(&path);
        }
    }

    /// End-of-run release of every owned file
    pub fn release_all(&mut self) {
        for path in self.owned.drain(..) {
            remove_transient(&path);
        }
    }

    fn decode_to_scratch(&self, input: &InputRef) -> SimcacheResult<PathBuf> {
        let dir = self
            .scratch
            .as_ref()
            .map(TempDir::path)
            .ok_or_else(|| SimcacheError::io("scratch directory", io::ErrorKind::NotFound.into()))?;

        let mut temp = tempfile::Builder::new()
            .prefix("chart-")
            .suffix(&format!(".{}", input.format.extension()))
            .tempfile_in(dir)
            .map_err(|e| SimcacheError::io(format!("creating scratch file in {}", dir.display()), e))?;

        // NamedTempFile removes itself if decoding fails
        decode_into(input, temp.as_file_mut())?;

        temp.into_temp_path()
            .keep()
            .map_err(|e| SimcacheError::io("keeping scratch file", e.error))
    }
}

impl Drop for Materializer {
    fn drop(&mut self) {
        if !self.owned.is_empty() {
            debug!("Releasing {} transient file(s)", self.owned.len());
        }
        self.release_all();
    }
}

fn decode_to_sibling(input: &InputRef, sibling: &Path) -> SimcacheResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(sibling)
        .map_err(|e| SimcacheError::io(format!("creating {}", sibling.display()), e))?;

    if let Err(e) = decode_into(input, &mut file) {
        drop(file);
        remove_transient(sibling);
        return Err(e);
    }
    Ok(())
}

fn decode_into(input: &InputRef, out: &mut File) -> SimcacheResult<()> {
    let source = File::open(&input.path)
        .map_err(|e| SimcacheError::io(format!("opening {}", input.path.display()), e))?;
    let decompress_err = |source| SimcacheError::Decompression {
        path: input.path.clone(),
        source,
    };

    let mut decoder = zstd::stream::read::Decoder::new(source).map_err(decompress_err)?;
    let mut writer = BufWriter::new(out);
    io::copy(&mut decoder, &mut writer).map_err(decompress_err)?;
    writer
        .flush()
        .map_err(|e| SimcacheError::io(format!("writing plain copy of {}", input.path.display()), e))
}

fn remove_transient(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed transient {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove transient {}: {}", path.display(), e),
    }
}
