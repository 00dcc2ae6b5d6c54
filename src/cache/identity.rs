//! Content identity for chart inputs
//!
//! The identity is the MD5 digest of a chart's uncompressed bytes, so the
//! same chart yields the same key whether it is stored plain or as `.zst`
//! and whatever its file name. MD5 is used for cache keying only; the
//! 128-bit width keeps keys compatible with existing baseline trees.

use crate::error::{SimcacheError, SimcacheResult};
use crate::input::{Encoding, InputRef};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Length of an identity in hex characters
pub const IDENTITY_HEX_LEN: usize = 32;

/// Hex digest of a chart's uncompressed content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(String);

impl ContentId {
    /// Parse a 32-character hex digest, normalizing to lowercase
    pub fn parse(hex: &str) -> Option<Self> {
        if hex.len() == IDENTITY_HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(hex.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// Digest of an in-memory byte slice
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(bytes)))
    }

    /// Digest of everything `reader` yields, streamed through the hasher
    pub fn of_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut context = md5::Context::new();
        io::copy(&mut reader, &mut context)?;
        Ok(Self(format!("{:x}", context.compute())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the identity of an input
///
/// Compressed inputs are decoded on the fly; no plain copy is written.
pub fn identity(input: &InputRef) -> SimcacheResult<ContentId> {
    let file = File::open(&input.path).map_err(|e| {
        SimcacheError::io(format!("opening {}", input.path.display()), e)
    })?;

    let id = match input.encoding {
        Encoding::Plain => ContentId::of_reader(BufReader::new(file)).map_err(|e| {
            SimcacheError::io(format!("reading {}", input.path.display()), e)
        })?,
        Encoding::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(file)
                .map_err(|e| decompression_error(&input.path, e))?;
            ContentId::of_reader(decoder).map_err(|e| decompression_error(&input.path, e))?
        }
    };

    debug!("Identity of {}: {}", input.path.display(), id);
    Ok(id)
}

/// Identity of a plain file on disk
pub fn identity_of_file(path: &Path) -> SimcacheResult<ContentId> {
    let file = File::open(path)
        .map_err(|e| SimcacheError::io(format!("opening {}", path.display()), e))?;
    ContentId::of_reader(BufReader::new(file))
        .map_err(|e| SimcacheError::io(format!("reading {}", path.display()), e))
}

fn decompression_error(path: &Path, source: io::Error) -> SimcacheError {
    SimcacheError::Decompression {
        path: path.to_path_buf(),
        source,
    }
}
