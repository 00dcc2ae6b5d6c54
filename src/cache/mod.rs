//! Content-addressed artifact cache
//!
//! Artifacts are keyed by the MD5 of a chart's uncompressed content and
//! stored under a two-level sharded tree:
//!
//! ```text
//! baseline/
//!   ab/
//!     ab12...cd34.json.zst
//! ```
//!
//! A slot's presence is the only signal that an artifact is complete.
//! Writers never create the slot path until the artifact is whole.

pub mod identity;
pub mod slot;

pub use identity::{identity, identity_of_file, ContentId};
pub use slot::{
    CacheLayout, CacheSlot, CacheUsage, DEFAULT_ARTIFACT_SUFFIX, PARTIAL_SUFFIX, SHARD_WIDTH,
};
