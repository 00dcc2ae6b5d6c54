//! simcache - content-addressed baseline cache for simfile analysis
//!
//! Hashes chart files by their uncompressed content, runs an external
//! analyzer once per unique chart, and stores each result compressed in
//! a sharded, content-addressed directory tree.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod pipeline;

pub use error::{SimcacheError, SimcacheResult};
