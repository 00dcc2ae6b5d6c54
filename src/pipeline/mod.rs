//! Cache-building pipeline
//!
//! Discovered inputs are processed one at a time: hashed, looked up in
//! the cache, materialized if compressed, and analyzed into their slot.

pub mod driver;
pub mod invoke;
pub mod materialize;
pub mod shutdown;

pub use driver::{BatchReport, ItemOutcome, Pipeline};
pub use invoke::{resolve_program, Analyzer, CompressorSettings, ProcessAnalyzer};
pub use materialize::{MaterializeMode, Materializer, PlainFile};
pub use shutdown::{Shutdown, ShutdownTrigger};
