//! CLI command implementations

pub mod build;
pub mod check;
pub mod config;
pub mod locate;
pub mod status;

pub use build::execute as build;
pub use check::execute as check;
pub use config::execute as config;
pub use locate::execute as locate;
pub use status::execute as status;

use crate::cache::CacheLayout;
use crate::cli::args::CacheLocationArgs;
use crate::config::Config;

/// Cache layout from flags, falling back to configuration
///
/// A `baseline/` directory inside the chosen root takes precedence.
pub(crate) fn cache_layout(args: &CacheLocationArgs, config: &Config) -> CacheLayout {
    let root = args
        .cache_root
        .clone()
        .unwrap_or_else(|| config.paths.cache_root.clone());
    let suffix = args
        .suffix
        .clone()
        .unwrap_or_else(|| config.analyzer.artifact_suffix.clone());
    CacheLayout::resolve(root, suffix)
}
