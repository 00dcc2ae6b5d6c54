//! Locate command - print identity and cache slot of chart files

use crate::cache::{identity, CacheLayout};
use crate::cli::args::{LocateArgs, OutputFormat};
use crate::cli::commands::cache_layout;
use crate::config::Config;
use crate::error::{SimcacheError, SimcacheResult};
use crate::input::InputRef;
use console::style;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct Location {
    input: String,
    identity: String,
    slot: String,
    present: bool,
}

/// Execute the locate command
pub async fn execute(args: LocateArgs, config: &Config) -> SimcacheResult<()> {
    let layout = cache_layout(&args.location, config);

    let locations = args
        .files
        .iter()
        .map(|file| locate(&layout, file))
        .collect::<SimcacheResult<Vec<_>>>()?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&locations)?),
        OutputFormat::Table => {
            for location in &locations {
                let marker = if location.present {
                    style("present").green()
                } else {
                    style("missing").yellow()
                };
                println!("{}", style(&location.input).bold());
                println!("  hash: {}", location.identity);
                println!("  slot: {} ({})", location.slot, marker);
            }
        }
    }

    Ok(())
}

fn locate(layout: &CacheLayout, file: &Path) -> SimcacheResult<Location> {
    let input = InputRef::classify(file).ok_or_else(|| SimcacheError::NotAChart(file.into()))?;
    let id = identity(&input)?;
    let slot = layout.slot_for(&id);

    Ok(Location {
        input: file.display().to_string(),
        identity: id.to_string(),
        slot: slot.path().display().to_string(),
        present: slot.exists(),
    })
}
