//! Check command - verify every chart has a readable artifact

use crate::cache::{identity, CacheLayout};
use crate::cli::args::{CheckArgs, OutputFormat};
use crate::cli::commands::cache_layout;
use crate::config::Config;
use crate::error::{SimcacheError, SimcacheResult};
use crate::input::{discover, InputRef};
use console::style;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Result of checking one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "detail")]
pub enum CheckStatus {
    Ok,
    Missing,
    /// Artifact present but its stream does not decode
    Corrupt(String),
    /// Input itself could not be hashed
    Error(String),
}

impl CheckStatus {
    fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Missing => write!(f, "MISSING"),
            Self::Corrupt(_) => write!(f, "CORRUPT"),
            Self::Error(_) => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckRecord {
    name: String,
    identity: Option<String>,
    slot: Option<String>,
    #[serde(flatten)]
    status: CheckStatus,
}

/// Execute the check command
pub async fn execute(args: CheckArgs, config: &Config) -> SimcacheResult<()> {
    let input_root = args
        .input_root
        .clone()
        .unwrap_or_else(|| config.paths.input_root.clone());
    let layout = cache_layout(&args.location, config);

    let selected: Vec<(String, InputRef)> = discover(&input_root)?
        .into_iter()
        .map(|input| (input.relative_name(&input_root), input))
        .filter(|(name, _)| selects(name, &args))
        .collect();

    if args.list {
        for (name, _) in &selected {
            println!("{}", name);
        }
        return Ok(());
    }

    let records: Vec<CheckRecord> = selected
        .iter()
        .map(|(name, input)| {
            let record = check_input(&layout, name, input);
            if args.format == OutputFormat::Table {
                print_record(&record);
            }
            record
        })
        .collect();

    let failed = records.iter().filter(|r| !r.status.is_ok()).count();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Table => {
            print_failures(&records);
            println!();
            let verdict = if failed == 0 {
                style("ok").green()
            } else {
                style("FAILED").red()
            };
            println!(
                "check result: {}. {} passed; {} failed",
                verdict,
                records.len() - failed,
                failed
            );
        }
    }

    if failed > 0 {
        return Err(SimcacheError::ArtifactsMissing { count: failed });
    }
    Ok(())
}

/// libtest-style selection: substring or exact filter, then skips
fn selects(name: &str, args: &CheckArgs) -> bool {
    let filtered = match &args.filter {
        None => true,
        Some(filter) if args.exact => name == filter,
        Some(filter) => name.contains(filter.as_str()),
    };
    filtered && args.skip.iter().all(|skip| !name.contains(skip.as_str()))
}

fn check_input(layout: &CacheLayout, name: &str, input: &InputRef) -> CheckRecord {
    let id = match identity(input) {
        Ok(id) => id,
        Err(e) => {
            return CheckRecord {
                name: name.to_string(),
                identity: None,
                slot: None,
                status: CheckStatus::Error(e.to_string()),
            }
        }
    };

    let slot = layout.slot_for(&id);
    let status = if !slot.exists() {
        CheckStatus::Missing
    } else {
        match verify_artifact(slot.path()) {
            Ok(()) => CheckStatus::Ok,
            Err(e) => CheckStatus::Corrupt(e.to_string()),
        }
    };

    CheckRecord {
        name: name.to_string(),
        identity: Some(id.to_string()),
        slot: Some(slot.path().display().to_string()),
        status,
    }
}

/// Decode an artifact to nowhere, surfacing truncation or corruption
pub fn verify_artifact(path: &Path) -> io::Result<()> {
    let mut decoder = zstd::stream::read::Decoder::new(File::open(path)?)?;
    io::copy(&mut decoder, &mut io::sink())?;
    Ok(())
}

fn print_record(record: &CheckRecord) {
    let status = match record.status {
        CheckStatus::Ok => style(record.status.to_string()).green(),
        _ => style(record.status.to_string()).red(),
    };
    println!("check {} ... {}", record.name, status);
    let _ = io::stdout().flush();
}

fn print_failures(records: &[CheckRecord]) {
    let failures: Vec<&CheckRecord> = records.iter().filter(|r| !r.status.is_ok()).collect();
    if failures.is_empty() {
        return;
    }

    println!();
    println!("failures:");
    for record in failures {
        println!();
        println!("---- {} ----", record.name);
        if let Some(id) = &record.identity {
            println!("Hash: {}", id);
        }
        match &record.status {
            CheckStatus::Missing => {
                if let Some(slot) = &record.slot {
                    println!("Expected artifact: {}", slot);
                }
            }
            CheckStatus::Corrupt(detail) | CheckStatus::Error(detail) => println!("{}", detail),
            CheckStatus::Ok => {}
        }
    }
}
