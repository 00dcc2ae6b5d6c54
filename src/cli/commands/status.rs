//! Status command - check external tools and cache directories

use crate::cache::CacheLayout;
use crate::cli::args::StatusArgs;
use crate::cli::commands::cache_layout;
use crate::config::Config;
use crate::error::SimcacheResult;
use crate::input::discover;
use crate::pipeline::resolve_program;
use console::{style, Emoji};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> SimcacheResult<()> {
    println!("{}", style("simcache status").bold().cyan());

    let mut all_ok = true;

    let analyzer = args
        .analyzer
        .clone()
        .or_else(|| config.analyzer.program.clone());
    all_ok &= check_analyzer(analyzer.as_deref());

    let compressor = args
        .compressor
        .clone()
        .unwrap_or_else(|| config.compression.program.clone());
    all_ok &= check_compressor(&compressor).await;

    let input_root = args
        .input_root
        .clone()
        .unwrap_or_else(|| config.paths.input_root.clone());
    all_ok &= check_input_root(&input_root);

    let layout = cache_layout(&args.location, config);
    check_cache_root(&layout);

    println!();
    if all_ok {
        println!("{}", style("Ready to build").green().bold());
    } else {
        println!(
            "{}",
            style("Some checks failed - build will refuse to start")
                .yellow()
                .bold()
        );
    }

    Ok(())
}

fn check_analyzer(program: Option<&Path>) -> bool {
    println!();
    println!("{}", style("Analyzer:").bold());

    let Some(program) = program else {
        println!(
            "  {} {} - Set analyzer.program or SIMCACHE_ANALYZER",
            CROSS,
            style("Not configured").red()
        );
        return false;
    };

    match resolve_program(program) {
        Some(path) => {
            println!("  {} {}", CHECK, style(path.display()).green());
            true
        }
        None => {
            println!(
                "  {} {} - {}",
                CROSS,
                style("Not found or not executable").red(),
                program.display()
            );
            false
        }
    }
}

async fn check_compressor(program: &Path) -> bool {
    println!();
    println!("{}", style("Compressor:").bold());

    let Some(path) = resolve_program(program) else {
        println!(
            "  {} {} - Install zstd or set compression.program",
            CROSS,
            style("Not found").red()
        );
        return false;
    };

    let version = Command::new(&path)
        .arg("--version")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;

    match version {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            let first_line = version.lines().next().unwrap_or("unknown");
            println!("  {} {}", CHECK, style(first_line.trim()).green());
        }
        _ => {
            println!(
                "  {} {} - {}",
                WARN,
                style("Version unavailable").yellow(),
                path.display()
            );
        }
    }

    true
}

fn check_input_root(root: &Path) -> bool {
    println!();
    println!("{}", style("Inputs:").bold());

    match discover(root) {
        Ok(inputs) if inputs.is_empty() => {
            println!(
                "  {} {} - {}",
                WARN,
                style("No charts found").yellow(),
                root.display()
            );
            true
        }
        Ok(inputs) => {
            println!(
                "  {} {} charts under {}",
                CHECK,
                style(inputs.len()).green(),
                root.display()
            );
            true
        }
        Err(e) => {
            println!("  {} {}", CROSS, style(e).red());
            false
        }
    }
}

fn check_cache_root(layout: &CacheLayout) {
    println!();
    println!("{}", style("Cache:").bold());

    let root = layout.root();
    if !root.is_dir() {
        println!(
            "  {} {} - {} will be created on first build",
            WARN,
            style("Missing").yellow(),
            root.display()
        );
        return;
    }

    let usage = layout.scan();
    println!(
        "  {} {} artifacts ({}) under {}",
        CHECK,
        style(usage.artifacts).green(),
        format_bytes(usage.bytes),
        root.display()
    );
    if usage.partials > 0 {
        println!(
            "  {} {} stale partial files - left by a killed build unless one is running",
            WARN,
            style(usage.partials).yellow()
        );
    }
}

/// Format bytes as human-readable size (e.g., "1.5 MB")
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
