//! Build command - analyze charts whose artifacts are missing

use crate::cli::args::BuildArgs;
use crate::cli::commands::cache_layout;
use crate::config::Config;
use crate::error::{SimcacheError, SimcacheResult};
use crate::input::{discover, InputRef};
use crate::pipeline::{
    CompressorSettings, ItemOutcome, MaterializeMode, Materializer, Pipeline, ProcessAnalyzer,
    Shutdown,
};
use console::style;
use std::path::PathBuf;
use tracing::debug;

/// Build settings after applying CLI and environment overrides to config
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSettings {
    pub input_root: PathBuf,
    pub analyzer: Option<PathBuf>,
    pub analyzer_args: Vec<String>,
    pub compressor: CompressorSettings,
    pub materialize: MaterializeMode,
    pub scratch_dir: Option<PathBuf>,
    pub force: bool,
    pub strict: bool,
}

impl BuildSettings {
    pub fn resolve(args: &BuildArgs, config: &Config) -> Self {
        let analyzer_args = if args.analyzer_args.is_empty() {
            config.analyzer.args.clone()
        } else {
            args.analyzer_args.clone()
        };

        Self {
            input_root: args
                .input_root
                .clone()
                .unwrap_or_else(|| config.paths.input_root.clone()),
            analyzer: args.analyzer.clone().or_else(|| config.analyzer.program.clone()),
            analyzer_args,
            compressor: CompressorSettings {
                program: args
                    .compressor
                    .clone()
                    .unwrap_or_else(|| config.compression.program.clone()),
                level: args.level.unwrap_or(config.compression.level),
                threads: args.threads.unwrap_or(config.compression.threads),
            },
            materialize: args.materialize.unwrap_or(config.pipeline.materialize),
            scratch_dir: config.paths.scratch_dir.clone(),
            force: args.is_forced(),
            strict: args.strict || config.pipeline.strict,
        }
    }
}

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> SimcacheResult<()> {
    let settings = BuildSettings::resolve(&args, config);
    let layout = cache_layout(&args.location, config);
    debug!("Build settings: {:?}", settings);

    // Preconditions: nothing is processed unless both tools and the input root exist
    let program = settings
        .analyzer
        .as_deref()
        .ok_or(SimcacheError::AnalyzerNotConfigured)?;
    let analyzer = ProcessAnalyzer::resolve(
        program,
        settings.analyzer_args.clone(),
        settings.compressor.clone(),
    )?;
    let inputs = discover(&settings.input_root)?;

    let materializer = Materializer::new(settings.materialize, settings.scratch_dir.as_deref())?;
    let mut shutdown = Shutdown::listen();

    let report = Pipeline::new(&layout, &analyzer, materializer)
        .force(settings.force)
        .run(&inputs, &mut shutdown, print_outcome)
        .await;

    println!();
    println!(
        "{} generated, {} skipped, {} failed ({} inputs)",
        style(report.generated).green(),
        report.skipped,
        if report.failed > 0 {
            style(report.failed).red()
        } else {
            style(report.failed)
        },
        inputs.len()
    );

    if report.interrupted {
        return Err(SimcacheError::Interrupted);
    }
    if settings.strict && report.failed > 0 {
        return Err(SimcacheError::BatchFailed {
            failed: report.failed,
        });
    }
    Ok(())
}

fn print_outcome(input: &InputRef, outcome: &ItemOutcome) {
    match outcome {
        ItemOutcome::Skipped { slot } => {
            println!("{} {}", style("skip:").dim(), slot.display());
        }
        ItemOutcome::Stored { slot } => {
            println!("{} {}", style("generated:").green(), slot.display());
        }
        ItemOutcome::Failed { error } => {
            println!(
                "{} {}: {}",
                style("fail:").red(),
                input.path.display(),
                error
            );
        }
    }
}
