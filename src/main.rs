use anyhow::Context;
use clap::{Parser, ValueEnum};
use recipe_provenance::config::{log_level_from_env, RunConfig, DEFAULT_LOG_PATH, DEFAULT_OUTPUT_PATH};
use recipe_provenance::harvest::{write_results, ProvenancePipeline, RunReport, TagFallback};
use recipe_provenance::logging::{init_logging, parse_level, LoggingConfig};
use recipe_provenance::{ConfigError, GitCli};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, Level};

/// Resolves the upstream source provenance of every package in a build manifest
#[derive(Parser, Debug)]
#[command(
    name = "recipe-provenance",
    version,
    about = "Resolve source URI, revision, branch and tag for packages in a build manifest",
    long_about = "recipe-provenance reads a build manifest (pn-buildlist), finds the recipe \
                  for every listed package under the layers directory, extracts its source \
                  declarations and resolves a descriptive tag from the upstream repository.\n\n\
                  Examples:\n  \
                  recipe-provenance --buildlist-path pn-buildlist --layers-path ./layers\n  \
                  recipe-provenance --buildlist-path build/pn-buildlist --layers-path ./layers --jobs 8"
)]
struct CliArgs {
    #[arg(long, value_name = "FILE", help = "Path to the build manifest (pn-buildlist)")]
    buildlist_path: PathBuf,

    #[arg(long, value_name = "DIR", help = "Root of the recipe layers")]
    layers_path: PathBuf,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        default_value = DEFAULT_OUTPUT_PATH,
        help = "Where to write the JSON results"
    )]
    output: PathBuf,

    #[arg(
        long,
        value_name = "FILE",
        default_value = DEFAULT_LOG_PATH,
        help = "Diagnostic log file, truncated on every run"
    )]
    log_file: PathBuf,

    #[arg(long, value_name = "LEVEL", help = "Set logging level")]
    log_level: Option<String>,

    #[arg(short = 'j', long, value_name = "N", help = "Packages processed concurrently")]
    jobs: Option<usize>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Timeout for each clone, checkout and describe"
    )]
    clone_timeout: Option<u64>,

    #[arg(
        long,
        value_enum,
        default_value = "revision-label",
        help = "Tag to report when resolution fails"
    )]
    tag_fallback: TagFallbackArg,

    #[arg(long, help = "Keep clone directories after use")]
    keep_workdirs: bool,

    #[arg(short = 'v', long, help = "Debug-level logging")]
    verbose: bool,

    #[arg(
        short = 'q',
        long,
        conflicts_with = "verbose",
        help = "Quiet mode - only errors in the log and on stderr"
    )]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TagFallbackArg {
    /// `rev-` followed by the first 8 characters of the revision
    RevisionLabel,
    /// No tag
    Absent,
}

impl From<TagFallbackArg> for TagFallback {
    fn from(arg: TagFallbackArg) -> Self {
        match arg {
            TagFallbackArg::RevisionLabel => TagFallback::RevisionLabel,
            TagFallbackArg::Absent => TagFallback::Absent,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let mut logging = LoggingConfig::with_level(log_level(&args)).with_log_file(&args.log_file);
    if args.quiet {
        logging = logging.with_console_level(Level::ERROR);
    }
    if let Err(e) = init_logging(logging) {
        eprintln!(
            "Error: Failed to create log file '{}': {}",
            args.log_file.display(),
            e
        );
        process::exit(1);
    }
    debug!("Arguments: {:?}", args);

    match run(&config).await {
        Ok(report) => print_summary(&report, &config),
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn build_config(args: &CliArgs) -> Result<RunConfig, ConfigError> {
    let mut config = RunConfig::new(&args.buildlist_path, &args.layers_path).with_env_overrides()?;
    config.output_path = args.output.clone();
    config.tag_fallback = args.tag_fallback.into();
    config.keep_workdirs = args.keep_workdirs;
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if let Some(secs) = args.clone_timeout {
        config.clone_timeout = Duration::from_secs(secs);
    }

    config.validate()?;
    Ok(config)
}

fn log_level(args: &CliArgs) -> Level {
    if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        parse_level(&log_level_from_env())
    }
}

async fn run(config: &RunConfig) -> anyhow::Result<RunReport> {
    let pipeline = ProvenancePipeline::from_config(config, Arc::new(GitCli::new()));
    let report = pipeline
        .run(&config.manifest_path, &config.layers_path)
        .await
        .context("Provenance run failed")?;

    write_results(&config.output_path, &report.results)
        .with_context(|| format!("Could not save '{}'", config.output_path.display()))?;
    Ok(report)
}

fn print_summary(report: &RunReport, config: &RunConfig) {
    println!(
        "Resolved {} package(s) in {} ms",
        report.results.len(),
        report.stats.total_duration_ms
    );
    if !report.incomplete.is_empty() {
        println!("Incomplete source info: {}", report.incomplete.len());
    }
    if !report.not_found.is_empty() {
        println!("No recipe found: {}", report.not_found.len());
    }
    if !report.failed.is_empty() {
        println!("Failed: {}", report.failed.len());
    }
    if report.stats.malformed_lines > 0 {
        println!("Skipped manifest lines: {}", report.stats.malformed_lines);
    }
    println!("Results written to {}", config.output_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_both_paths_are_required() {
        let err = CliArgs::try_parse_from(["recipe-provenance", "--layers-path", "layers"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = CliArgs::try_parse_from(["recipe-provenance", "--buildlist-path", "pn-buildlist"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_defaults_and_levels() {
        let args = CliArgs::try_parse_from([
            "recipe-provenance",
            "--buildlist-path",
            "pn-buildlist",
            "--layers-path",
            "layers",
            "-q",
        ])
        .unwrap();
        assert_eq!(args.output, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert!(matches!(args.tag_fallback, TagFallbackArg::RevisionLabel));
        assert_eq!(log_level(&args), Level::ERROR);
    }
}
