//! The `tricolor process` command for processing a URL list.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tricolor_core::config::expand_path;
use tricolor_core::{Config, ErrorPolicy, Pipeline, PipelineMode, RunStats};

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Text file with one image URL per line
    pub input: PathBuf,

    /// CSV file to write (created or truncated)
    pub output: PathBuf,

    /// Maximum concurrent downloads [default: from config]
    #[arg(short = 'd', long)]
    pub download_concurrency: Option<usize>,

    /// Maximum concurrent analyses [default: from config]
    #[arg(short = 'a', long)]
    pub analysis_concurrency: Option<usize>,

    /// Fetch and analyze in a single pool gated by the download limit
    #[arg(long)]
    pub fused: bool,

    /// Log and skip URLs that fail to download or decode instead of aborting
    #[arg(long)]
    pub skip_failed: bool,
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, config: Config) -> anyhow::Result<()> {
    let config = apply_overrides(config, &args)?;
    let input = expand_path(&args.input);
    let output = expand_path(&args.output);

    tracing::info!("Processing {} -> {}", input.display(), output.display());

    let spinner = create_spinner()?;
    let progress = spinner.clone();
    let pipeline = Pipeline::new(&config)?.on_row(move |record| {
        progress.inc(1);
        progress.set_message(record.url.clone());
    });

    let result = pipeline.run_files(&input, &output).await;
    spinner.finish_and_clear();

    let stats = result?;
    print_summary(&stats);
    Ok(())
}

/// Layer command-line flags over the loaded config and re-validate.
fn apply_overrides(mut config: Config, args: &ProcessArgs) -> anyhow::Result<Config> {
    if let Some(d) = args.download_concurrency {
        config.pipeline.download_concurrency = d;
    }
    if let Some(a) = args.analysis_concurrency {
        config.pipeline.analysis_concurrency = a;
    }
    if args.fused {
        config.pipeline.mode = PipelineMode::Fused;
    }
    if args.skip_failed {
        config.pipeline.error_policy = ErrorPolicy::Skip;
    }
    config.validate()?;
    Ok(config)
}

fn create_spinner() -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} rows ({per_sec}) {wide_msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

/// Print a formatted summary table after the run.
fn print_summary(stats: &RunStats) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    URLs read:    {:>8}", stats.urls_read);
    eprintln!("    Rows written: {:>8}", stats.rows_written);
    if stats.failed > 0 {
        eprintln!("    Skipped:      {:>8}", stats.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Duration:     {:>7.1}s", stats.elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", stats.rate());
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ProcessArgs,
    }

    fn parse(extra: &[&str]) -> ProcessArgs {
        let argv = ["process", "urls.txt", "out.csv"].iter().chain(extra);
        Harness::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_flags_default_to_config() {
        let args = parse(&[]);
        assert_eq!(args.download_concurrency, None);
        assert_eq!(args.analysis_concurrency, None);
        assert!(!args.fused);
        assert!(!args.skip_failed);

        let config = apply_overrides(Config::default(), &args).unwrap();
        assert_eq!(config.pipeline.download_concurrency, 8);
        assert_eq!(config.pipeline.mode, PipelineMode::Split);
        assert_eq!(config.pipeline.error_policy, ErrorPolicy::FailFast);
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&["-d", "3", "-a", "2", "--fused", "--skip-failed"]);
        let config = apply_overrides(Config::default(), &args).unwrap();
        assert_eq!(config.pipeline.download_concurrency, 3);
        assert_eq!(config.pipeline.analysis_concurrency, 2);
        assert_eq!(config.pipeline.mode, PipelineMode::Fused);
        assert_eq!(config.pipeline.error_policy, ErrorPolicy::Skip);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let args = parse(&["-a", "0"]);
        assert!(apply_overrides(Config::default(), &args).is_err());
    }

    #[tokio::test]
    async fn test_empty_list_writes_empty_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("urls.txt");
        let output = dir.path().join("out.csv");
        std::fs::write(&input, "").unwrap();

        let args = ProcessArgs {
            input,
            output: output.clone(),
            download_concurrency: Some(1),
            analysis_concurrency: Some(1),
            fused: false,
            skip_failed: false,
        };
        execute(args, Config::default()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "");
    }

    #[tokio::test]
    async fn test_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = ProcessArgs {
            input: dir.path().join("missing.txt"),
            output: dir.path().join("out.csv"),
            download_concurrency: None,
            analysis_concurrency: None,
            fused: false,
            skip_failed: false,
        };
        let err = execute(args, Config::default()).await.unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }
}
