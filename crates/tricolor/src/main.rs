//! Tricolor CLI - the three most common colors of every image in a URL list.
//!
//! Tricolor downloads each image named in a text file, counts its pixel
//! colors and appends `url,#RRGGBB,#RRGGBB,#RRGGBB` to a CSV file.
//!
//! # Usage
//!
//! ```bash
//! # Process a URL list
//! tricolor process urls.txt colors.csv
//!
//! # Tune the download and analysis gates
//! tricolor process urls.txt colors.csv -d 16 -a 8
//!
//! # Keep going past broken URLs
//! tricolor process urls.txt colors.csv --skip-failed
//!
//! # View configuration
//! tricolor config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Tricolor - find the three most common colors of every image in a URL list.
#[derive(Parser, Debug)]
#[command(name = "tricolor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Download every image in a URL list and write its dominant colors to CSV
    Process(cli::process::ProcessArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match tricolor_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `tricolor config path`."
            );
            tricolor_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Tricolor v{}", tricolor_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
