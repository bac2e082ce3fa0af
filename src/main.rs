//! Slug-Harvester main entry point
//!
//! This is the command-line interface for the Slug-Harvester record crawler.

use clap::Parser;
use slug_harvester::config::{load_config, Config, StorageBackend};
use slug_harvester::crawler::run_crawl;
use slug_harvester::seed::{CandidateSource, JsonFileCandidates};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code reported when a run stops on Ctrl-C or SIGTERM
const EXIT_INTERRUPTED: u8 = 130;

/// Slug-Harvester: a resumable record crawler
///
/// Slug-Harvester walks a list of ids, fetches each record and its
/// sub-records from a remote API, and stores the normalized result. Progress
/// is checkpointed so an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "slug-harvester")]
#[command(version)]
#[command(about = "A resumable record crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show progress of the configured run and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config(&cli.config) {
        Ok(cfg) => {
            tracing::info!("Configuration loaded successfully");
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Handle different modes
    let result = if cli.dry_run {
        handle_dry_run(&config).map(|_| ExitCode::SUCCESS)
    } else if cli.stats {
        handle_stats(&config).map(|_| ExitCode::SUCCESS)
    } else {
        handle_crawl(config).await
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("slug_harvester=info,warn"),
            1 => EnvFilter::new("slug_harvester=debug,info"),
            2 => EnvFilter::new("slug_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Slug-Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max attempts: {}", config.crawler.max_attempts);
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    println!(
        "  Politeness delay: {}-{}ms",
        config.crawler.politeness_min_ms, config.crawler.politeness_max_ms
    );
    println!(
        "  Auxiliary delay: {}ms",
        config.crawler.auxiliary_delay_ms
    );
    println!(
        "  Checkpoint every: {} items",
        config.crawler.checkpoint_interval
    );
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );

    println!("\nAPI:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  User agent: {}", config.user_agent.header_value());

    println!("\nStorage:");
    println!("  Run key: {}", config.storage.run_key);
    match config.storage.backend {
        StorageBackend::Sqlite => {
            println!(
                "  SQLite database: {}",
                config.storage.database_path.as_deref().unwrap_or("-")
            );
        }
        StorageBackend::File => {
            println!(
                "  State file: {}",
                config.storage.state_path.as_deref().unwrap_or("-")
            );
            println!(
                "  Output file: {}",
                config.storage.output_path.as_deref().unwrap_or("-")
            );
        }
    }

    let candidates =
        JsonFileCandidates::new(&config.input.candidates_path, &config.input.id_field);
    let ids = candidates.candidate_ids()?;

    println!("\nCandidates:");
    println!("  File: {}", config.input.candidates_path);
    println!("  Id field: {}", config.input.id_field);
    println!("  Ids: {}", ids.len());

    println!("\n✓ Configuration is valid");
    println!(
        "✓ A fresh run would be seeded with {} candidate ids",
        ids.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows progress of the configured run
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use slug_harvester::output::{load_statistics, print_statistics};
    use slug_harvester::storage::open_storage;

    let storage = open_storage(&config.storage)?;
    let stats = load_statistics(storage.as_ref(), &config.storage.run_key)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing::info!(
        "Starting crawl for run '{}' (will resume if progress exists)",
        config.storage.run_key
    );

    match run_crawl(config).await {
        Ok(report) if report.interrupted => {
            tracing::info!(
                "Crawl interrupted: {} processed, {} remaining, {} failed",
                report.processed,
                report.remaining,
                report.failed
            );
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Ok(report) => {
            tracing::info!(
                "Crawl completed successfully: {} processed, {} failed",
                report.processed,
                report.failed
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Err(e.into()),
    }
}
