//! Listing crawler CLI
//!
//! Local execution entry point. Runs the sweep loop against JSON files in
//! the storage directory and logs matches.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use listing_crawler::{
    error::{AppError, Result},
    models::{Config, PathsConfig},
    pipeline,
    services::{LogNotifier, ReqwestTransport},
    sites::default_adapters,
    storage::{LocalStorage, ProcessedStore},
};

/// Classifieds listing crawler
#[derive(Parser, Debug)]
#[command(
    name = "listing-crawler",
    version,
    about = "Polls classifieds sites for listings matching your filters"
)]
struct Cli {
    /// Storage directory with filters and state (default: `[paths].storage_dir`)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Configuration file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sweep all enabled filters until interrupted
    Run,

    /// Sweep all enabled filters once
    Sweep,

    /// Validate configuration and filter files
    Validate,

    /// List supported sites and their request limits
    Sites,

    /// Show filters and processed listing counts
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        // An explicitly requested file must exist and parse
        Some(path) => Config::load(path).map_err(|e| {
            AppError::config(format!("cannot load {}: {}", path.display(), e))
        })?,
        None => {
            let root = cli
                .storage_dir
                .clone()
                .unwrap_or_else(|| PathsConfig::default().storage_dir);
            Config::load_or_default(root.join("config.toml"))
        }
    };
    let storage_dir = config.storage_dir(cli.storage_dir.as_deref());
    let storage = Arc::new(LocalStorage::new(&storage_dir));

    match cli.command {
        Command::Run | Command::Sweep => {
            config.validate()?;
            let scheduler = pipeline::build_scheduler(
                &config,
                Arc::clone(&storage),
                Arc::new(ReqwestTransport::new(&config.crawler)?),
                Arc::new(LogNotifier::new(&config.notify.template)),
            )
            .await?;

            if matches!(cli.command, Command::Run) {
                log::info!("Listing crawler starting...");
                scheduler.run().await;
            } else {
                let summary = scheduler.sweep().await?;
                log::info!("Sweep complete: {:?}", summary);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            let adapters = default_adapters()?;
            let filters = storage.load_filters().await?;
            let mut invalid = 0;
            for filter in &filters {
                let site = adapters
                    .iter()
                    .find(|a| a.descriptor().matches_url(&filter.url));
                match (url::Url::parse(&filter.url), site) {
                    (Err(e), _) => {
                        invalid += 1;
                        log::error!("Filter '{}': invalid URL {}: {}", filter.title, filter.url, e);
                    }
                    (Ok(_), None) => {
                        invalid += 1;
                        log::error!("Filter '{}': no site adapter for {}", filter.title, filter.url);
                    }
                    (Ok(_), Some(adapter)) => {
                        log::info!("✓ '{}' -> {}", filter.title, adapter.descriptor().name);
                    }
                }
            }

            if invalid > 0 {
                return Err(AppError::validation(format!(
                    "{} of {} filters are invalid",
                    invalid,
                    filters.len()
                )));
            }
            log::info!("All validations passed!");
        }

        Command::Sites => {
            for adapter in default_adapters()? {
                let site = adapter.descriptor();
                log::info!(
                    "{:<14} {:<28} {} requests / {}s",
                    site.key,
                    site.base_url,
                    site.limits.quota,
                    site.limits.window.as_secs()
                );
            }
        }

        Command::Info => {
            log::info!("Storage directory: {}", storage_dir.display());

            let filters = storage.load_filters().await?;
            let processed = storage.load().await?;
            log::info!(
                "{} filters, {} enabled",
                filters.len(),
                filters.iter().filter(|f| f.enabled).count()
            );
            for filter in &filters {
                log::info!(
                    "{} '{}' enabled={} first_run_completed={} processed={}",
                    filter.id,
                    filter.title,
                    filter.enabled,
                    filter.first_run_completed,
                    processed.get(&filter.id).map_or(0, Vec::len)
                );
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
