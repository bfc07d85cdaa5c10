//! Bookshop directory CLI
//!
//! Local entry point for inspecting the directory against whichever backend
//! the configuration selects. For AWS Lambda, use `directory-lambda`.

use std::path::PathBuf;

use bookshop_directory::{
    Directory,
    error::Result,
    models::{Config, FilterCriteria},
    services::RefreshOutcome,
    storage::BackendKind,
};
use clap::{Parser, Subcommand};

/// Bookshop directory - slug resolution over swappable storage
#[derive(Parser, Debug)]
#[command(name = "directory", version, about = "Independent bookshop directory")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List live bookshops, optionally filtered
    List {
        /// State code or full name
        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        city: Option<String>,

        /// County, with or without the "County" suffix
        #[arg(long)]
        county: Option<String>,

        /// Feature ids; any match qualifies
        #[arg(long = "feature", value_delimiter = ',')]
        features: Vec<i64>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one bookshop by slug or numeric id
    Show { key: String },

    /// Print the canonical slug of every live bookshop
    Slugs,

    /// Show refresh controller status
    Status,

    /// Reload the backend and rebuild the slug index
    Refresh,

    /// Show which backend the configuration selects
    Backend,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, load_error) = match Config::load(&cli.config) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_env();
    init_logging(cli.verbose, &config.logging.level);

    if let Some(e) = load_error {
        log::warn!("Config load failed from {}: {}. Using defaults.", cli.config.display(), e);
    }

    if let Command::Validate = cli.command {
        log::info!("Validating {}...", cli.config.display());
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("Config OK, backend: {}", BackendKind::select(&config));
        return Ok(());
    }

    config.validate()?;

    if let Command::Backend = cli.command {
        println!("{}", BackendKind::select(&config));
        return Ok(());
    }

    let directory = Directory::from_config(&config)?;
    if let Err(e) = directory.warm_up().await {
        log::warn!("Warm-up failed, continuing with lazy index: {}", e);
    }

    match cli.command {
        Command::List {
            state,
            city,
            county,
            features,
            json,
        } => {
            let criteria = FilterCriteria {
                state,
                city,
                county,
                feature_ids: features,
            };
            let records = if criteria.is_empty() {
                directory.list().await
            } else {
                directory.filter(&criteria).await
            };

            if json {
                print_json(&records)?;
            } else {
                for record in &records {
                    println!(
                        "{:>6}  {:<40}  {}, {}",
                        record.id,
                        record.name,
                        record.city.as_deref().unwrap_or("-"),
                        record.state.as_deref().unwrap_or("-")
                    );
                }
                log::info!("{} bookshops", records.len());
            }
        }

        Command::Show { key } => {
            let record = match key.parse() {
                Ok(id) => directory.get_by_id(id).await,
                Err(_) => directory.get_by_slug(&key).await,
            };
            match record {
                Some(record) => print_json(&record)?,
                None => log::warn!("No bookshop found for '{}'", key),
            }
        }

        Command::Slugs => {
            for entry in directory.slug_entries().await {
                println!("{}\t{}", entry.id, entry.slug);
            }
        }

        Command::Status => print_json(&directory.status())?,

        Command::Refresh => match directory.refresh().await {
            RefreshOutcome::Refreshed { records } => {
                log::info!("Refreshed {} records", records);
            }
            RefreshOutcome::Skipped(reason) => log::info!("Refresh skipped: {:?}", reason),
            RefreshOutcome::Failed { attempts, message } => {
                log::error!("Refresh failed (attempt {}): {}", attempts, message);
            }
        },

        Command::Backend | Command::Validate => {}
    }

    Ok(())
}
