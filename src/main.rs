use anyhow::Result;
use clap::{Parser, Subcommand};
use parcelmap::acquisition::DocumentKind;
use parcelmap::cli;
use parcelmap::cli::output::{ENV_JSON, ENV_NO_COLOR, ENV_QUIET};
use parcelmap::config::PipelineConfig;
use parcelmap::pipeline::{HarvestOptions, ScrapeOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "parcelmap")]
#[command(author, version, about = "Parcel market-data pipeline")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: <data-dir>/parcelmap.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file and PARCELMAP_HOME)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print the stage report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Suppress human-readable output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Debug-level logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build parcels.json from the GIS layers
    Seed,

    /// Fetch records pages into the cache
    Scrape {
        /// Stop after this many parcels
        #[arg(long)]
        limit: Option<usize>,
        /// Page kinds to fetch (sales, detail, permit); repeatable
        #[arg(long = "kind", value_parser = parse_kind)]
        kinds: Vec<DocumentKind>,
        /// Refetch pages that are already cached
        #[arg(long)]
        force: bool,
    },

    /// Extract facts from cached pages into the index
    Parse,

    /// Fetch and parse detail pages for parcels without a detail file
    Harvest {
        #[arg(long)]
        limit: Option<usize>,
        /// Save the index every N successful parcels
        #[arg(long)]
        checkpoint_interval: Option<usize>,
        #[arg(long)]
        force: bool,
    },

    /// Write hexbin and grid aggregates
    Aggregate,

    /// Show index, cache, and ledger coverage
    Status,

    /// Seed (if needed), scrape, parse, and aggregate
    All {
        /// Re-run seed even when parcels.json exists
        #[arg(long)]
        reseed: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        force: bool,
    },
}

fn parse_kind(s: &str) -> Result<DocumentKind, String> {
    DocumentKind::parse(s).ok_or_else(|| format!("unknown page kind '{s}'"))
}

fn init_tracing(verbose: bool, log_json: bool) {
    let level = if verbose { "parcelmap=debug" } else { "parcelmap=info" };
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = level.parse() {
        filter = filter.add_directive(directive);
    }
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands read these through `cli::output`.
    if cli.json {
        std::env::set_var(ENV_JSON, "1");
    }
    if cli.quiet {
        std::env::set_var(ENV_QUIET, "1");
    }
    if cli.no_color {
        std::env::set_var(ENV_NO_COLOR, "1");
    }
    init_tracing(cli.verbose, cli.log_json);

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    match cli.command {
        Commands::Seed => cli::seed_cmd::run(&config).await,
        Commands::Scrape { limit, kinds, force } => {
            let mut options = ScrapeOptions {
                limit,
                force,
                ..Default::default()
            };
            if !kinds.is_empty() {
                options.kinds = kinds;
            }
            cli::scrape_cmd::run(&config, &options).await
        }
        Commands::Parse => cli::parse_cmd::run(&config),
        Commands::Harvest {
            limit,
            checkpoint_interval,
            force,
        } => {
            let options = HarvestOptions {
                limit,
                checkpoint_interval,
                force,
            };
            cli::harvest_cmd::run(&config, &options).await
        }
        Commands::Aggregate => cli::aggregate_cmd::run(&config),
        Commands::Status => cli::status::run(&config),
        Commands::All {
            reseed,
            limit,
            force,
        } => {
            let options = ScrapeOptions {
                limit,
                force,
                ..Default::default()
            };
            cli::all_cmd::run(&config, reseed, &options).await
        }
    }
}
