//! # Car Scout CLI (`scout`)
//!
//! The `scout` binary runs ingestion cycles, admits single listings, and
//! queries the stored cars. It can also start the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! scout --config ./config/scout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scout init` | Create the SQLite database and run schema migrations |
//! | `scout ingest [QUERY]` | Run one ingestion cycle |
//! | `scout add <MAKE> <MODEL> <YEAR> <PRICE>` | Admit a single listing |
//! | `scout list` | List stored cars with aggregate statistics |
//! | `scout history` | Show recent searches |
//! | `scout stats` | Database statistics |
//! | `scout similar --price <P>` | Cars within the price tolerance of `P` |
//! | `scout serve` | Start the HTTP API server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use car_scout::cars::{self, AddArgs, DEFAULT_HISTORY_LIMIT};
use car_scout::{config, ingest, migrate, server, stats};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Car Scout CLI: collect, deduplicate, and group vehicle listings.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scout.toml` for an example.
#[derive(Parser)]
#[command(
    name = "scout",
    about = "Car Scout: collect vehicle listings, skip duplicates, group new arrivals by price",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file with the `cars` and
    /// `search_history` tables. Safe to run repeatedly.
    Init,

    /// Run one ingestion cycle.
    ///
    /// Asks the configured source for listings matching the query, admits
    /// the new ones, records the search, and prints any similar-price
    /// groups among the cars added.
    Ingest {
        /// Search query. Defaults to `[search].default_query`.
        query: Option<String>,

        /// Price tolerance for grouping, overriding `[search].price_tolerance`.
        #[arg(long)]
        tolerance: Option<f64>,

        /// Read the source response from a file instead of the configured provider.
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Admit a single listing.
    ///
    /// Runs the same validation and duplicate check as ingestion.
    Add {
        make: String,
        model: String,
        year: String,
        /// Price in USD; `$` and `,` are accepted.
        price: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Defaults to `[search].manual_source`.
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },

    /// List stored cars, newest first, with aggregate statistics.
    List,

    /// Show recent searches, newest first.
    History {
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },

    /// Show database statistics.
    Stats,

    /// Find stored cars near a price.
    Similar {
        #[arg(long)]
        price: f64,

        /// Defaults to `[search].price_tolerance`.
        #[arg(long)]
        tolerance: Option<f64>,

        /// Defaults to `[search].group_limit`.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            query,
            tolerance,
            from_file,
        } => {
            ingest::run_ingest(&cfg, query, tolerance, from_file).await?;
        }
        Commands::Add {
            make,
            model,
            year,
            price,
            url,
            description,
            source,
            image_url,
        } => {
            let args = AddArgs {
                make,
                model,
                year,
                price,
                url,
                description,
                source,
                image_url,
            };
            cars::run_add(&cfg, args).await?;
        }
        Commands::List => {
            cars::run_list(&cfg).await?;
        }
        Commands::History { limit } => {
            cars::run_history(&cfg, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Similar {
            price,
            tolerance,
            limit,
        } => {
            cars::run_similar(&cfg, price, tolerance, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
