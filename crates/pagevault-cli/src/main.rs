mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "pagevault-cli")]
#[command(about = "Operator CLI for the pagevault snapshot store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Ingest page snapshot JSON files
    Ingest {
        /// Files holding one snapshot each, bare or wrapped in `{"pageData": ...}`
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print global statistics, or per-URL statistics with --url
    Stats {
        #[arg(long)]
        url: Option<String>,
        /// day, week, month, or year; anything else means the last 30 days
        #[arg(long)]
        period: Option<String>,
    },
    /// Search stored products by name or element text
    Search {
        query: String,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        per_page: Option<i64>,
        #[arg(long)]
        min_price: Option<Decimal>,
        #[arg(long)]
        max_price: Option<Decimal>,
        #[arg(long)]
        source: Option<String>,
        /// Only products with a positive discount
        #[arg(long)]
        discount: bool,
    },
    /// Page through the scrape history of one URL, newest first
    History {
        url: String,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        per_page: Option<i64>,
        #[arg(long)]
        source: Option<String>,
        /// RFC 3339 lower bound on snapshot creation time
        #[arg(long)]
        from: Option<String>,
        /// RFC 3339 upper bound on snapshot creation time
        #[arg(long)]
        to: Option<String>,
        /// Only successful scrapes
        #[arg(long)]
        success: bool,
    },
    /// Delete a snapshot and the products it currently owns
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("pagevault-cli: run with --help to list commands");
        return Ok(());
    };

    let config = pagevault_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    // stdout carries the JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = pagevault_db::PoolConfig::from_app_config(&config);
    let pool = pagevault_db::connect_pool(&config.database_url, pool_config).await?;
    let store = pagevault_db::Store::new(pool);
    let timeout = config.request_timeout();

    match command {
        Commands::Migrate => commands::run_migrate(&store).await,
        Commands::Ingest { files } => commands::run_ingest(&store, timeout, &files).await,
        Commands::Stats { url, period } => {
            commands::run_stats(&store, timeout, url.as_deref(), period.as_deref()).await
        }
        Commands::Search {
            query,
            page,
            per_page,
            min_price,
            max_price,
            source,
            discount,
        } => {
            let args = commands::SearchArgs {
                query,
                page,
                per_page,
                min_price,
                max_price,
                source,
                discount,
            };
            commands::run_search(&store, timeout, &args).await
        }
        Commands::History {
            url,
            page,
            per_page,
            source,
            from,
            to,
            success,
        } => {
            let args = commands::HistoryArgs {
                url,
                page,
                per_page,
                source,
                date_from: from,
                date_to: to,
                success_only: success,
            };
            commands::run_history(&store, timeout, &args).await
        }
        Commands::Delete { id } => commands::run_delete(&store, timeout, id).await,
    }
}
