use std::path::PathBuf;
use std::sync::Arc;

use amazon_lookup::config::{ConfigProvider, LayeredConfig, SettingsFile, DATABASE_URL};
use amazon_lookup::database_ops::cache::SqliteCacheStore;
use amazon_lookup::database_ops::db::{SqliteRecordStore, DEFAULT_DATABASE_URL};
use amazon_lookup::{Amazon, IdType};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "amz", version, about = "Amazon product lookup CLI")]
struct Cli {
    /// JSON settings file consulted after AMAZON_* environment variables
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Override for the SQLite database URL (default: sqlite://amazon.db)
    #[arg(long, global = true)]
    db_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Look up one or more items (batched 10 per request)
    Lookup {
        #[arg(required = true)]
        ids: Vec<String>,
        /// ASIN, UPC, EAN, ISBN or SKU
        #[arg(long, default_value = "ASIN")]
        id_type: IdType,
    },
    /// Print UPCs of items similar to CODE (cached)
    Similar {
        code: String,
        /// ASIN or UPC
        #[arg(long, default_value = "ASIN")]
        id_type: IdType,
        /// Ignore any cached list and fetch again
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Category metadata and top sellers for a browse node
    BrowseNode { node_id: String },
    /// Resolve a UPC to its ASIN (stored after the first lookup)
    Resolve { upc: String },
    /// Stored image metadata for an ASIN
    Images { asin: String },
    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum CacheAction {
    /// Remove the cached similar-items list for CODE
    Clear { code: String },
    /// Remove every cached similar-items list
    Invalidate,
    /// Remove expired entries
    Purge,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    amazon_lookup::tracing::init_tracing("info")?;
    let cli = Cli::parse();

    let settings = match cli.settings.as_deref() {
        Some(path) => Some(
            SettingsFile::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
        ),
        None => None,
    };
    let config = LayeredConfig::standard(settings);
    config.log_snapshot("amz");

    let db_url = cli
        .db_url
        .clone()
        .or_else(|| config.get(DATABASE_URL))
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
    let records = SqliteRecordStore::connect(&db_url)
        .await
        .context("opening association store")?;
    let cache = SqliteCacheStore::new(records.pool().clone())
        .await
        .context("opening cache store")?;
    let amazon = Amazon::from_config(&config, Arc::new(records), Arc::new(cache))
        .context("configuring Amazon client")?;

    match cli.command {
        Commands::Lookup { ids, id_type } => {
            let items = amazon.lookup(ids.as_slice(), id_type).await?;
            info!(requested = ids.len(), found = items.len(), "lookup finished");
            print_json(&items)?;
        }
        Commands::Similar {
            code,
            id_type,
            refresh,
        } => {
            let upcs = amazon
                .get_similar_item_upcs(&code, id_type, refresh)
                .await
                .with_context(|| format!("similar items for {code}"))?;
            print_json(&upcs)?;
        }
        Commands::BrowseNode { node_id } => {
            let node = amazon.browse_node_lookup(&node_id).await?;
            print_json(&node)?;
        }
        Commands::Resolve { upc } => {
            let asin = amazon.resolve(&upc).await?;
            print_json(&asin)?;
        }
        Commands::Images { asin } => {
            let images = amazon.item_images(&asin).await?;
            print_json(&images)?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Clear { code } => {
                amazon.clear_similar_item_upcs(&code).await?;
                info!(code = %code, "cache entry cleared");
            }
            CacheAction::Invalidate => {
                let removed = amazon.invalidate_similar_items().await?;
                info!(removed, "similar-items cache invalidated");
            }
            CacheAction::Purge => {
                let removed = amazon.purge_expired_cache().await?;
                info!(removed, "expired cache entries purged");
            }
        },
    }

    Ok(())
}
