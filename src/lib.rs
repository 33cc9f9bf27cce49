//! Amazon Product Advertising lookups with a local association store and a
//! similar-items cache.
//!
//! ```no_run
//! use std::sync::Arc;
//! use amazon_lookup::config::LayeredConfig;
//! use amazon_lookup::database_ops::cache::SqliteCacheStore;
//! use amazon_lookup::database_ops::db::SqliteRecordStore;
//! use amazon_lookup::{Amazon, IdType};
//!
//! # async fn run() -> amazon_lookup::error::Result<()> {
//! let records = SqliteRecordStore::connect("sqlite://amazon.db").await?;
//! let cache = SqliteCacheStore::new(records.pool().clone()).await?;
//! let amazon = Amazon::from_config(
//!     &LayeredConfig::standard(None),
//!     Arc::new(records),
//!     Arc::new(cache),
//! )?;
//! let upcs = amazon.get_similar_item_upcs("012345678905", IdType::Upc, false).await?;
//! # let _ = upcs;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod database_ops;
pub mod error;
pub mod models;
pub mod tracing;

pub mod util {
    pub mod env;
}

pub use database_ops::Amazon;
pub use error::{AmazonError, RemoteError, StoreError};
pub use models::{Association, BrowseNode, IdType, ImageMetadata, ItemRecord};
