use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::amazon::AmazonProvider;
use super::cache::{CacheEntry, CacheStore};
use super::db::RecordStore;
use crate::config::ConfigProvider;
use crate::error::{AmazonError, RemoteError, Result};
use crate::models::{Association, BrowseNode, IdType, ImageMetadata, ItemRecord};

pub const SIMILAR_CACHE_PREFIX: &str = "amazon:similar_item_upcs:";
pub const SIMILAR_CACHE_TAG: &str = "amazon:similar";

pub fn similar_cache_key(code: &str) -> String {
    format!("{SIMILAR_CACHE_PREFIX}{code}")
}

/// Catalog lookups backed by the local association store and cache.
///
/// Callers go through this type instead of the raw [`AmazonProvider`] so that
/// UPC resolutions and similar-item lists are only fetched remotely once.
#[derive(Clone)]
pub struct Amazon {
    provider: AmazonProvider,
    records: Arc<dyn RecordStore>,
    cache: Arc<dyn CacheStore>,
}

impl Amazon {
    pub fn new(
        provider: AmazonProvider,
        records: Arc<dyn RecordStore>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            provider,
            records,
            cache,
        }
    }

    /// Build the client from settings; fails with a configuration error when
    /// credentials are missing.
    pub fn from_config(
        config: &dyn ConfigProvider,
        records: Arc<dyn RecordStore>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        Ok(Self::new(
            AmazonProvider::from_config(config)?,
            records,
            cache,
        ))
    }

    pub fn provider(&self) -> &AmazonProvider {
        &self.provider
    }

    pub async fn lookup<S: AsRef<str>>(&self, ids: &[S], id_type: IdType) -> Result<Vec<ItemRecord>> {
        self.provider.lookup(ids, id_type).await
    }

    pub async fn similarity_lookup(&self, asin: &str) -> Result<Vec<ItemRecord>> {
        self.provider.similarity_lookup(asin).await
    }

    pub async fn browse_node_lookup(&self, node_id: &str) -> Result<Option<BrowseNode>> {
        self.provider.browse_node_lookup(node_id).await
    }

    /// ASIN for `upc`, from the association store or, on a miss, from one
    /// remote lookup whose answer is then persisted. `None` when the catalog
    /// has no match.
    #[instrument(skip(self))]
    pub async fn resolve(&self, upc: &str) -> Result<Option<String>> {
        let upc = upc.trim();
        if upc.is_empty() {
            return Err(AmazonError::Validation("cannot resolve a blank UPC".into()));
        }
        if let Some(asin) = self.records.find_asin(upc).await? {
            debug!(upc, asin = %asin, "amazon: association hit");
            return Ok(Some(asin));
        }

        let items = self.provider.lookup(&[upc], IdType::Upc).await?;
        let Some(asin) = items.into_iter().map(|i| i.asin).find(|a| !a.is_empty()) else {
            info!(upc, "amazon: no catalog match for UPC");
            return Ok(None);
        };

        let association = Association {
            upc: upc.to_string(),
            asin: asin.clone(),
        };
        if self.records.insert_association(&association).await? {
            info!(upc, asin = %asin, "amazon: stored association");
        }
        Ok(Some(asin))
    }

    /// UPCs of items similar to `code`, served from cache unless
    /// `force_refresh` is set. Any failure while populating removes the
    /// cache entry so no stale or partial list survives.
    #[instrument(skip(self))]
    pub async fn get_similar_item_upcs(
        &self,
        code: &str,
        id_type: IdType,
        force_refresh: bool,
    ) -> Result<Vec<String>> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AmazonError::Validation("similar items requested for a blank code".into()));
        }
        let cid = similar_cache_key(code);

        if !force_refresh {
            if let Some(entry) = self.cache.get(&cid).await? {
                match serde_json::from_value::<Vec<String>>(entry.data) {
                    Ok(upcs) => {
                        debug!(cid = %cid, count = upcs.len(), "amazon: similar items cache hit");
                        return Ok(upcs);
                    }
                    Err(e) => warn!(cid = %cid, error = %e, "amazon: unreadable cache entry; refreshing"),
                }
            }
        }

        match self.populate_similar(&cid, code, id_type).await {
            Ok(upcs) => Ok(upcs),
            Err(e) => {
                error!(cid = %cid, error = %e, "amazon: get_similar_item_upcs failed");
                if let Err(clear) = self.cache.delete(&cid).await {
                    error!(cid = %cid, error = %clear, "amazon: failed to clear cache entry");
                }
                Err(e)
            }
        }
    }

    async fn populate_similar(&self, cid: &str, code: &str, id_type: IdType) -> Result<Vec<String>> {
        let asin = match id_type {
            IdType::Asin => code.to_string(),
            IdType::Upc => self
                .resolve(code)
                .await?
                .ok_or_else(|| RemoteError::NotFound(format!("UPC {code}")))?,
            other => {
                return Err(AmazonError::Validation(format!(
                    "similar items need an ASIN or UPC, got {other}"
                )))
            }
        };

        let similar = self.provider.similarity_lookup(&asin).await?;
        let mut upcs: Vec<String> = Vec::new();
        for item in &similar {
            self.store_primary_images(item).await;

            for upc in item.all_upcs() {
                let association = Association {
                    upc: upc.clone(),
                    asin: item.asin.clone(),
                };
                self.records.insert_association(&association).await?;
                if !upcs.contains(&upc) {
                    upcs.push(upc);
                }
            }
        }

        let data = Value::from(upcs.clone());
        self.cache
            .set(CacheEntry::permanent(cid, data, &[SIMILAR_CACHE_TAG]))
            .await?;
        info!(cid, asin = %asin, similar = similar.len(), upcs = upcs.len(), "amazon: cached similar items");
        Ok(upcs)
    }

    /// Persist the primary image set the first time an ASIN is seen. Row
    /// failures are logged and skipped.
    async fn store_primary_images(&self, item: &ItemRecord) {
        match self.records.has_images(&item.asin).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                warn!(asin = %item.asin, error = %e, "amazon: image lookup failed; skipping images");
                return;
            }
        }
        for image in item.primary_images() {
            let row = ImageMetadata::from_image(&item.asin, image);
            if let Err(e) = self.records.insert_image(&row).await {
                warn!(asin = %row.asin, size = %row.size, error = %e, "amazon: failed to insert item image");
            }
        }
    }

    /// Stored image rows for `asin`.
    pub async fn item_images(&self, asin: &str) -> Result<Vec<ImageMetadata>> {
        Ok(self.records.images_for(asin.trim()).await?)
    }

    pub async fn clear_similar_item_upcs(&self, code: &str) -> Result<()> {
        Ok(self.cache.delete(&similar_cache_key(code.trim())).await?)
    }

    /// Drop every cached similar-items list.
    pub async fn invalidate_similar_items(&self) -> Result<u64> {
        Ok(self.cache.invalidate_tag(SIMILAR_CACHE_TAG).await?)
    }

    pub async fn purge_expired_cache(&self) -> Result<u64> {
        Ok(self.cache.purge_expired().await?)
    }
}
