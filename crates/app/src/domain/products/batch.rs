//! Concurrent batch lookups.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use rustc_hash::{FxHashMap, FxHashSet};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::warn;

use crate::domain::products::{
    models::{Product, ProductUuid},
    store::ProductStore,
};

/// Fetches many products through the store with bounded concurrency.
#[derive(Clone)]
pub struct BatchFetcher {
    store: Arc<dyn ProductStore>,
    max_concurrency: usize,
}

impl Debug for BatchFetcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BatchFetcher")
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl BatchFetcher {
    pub fn new(store: Arc<dyn ProductStore>, max_concurrency: usize) -> Self {
        Self {
            store,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Fetch `uuids`, returning found products in first-occurrence order.
    ///
    /// Duplicate identifiers are fetched once. Missing products and failed
    /// lookups are left out of the result.
    pub async fn fetch_many(&self, uuids: &[ProductUuid]) -> Vec<Product> {
        let mut seen = FxHashSet::default();
        let unique: Vec<ProductUuid> = uuids
            .iter()
            .copied()
            .filter(|uuid| seen.insert(*uuid))
            .collect();

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut lookups = JoinSet::new();

        for uuid in unique.iter().copied() {
            let store = Arc::clone(&self.store);
            let permits = Arc::clone(&permits);

            lookups.spawn(async move {
                let _permit = permits.acquire_owned().await;

                (uuid, store.find_by_uuid(uuid).await)
            });
        }

        let mut found = FxHashMap::default();

        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((uuid, Ok(Some(product)))) => {
                    found.insert(uuid, product);
                }
                Ok((_, Ok(None))) => {}
                Ok((uuid, Err(error))) => {
                    warn!(product = %uuid, "batch lookup failed: {error}");
                }
                Err(error) => {
                    warn!("batch lookup task failed: {error}");
                }
            }
        }

        unique
            .into_iter()
            .filter_map(|uuid| found.remove(&uuid))
            .collect()
    }
}
