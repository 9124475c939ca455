//! Model caching for sharing BERT weights across pipelines.
//!
//! Building a fill-mask and a POS pipeline, or several fill-mask pipelines with
//! the same options, loads each set of weights once.

use once_cell::sync::Lazy;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Options that identify one set of loaded weights.
pub trait ModelOptions {
    fn cache_key(&self) -> String;
}

type Slot = (TypeId, String);
type CacheStorage = HashMap<Slot, Arc<dyn Any + Send + Sync>>;

/// Loaded models keyed by model type and options key.
///
/// Models stored here keep their tensors behind an `Arc`, so a hit hands out a
/// clone that shares the weights.
#[derive(Default)]
pub struct ModelCache {
    models: Mutex<CacheStorage>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the model cached under `key`, running `loader` on a miss.
    ///
    /// The lock is held across the load so two builders racing for the same
    /// weights load them once. Failed loads are not cached.
    pub async fn get_or_create<M, F>(&self, key: &str, loader: F) -> anyhow::Result<M>
    where
        M: Clone + Send + Sync + 'static,
        F: FnOnce() -> anyhow::Result<M>,
    {
        let slot = (TypeId::of::<M>(), key.to_string());
        let mut models = self.models.lock().await;
        if let Some(model) = models.get(&slot).and_then(|m| m.downcast_ref::<M>()) {
            tracing::debug!(key, "model cache hit");
            return Ok(model.clone());
        }

        let model = loader()?;
        models.insert(slot, Arc::new(model.clone()));
        tracing::debug!(key, cached = models.len(), "model cached");
        Ok(model)
    }

    pub async fn clear(&self) {
        self.models.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.models.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.models.lock().await.is_empty()
    }
}

static GLOBAL_MODEL_CACHE: Lazy<ModelCache> = Lazy::new(ModelCache::new);

/// The process-wide cache used by every pipeline builder.
pub fn global_cache() -> &'static ModelCache {
    &GLOBAL_MODEL_CACHE
}
