//! Model loading and hot-swap.
//!
//! DESIGN
//! ======
//! The description parser and mesh loader are external: a [`ModelLoader`]
//! turns a URL into an [`ArticulatedModel`]. `ModelSwapper` resolves the URL,
//! loads, and swaps the result into the [`ModelSlot`]. Every request gets a
//! sequence number; a load that finishes after a newer request was issued is
//! discarded instead of swapped, so overlapping loads never race.
//!
//! ERROR HANDLING
//! ==============
//! Load failures are logged here and returned to the caller, who treats them
//! as non-fatal: the previous model stays attached.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::slot::{ArticulatedModel, LoadedModel, ModelSlot};
use crate::config::resolve_against;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The description could not be fetched or turned into a model.
    #[error("failed to fetch robot description {url}: {message}")]
    Fetch { url: String, message: String },
    /// A newer load was requested while this one was in flight; its result
    /// was dropped.
    #[error("load of {url} superseded by a newer request")]
    Superseded { url: String },
}

/// Opaque model-loading capability.
#[async_trait::async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the description at `url` (already absolute) into a posable model.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] when fetching or parsing fails.
    async fn load(&self, url: &str) -> Result<Box<dyn ArticulatedModel>, LoadError>;
}

pub struct ModelSwapper {
    loader: Arc<dyn ModelLoader>,
    slot: ModelSlot,
    server_url: String,
    latest: AtomicU64,
}

impl ModelSwapper {
    #[must_use]
    pub fn new(loader: Arc<dyn ModelLoader>, slot: ModelSlot, server_url: impl Into<String>) -> Self {
        Self { loader, slot, server_url: server_url.into(), latest: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn slot(&self) -> &ModelSlot {
        &self.slot
    }

    /// Absolute form of a model reference returned by the backend.
    #[must_use]
    pub fn resolve(&self, model_url: &str) -> String {
        resolve_against(&self.server_url, model_url)
    }

    /// Load `model_url` and hot-swap it in. Returns the new model's id.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, or [`LoadError::Superseded`] when a newer
    /// load was requested while this one was in flight.
    pub async fn load(&self, model_url: &str) -> Result<u64, LoadError> {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let url = self.resolve(model_url);
        info!(id, %url, "loading robot model");

        let model = match self.loader.load(&url).await {
            Ok(model) => model,
            Err(e) => {
                warn!(id, %url, error = %e, "error loading robot model");
                return Err(e);
            }
        };

        let next = LoadedModel { id, url: url.clone(), model };
        match self.slot.swap_if(next, || self.latest.load(Ordering::SeqCst) == id) {
            Ok(previous) => {
                info!(id, ?previous, %url, "robot model loaded");
                Ok(id)
            }
            Err(_) => {
                warn!(id, %url, "discarding superseded robot model");
                Err(LoadError::Superseded { url })
            }
        }
    }

    /// Fire-and-forget variant of [`ModelSwapper::load`].
    pub fn spawn_load(self: &Arc<Self>, model_url: impl Into<String>) -> JoinHandle<Result<u64, LoadError>> {
        let swapper = Arc::clone(self);
        let model_url = model_url.into();
        tokio::spawn(async move { swapper.load(&model_url).await })
    }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
