//! The single loaded-model handle shared by the pose and ingest flows.
//!
//! DESIGN
//! ======
//! One `RwLock<Option<LoadedModel>>`. Hot-swap detaches the old model from
//! the scene and attaches the new one while holding the write lock, so a
//! reader (render loop, pose applier) sees either the old model attached or
//! the new one attached, never both and never a detached model still in the
//! slot. [`Scene`] callbacks run under that lock and must not re-enter the
//! slot.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A posable articulated model produced by a [`ModelLoader`](super::loader::ModelLoader).
pub trait ArticulatedModel: Send + Sync {
    /// Set a joint's position. Returns `false` when the model has no joint
    /// by that name.
    fn set_joint_value(&mut self, joint: &str, value: f64) -> bool;

    fn joint_value(&self, joint: &str) -> Option<f64>;

    fn joint_names(&self) -> Vec<String>;
}

/// The visualization's scene graph, as far as hot-swap is concerned.
pub trait Scene: Send + Sync {
    fn attach(&self, model: &LoadedModel);

    fn detach(&self, model: &LoadedModel);
}

pub struct LoadedModel {
    /// Load request sequence number that produced this model.
    pub id: u64,
    /// Absolute URL the model was loaded from.
    pub url: String,
    pub model: Box<dyn ArticulatedModel>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("id", &self.id)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ModelSlot {
    current: Arc<RwLock<Option<LoadedModel>>>,
    scene: Arc<dyn Scene>,
}

impl ModelSlot {
    #[must_use]
    pub fn new(scene: Arc<dyn Scene>) -> Self {
        Self { current: Arc::new(RwLock::new(None)), scene }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<LoadedModel>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<LoadedModel>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.read().is_some()
    }

    #[must_use]
    pub fn current_url(&self) -> Option<String> {
        self.read().as_ref().map(|m| m.url.clone())
    }

    /// Read access to the attached model, if any.
    pub fn with_model<R>(&self, f: impl FnOnce(&LoadedModel) -> R) -> Option<R> {
        self.read().as_ref().map(f)
    }

    /// Mutable access to the attached model, if any.
    pub fn with_model_mut<R>(&self, f: impl FnOnce(&mut LoadedModel) -> R) -> Option<R> {
        self.write().as_mut().map(f)
    }

    /// Replace the attached model: detach the old one, attach `next`.
    ///
    /// Returns the id of the model that was replaced.
    pub fn swap(&self, next: LoadedModel) -> Option<u64> {
        let mut current = self.write();
        self.replace(&mut current, next)
    }

    /// Like [`ModelSlot::swap`], but only when `accept` holds at swap time.
    /// `accept` is evaluated under the write lock.
    ///
    /// # Errors
    ///
    /// Hands `next` back untouched when `accept` returns `false`.
    pub fn swap_if(&self, next: LoadedModel, accept: impl FnOnce() -> bool) -> Result<Option<u64>, LoadedModel> {
        let mut current = self.write();
        if !accept() {
            return Err(next);
        }
        Ok(self.replace(&mut current, next))
    }

    fn replace(&self, current: &mut Option<LoadedModel>, next: LoadedModel) -> Option<u64> {
        let previous = current.take().map(|old| {
            self.scene.detach(&old);
            old.id
        });
        self.scene.attach(&next);
        *current = Some(next);
        previous
    }

    /// Detach and drop the attached model.
    pub fn clear(&self) -> Option<u64> {
        let mut current = self.write();
        current.take().map(|old| {
            self.scene.detach(&old);
            old.id
        })
    }
}

#[cfg(test)]
#[path = "slot_test.rs"]
mod tests;
