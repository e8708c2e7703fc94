//! Headless stand-ins for the rendering collaborators.
//!
//! The binary has no scene graph or description parser; these keep the
//! joint values in memory and log scene changes so the sync and ingest flows
//! can run end to end from a terminal.

use std::collections::BTreeMap;

use tracing::info;

use super::loader::{LoadError, ModelLoader};
use super::slot::{ArticulatedModel, LoadedModel, Scene};

/// In-memory joint table.
#[derive(Debug, Clone, Default)]
pub struct HeadlessModel {
    joints: BTreeMap<String, f64>,
    /// When `false`, any joint name is accepted and added on first write.
    closed: bool,
}

impl HeadlessModel {
    /// A model that accepts any joint name.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// A model with a fixed joint set, all starting at zero.
    #[must_use]
    pub fn with_joints<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            joints: names.into_iter().map(|n| (n.into(), 0.0)).collect(),
            closed: true,
        }
    }
}

impl ArticulatedModel for HeadlessModel {
    fn set_joint_value(&mut self, joint: &str, value: f64) -> bool {
        if let Some(slot) = self.joints.get_mut(joint) {
            *slot = value;
            return true;
        }
        if self.closed {
            return false;
        }
        self.joints.insert(joint.to_owned(), value);
        true
    }

    fn joint_value(&self, joint: &str) -> Option<f64> {
        self.joints.get(joint).copied()
    }

    fn joint_names(&self) -> Vec<String> {
        self.joints.keys().cloned().collect()
    }
}

/// Scene that only logs attach/detach.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingScene;

impl Scene for LoggingScene {
    fn attach(&self, model: &LoadedModel) {
        info!(id = model.id, url = %model.url, "robot model attached");
    }

    fn detach(&self, model: &LoadedModel) {
        info!(id = model.id, url = %model.url, "robot model detached");
    }
}

/// Loader that checks the description is reachable over HTTP and yields an
/// open [`HeadlessModel`].
#[derive(Debug, Clone, Default)]
pub struct HttpProbeLoader {
    client: reqwest::Client,
}

impl HttpProbeLoader {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ModelLoader for HttpProbeLoader {
    async fn load(&self, url: &str) -> Result<Box<dyn ArticulatedModel>, LoadError> {
        let response = self.client.get(url).send().await.map_err(|e| LoadError::Fetch {
            url: url.to_owned(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Fetch { url: url.to_owned(), message: format!("HTTP {}", status.as_u16()) });
        }
        let body = response.bytes().await.map_err(|e| LoadError::Fetch {
            url: url.to_owned(),
            message: e.to_string(),
        })?;
        info!(url, bytes = body.len(), "robot description fetched");
        Ok(Box::new(HeadlessModel::open()))
    }
}

#[cfg(test)]
#[path = "headless_test.rs"]
mod tests;
