//! The displayed robot model: shared handle, pose application, hot-swap.

pub mod headless;
pub mod loader;
pub mod pose;
pub mod slot;

pub use headless::{HeadlessModel, HttpProbeLoader, LoggingScene};
pub use loader::{LoadError, ModelLoader, ModelSwapper};
pub use pose::{PoseApplier, PoseReport};
pub use slot::{ArticulatedModel, LoadedModel, ModelSlot, Scene};
