//! Client core of a browser-style robot viewer.
//!
//! Two flows share one loaded-model handle:
//!
//! - sync: an auto-reconnecting WebSocket [`net::Channel`] feeds
//!   `joint_states` messages through the [`net::Dispatcher`] to the
//!   [`model::PoseApplier`];
//! - ingest: a dropped selection of files is collected, uploaded and the
//!   resulting model is hot-swapped in by [`ingest::Ingestor`].
//!
//! Rendering and description parsing stay outside this crate behind the
//! [`model::Scene`] and [`model::ModelLoader`] traits.

pub mod config;
pub mod ingest;
pub mod model;
pub mod net;
pub mod status;
