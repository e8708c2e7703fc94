//! Applies `joint_states` messages to the loaded model.

use messages::{JOINT_STATES, JointStates};
use tracing::{debug, trace};

use super::slot::ModelSlot;
use crate::net::dispatch::Dispatcher;

/// Outcome of applying one joint-state update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoseReport {
    pub applied: usize,
    /// Joint names the model does not have; skipped individually.
    pub unknown: Vec<String>,
}

#[derive(Clone)]
pub struct PoseApplier {
    slot: ModelSlot,
}

impl PoseApplier {
    #[must_use]
    pub fn new(slot: ModelSlot) -> Self {
        Self { slot }
    }

    /// Write every position onto the current model.
    ///
    /// Returns `None` when no model is loaded. Unknown joints are skipped
    /// without affecting the rest of the update.
    pub fn apply(&self, states: &JointStates) -> Option<PoseReport> {
        self.slot.with_model_mut(|loaded| {
            let mut report = PoseReport::default();
            for (joint, position) in &states.joint_positions {
                if loaded.model.set_joint_value(joint, *position) {
                    report.applied += 1;
                } else {
                    report.unknown.push(joint.clone());
                }
            }
            report
        })
    }

    /// Subscribe to `joint_states` on the dispatcher.
    pub fn register(&self, dispatcher: &Dispatcher) {
        let applier = self.clone();
        dispatcher.on(JOINT_STATES, move |message| {
            let states = JointStates::from_message(message)?;
            match applier.apply(&states) {
                Some(report) if !report.unknown.is_empty() => {
                    debug!(applied = report.applied, unknown = ?report.unknown, "joint update skipped unknown joints");
                }
                Some(report) => trace!(applied = report.applied, "joint update applied"),
                None => trace!("joint update ignored: no model loaded"),
            }
            Ok(())
        });
    }
}

#[cfg(test)]
#[path = "pose_test.rs"]
mod tests;
