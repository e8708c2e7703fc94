//! User-visible status reporting.
//!
//! DESIGN
//! ======
//! Connection and ingestion progress are presentation concerns: the core
//! pushes typed status values into an injected [`StatusSink`] and never
//! touches a display directly. The binary wires [`TracingStatus`]; tests
//! substitute a recording sink.

use std::fmt;

/// Connection state as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// The transport is gone; `reconnecting` tells whether a retry is pending.
    Disconnected { reconnecting: bool },
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("Connecting..."),
            Self::Connected => f.write_str("Connected"),
            Self::Disconnected { reconnecting: true } => f.write_str("Disconnected - Reconnecting..."),
            Self::Disconnected { reconnecting: false } => f.write_str("Disconnected"),
        }
    }
}

/// Progress of one drop-to-swap ingestion run.
///
/// Runs move forward through these states and always end on a terminal one:
/// [`IngestStatus::ModelLoaded`], [`IngestStatus::ModelLoadFailed`] or a
/// single [`IngestStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    /// The drop was accepted and is being inspected.
    Processing,
    /// Dropped directories are being walked for asset files.
    ReadingMeshDirectory,
    /// Collection finished; the bundle is on its way to the backend.
    Uploading { mesh_files: usize },
    /// The backend stored the files; the model load has started.
    UploadSucceeded,
    /// The uploaded model is attached to the scene.
    ModelLoaded,
    /// The upload succeeded but the model could not be loaded. The previous
    /// model stays attached.
    ModelLoadFailed(String),
    /// The run was aborted before the upload succeeded.
    Failed(String),
}

impl IngestStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ModelLoaded | Self::ModelLoadFailed(_) | Self::Failed(_))
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => f.write_str("Processing files..."),
            Self::ReadingMeshDirectory => f.write_str("Reading mesh directory..."),
            Self::Uploading { mesh_files } => write!(f, "Found {mesh_files} mesh files. Uploading..."),
            Self::UploadSucceeded => f.write_str("Upload successful! Loading robot model..."),
            Self::ModelLoaded => f.write_str("Robot model loaded successfully!"),
            Self::ModelLoadFailed(reason) => {
                write!(f, "Upload successful, but the robot model could not be loaded: {reason}")
            }
            Self::Failed(reason) => write!(f, "Error: {reason}"),
        }
    }
}

/// Receiver for status side effects.
pub trait StatusSink: Send + Sync {
    fn connection_changed(&self, _status: ConnectionStatus) {}

    fn ingest_progress(&self, _status: &IngestStatus) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStatus;

impl StatusSink for NoStatus {}

/// Sink that reports status through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn connection_changed(&self, status: ConnectionStatus) {
        tracing::info!(status = %status, "websocket status");
    }

    fn ingest_progress(&self, status: &IngestStatus) {
        match status {
            IngestStatus::Failed(_) | IngestStatus::ModelLoadFailed(_) => tracing::warn!(status = %status, "upload status"),
            _ => tracing::info!(status = %status, "upload status"),
        }
    }
}

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
