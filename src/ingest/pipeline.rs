//! Drop-to-swap ingestion: collect, upload, hot-swap.
//!
//! DESIGN
//! ======
//! One run walks a fixed sequence and reports each step through the
//! [`StatusSink`]: `Processing`, then `ReadingMeshDirectory` and `Uploading`
//! when directories were dropped, then `UploadSucceeded` and `ModelLoaded`.
//! Any failure before the upload succeeds ends the run with exactly one
//! `Failed` status; a failed load after the upload ends it with
//! `ModelLoadFailed`. Every run ends on a terminal status. Only one run is in
//! flight at a time; a drop that arrives during a run is rejected with
//! [`IngestError::Busy`] and reports nothing to the sink, which belongs to
//! the run in flight.
//!
//! ERROR HANDLING
//! ==============
//! Collection and upload errors abort the run and are returned. A model load
//! failure after a successful upload is not an error: the backend already
//! has the files, and the previous model stays attached.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::collect::{collect_assets, find_description};
use super::entry::{CollectError, Entry};
use super::upload::{UploadBackend, UploadError};
use crate::model::loader::ModelSwapper;
use crate::status::{IngestStatus, StatusSink};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// No description file, or the description file could not be read.
    #[error(transparent)]
    Collect(#[from] CollectError),
    /// The upload request failed or was rejected.
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// Another run is still in flight.
    #[error("another upload is already in progress")]
    Busy,
}

/// Result of a run whose upload succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub run_id: Uuid,
    /// Model reference exactly as the backend returned it.
    pub model_url: String,
    pub mesh_files: usize,
    /// Whether the uploaded model was swapped in.
    pub loaded: bool,
}

pub struct Ingestor {
    uploader: Arc<dyn UploadBackend>,
    swapper: Arc<ModelSwapper>,
    status: Arc<dyn StatusSink>,
    description_suffix: String,
    busy: AtomicBool,
}

/// Clears the busy flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Ingestor {
    #[must_use]
    pub fn new(
        uploader: Arc<dyn UploadBackend>,
        swapper: Arc<ModelSwapper>,
        status: Arc<dyn StatusSink>,
        description_suffix: impl Into<String>,
    ) -> Self {
        Self {
            uploader,
            swapper,
            status,
            description_suffix: description_suffix.into(),
            busy: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Handle one dropped selection end to end.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Busy`] when another run is in flight, otherwise
    /// the collection or upload error that ended the run.
    pub async fn handle_drop(&self, entries: &[Arc<dyn Entry>]) -> Result<IngestOutcome, IngestError> {
        let Some(_guard) = RunGuard::acquire(&self.busy) else {
            warn!("drop rejected: upload already in progress");
            return Err(IngestError::Busy);
        };

        let run_id = Uuid::new_v4();
        let span = info_span!("ingest", %run_id, entries = entries.len());
        let result = self.run(run_id, entries).instrument(span).await;
        if let Err(e) = &result {
            warn!(%run_id, error = %e, "ingestion failed");
            self.report(&IngestStatus::Failed(e.to_string()));
        }
        result
    }

    async fn run(&self, run_id: Uuid, entries: &[Arc<dyn Entry>]) -> Result<IngestOutcome, IngestError> {
        self.report(&IngestStatus::Processing);

        let description = find_description(entries, &self.description_suffix).ok_or_else(|| {
            CollectError::MissingDescription { suffix: self.description_suffix.clone() }
        })?;

        let has_directories = entries.iter().any(|e| e.is_dir());
        if has_directories {
            self.report(&IngestStatus::ReadingMeshDirectory);
        }
        let bundle = collect_assets(description, entries).await?;
        if !bundle.skipped.is_empty() {
            warn!(skipped = ?bundle.skipped, "some dropped files could not be read");
        }
        if has_directories {
            self.report(&IngestStatus::Uploading { mesh_files: bundle.assets.len() });
        }

        let model_url = self.uploader.submit(&bundle).await?;
        info!(%model_url, mesh_files = bundle.assets.len(), "upload successful");
        self.report(&IngestStatus::UploadSucceeded);

        let loaded = match self.swapper.load(&model_url).await {
            Ok(_) => {
                self.report(&IngestStatus::ModelLoaded);
                true
            }
            Err(e) => {
                warn!(%model_url, error = %e, "uploaded model was not loaded");
                self.report(&IngestStatus::ModelLoadFailed(e.to_string()));
                false
            }
        };

        Ok(IngestOutcome { run_id, model_url, mesh_files: bundle.assets.len(), loaded })
    }

    fn report(&self, status: &IngestStatus) {
        self.status.ingest_progress(status);
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
