//! Multipart submission of a collected bundle.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use super::collect::{AssetBundle, CollectedFile};

/// Multipart field carrying the description file.
pub const DESCRIPTION_FIELD: &str = "file";
/// Repeated multipart field carrying each asset file.
pub const ASSET_FIELD: &str = "mesh_files";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The request never got a response.
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx response; `body` is the server's text, verbatim.
    #[error("upload rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    /// A 2xx response without a usable `model_url`.
    #[error("invalid upload response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    model_url: String,
}

/// Anything that can take a bundle and return the stored model's location.
#[async_trait::async_trait]
pub trait UploadBackend: Send + Sync {
    /// Upload `bundle` and return the model URL reported by the backend.
    ///
    /// # Errors
    ///
    /// Returns an [`UploadError`] on transport failure, a rejected request or
    /// an unusable response body.
    async fn submit(&self, bundle: &AssetBundle) -> Result<String, UploadError>;
}

#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn part(file: &CollectedFile) -> Part {
    Part::bytes(file.bytes.clone()).file_name(file.relative_path.clone())
}

/// Build the multipart body. File names carry relative paths, so they are
/// sent as-is rather than percent-encoded.
fn build_form(bundle: &AssetBundle) -> Form {
    bundle
        .assets
        .iter()
        .fold(Form::new().percent_encode_noop().part(DESCRIPTION_FIELD, part(&bundle.description)), |form, asset| {
            form.part(ASSET_FIELD, part(asset))
        })
}

#[async_trait::async_trait]
impl UploadBackend for HttpUploader {
    async fn submit(&self, bundle: &AssetBundle) -> Result<String, UploadError> {
        info!(
            endpoint = %self.endpoint,
            description = %bundle.description.relative_path,
            mesh_files = bundle.assets.len(),
            "uploading robot files"
        );
        let response = self.client.post(&self.endpoint).multipart(build_form(bundle)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected { status: status.as_u16(), body });
        }

        let body = response.text().await?;
        let parsed: UploadResponse =
            serde_json::from_str(&body).map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        debug!(model_url = %parsed.model_url, "upload accepted");
        Ok(parsed.model_url)
    }
}

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;
