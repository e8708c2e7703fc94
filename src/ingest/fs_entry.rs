//! Filesystem-backed drop entries for the command-line binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::debug;

use super::entry::{CollectError, DirectoryReader, Entry};

fn read_error(path: &Path, e: &std::io::Error) -> CollectError {
    CollectError::Read { path: path.display().to_string(), message: e.to_string() }
}

pub struct FsEntry {
    path: PathBuf,
    name: String,
    is_dir: bool,
    page_size: usize,
}

impl FsEntry {
    /// Stat `path` and wrap it. Directory listings are read `page_size`
    /// entries at a time.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Read`] when `path` cannot be inspected.
    pub async fn from_path(path: impl Into<PathBuf>, page_size: usize) -> Result<Self, CollectError> {
        let path = path.into();
        let metadata = fs::metadata(&path).await.map_err(|e| read_error(&path, &e))?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self { path, name, is_dir: metadata.is_dir(), page_size: page_size.max(1) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Entry for FsEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }

    async fn read(&self) -> Result<Vec<u8>, CollectError> {
        if self.is_dir {
            return Err(CollectError::IsADirectory { path: self.path.display().to_string() });
        }
        fs::read(&self.path).await.map_err(|e| read_error(&self.path, &e))
    }

    fn open_dir(&self) -> Result<Box<dyn DirectoryReader>, CollectError> {
        if !self.is_dir {
            return Err(CollectError::NotADirectory { path: self.path.display().to_string() });
        }
        Ok(Box::new(FsDirReader {
            path: self.path.clone(),
            page_size: self.page_size,
            listing: None,
            done: false,
        }))
    }
}

struct FsDirReader {
    path: PathBuf,
    page_size: usize,
    listing: Option<fs::ReadDir>,
    done: bool,
}

#[async_trait::async_trait]
impl DirectoryReader for FsDirReader {
    async fn next_page(&mut self) -> Result<Vec<Arc<dyn Entry>>, CollectError> {
        if self.done {
            return Ok(Vec::new());
        }
        if self.listing.is_none() {
            self.listing = Some(fs::read_dir(&self.path).await.map_err(|e| read_error(&self.path, &e))?);
        }
        let Some(listing) = self.listing.as_mut() else {
            return Ok(Vec::new());
        };

        let mut page: Vec<Arc<dyn Entry>> = Vec::with_capacity(self.page_size);
        while page.len() < self.page_size {
            let Some(child) = listing.next_entry().await.map_err(|e| read_error(&self.path, &e))? else {
                self.done = true;
                break;
            };
            let path = child.path();
            let file_type = child.file_type().await.map_err(|e| read_error(&path, &e))?;
            let is_dir = if file_type.is_symlink() {
                // Linked directories are not followed; linked files are.
                match fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => false,
                    _ => {
                        debug!(path = %path.display(), "skipping symlink");
                        continue;
                    }
                }
            } else {
                file_type.is_dir()
            };
            page.push(Arc::new(FsEntry {
                name: child.file_name().to_string_lossy().into_owned(),
                path,
                is_dir,
                page_size: self.page_size,
            }));
        }
        Ok(page)
    }
}

#[cfg(test)]
#[path = "fs_entry_test.rs"]
mod tests;
