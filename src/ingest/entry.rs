//! Dropped-selection entries.
//!
//! A drop is a list of top-level [`Entry`] values, each a file or a
//! directory. Directories are listed through a [`DirectoryReader`] that hands
//! out children in bounded pages and signals the end of the listing with an
//! empty page.

use std::sync::Arc;

use crate::config::DEFAULT_DIR_PAGE_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// No top-level file ends with the description suffix.
    #[error("no robot description file (*{suffix}) found in the dropped files")]
    MissingDescription { suffix: String },
    /// File content or a directory listing could not be read.
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    /// A listing was requested for a file entry.
    #[error("{path} is not a directory")]
    NotADirectory { path: String },
    /// Content was requested for a directory entry.
    #[error("{path} is a directory")]
    IsADirectory { path: String },
}

#[async_trait::async_trait]
pub trait Entry: Send + Sync {
    /// Base name, without any parent path.
    fn name(&self) -> &str;

    fn is_dir(&self) -> bool;

    /// Resolve a file entry to its content.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::IsADirectory`] for directories and
    /// [`CollectError::Read`] when the content cannot be read.
    async fn read(&self) -> Result<Vec<u8>, CollectError>;

    /// Start listing a directory entry.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::NotADirectory`] for files.
    fn open_dir(&self) -> Result<Box<dyn DirectoryReader>, CollectError>;
}

#[async_trait::async_trait]
pub trait DirectoryReader: Send {
    /// Next batch of children. An empty batch means the listing is complete;
    /// a short non-empty batch does not.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Read`] when the listing fails.
    async fn next_page(&mut self) -> Result<Vec<Arc<dyn Entry>>, CollectError>;
}

enum MemoryKind {
    File(Vec<u8>),
    Dir { children: Vec<Arc<dyn Entry>>, page_size: usize },
}

/// Entry held entirely in memory. Embedders use it to hand over files that
/// came from somewhere other than the local filesystem.
pub struct MemoryEntry {
    name: String,
    kind: MemoryKind,
}

impl MemoryEntry {
    pub fn file(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), kind: MemoryKind::File(bytes.into()) }
    }

    pub fn dir(name: impl Into<String>, children: Vec<Arc<dyn Entry>>) -> Self {
        Self {
            name: name.into(),
            kind: MemoryKind::Dir { children, page_size: DEFAULT_DIR_PAGE_SIZE },
        }
    }

    /// Limit how many children one page of this directory returns.
    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        if let MemoryKind::Dir { page_size, .. } = &mut self.kind {
            *page_size = size.max(1);
        }
        self
    }

    #[must_use]
    pub fn shared(self) -> Arc<dyn Entry> {
        Arc::new(self)
    }
}

#[async_trait::async_trait]
impl Entry for MemoryEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_dir(&self) -> bool {
        matches!(self.kind, MemoryKind::Dir { .. })
    }

    async fn read(&self) -> Result<Vec<u8>, CollectError> {
        match &self.kind {
            MemoryKind::File(bytes) => Ok(bytes.clone()),
            MemoryKind::Dir { .. } => Err(CollectError::IsADirectory { path: self.name.clone() }),
        }
    }

    fn open_dir(&self) -> Result<Box<dyn DirectoryReader>, CollectError> {
        match &self.kind {
            MemoryKind::Dir { children, page_size } => Ok(Box::new(MemoryReader {
                children: children.clone(),
                offset: 0,
                page_size: *page_size,
            })),
            MemoryKind::File(_) => Err(CollectError::NotADirectory { path: self.name.clone() }),
        }
    }
}

struct MemoryReader {
    children: Vec<Arc<dyn Entry>>,
    offset: usize,
    page_size: usize,
}

#[async_trait::async_trait]
impl DirectoryReader for MemoryReader {
    async fn next_page(&mut self) -> Result<Vec<Arc<dyn Entry>>, CollectError> {
        let end = (self.offset + self.page_size).min(self.children.len());
        let page = self.children[self.offset..end].to_vec();
        self.offset = end;
        Ok(page)
    }
}

#[cfg(test)]
#[path = "entry_test.rs"]
mod tests;
