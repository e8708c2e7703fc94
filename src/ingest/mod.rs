//! Dropped robot files: collection, upload, and hot-swap of the result.

pub mod collect;
pub mod entry;
pub mod fs_entry;
pub mod pipeline;
pub mod upload;

pub use collect::{AssetBundle, CollectedFile, collect_bundle, find_description};
pub use entry::{CollectError, DirectoryReader, Entry, MemoryEntry};
pub use fs_entry::FsEntry;
pub use pipeline::{IngestError, IngestOutcome, Ingestor};
pub use upload::{HttpUploader, UploadBackend, UploadError};
