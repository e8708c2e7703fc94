//! Asset collection from a dropped selection.
//!
//! DESIGN
//! ======
//! The description file is picked from the top-level entries before any
//! traversal. Every top-level directory is then walked: each page of
//! children is requested until an empty page comes back, and every child
//! gets its own task (file read or nested walk). A directory's walk only
//! completes after all of its child tasks have, so collection as a whole
//! waits for every traversal, including ones spawned from late pages.
//!
//! ERROR HANDLING
//! ==============
//! A missing description file fails the collection up front. A failure in
//! one branch (unreadable file, broken listing) is logged and recorded in
//! `AssetBundle::skipped`; sibling branches keep going.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use tracing::{debug, warn};

use super::entry::{CollectError, Entry};

/// A file with its path relative to the root of the dropped selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    pub relative_path: String,
    pub bytes: Vec<u8>,
}

/// Everything one upload carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    pub description: CollectedFile,
    /// Asset files, sorted by relative path.
    pub assets: Vec<CollectedFile>,
    /// Relative paths that could not be read.
    pub skipped: Vec<String>,
}

/// First top-level file whose name ends with `suffix`.
#[must_use]
pub fn find_description<'a>(entries: &'a [Arc<dyn Entry>], suffix: &str) -> Option<&'a Arc<dyn Entry>> {
    entries.iter().find(|e| !e.is_dir() && e.name().ends_with(suffix))
}

/// Pick the description file and collect assets from all top-level
/// directories.
///
/// # Errors
///
/// Returns [`CollectError::MissingDescription`] (without traversing anything)
/// when no top-level file ends with `suffix`, or the read error of the
/// description file itself.
pub async fn collect_bundle(entries: &[Arc<dyn Entry>], suffix: &str) -> Result<AssetBundle, CollectError> {
    let description = find_description(entries, suffix)
        .ok_or_else(|| CollectError::MissingDescription { suffix: suffix.to_owned() })?;
    collect_assets(description, entries).await
}

/// Read `description` and walk every directory in `entries`.
///
/// # Errors
///
/// Returns the read error of the description file. Asset failures are not
/// errors; see [`AssetBundle::skipped`].
pub async fn collect_assets(
    description: &Arc<dyn Entry>,
    entries: &[Arc<dyn Entry>],
) -> Result<AssetBundle, CollectError> {
    let description = CollectedFile {
        relative_path: description.name().to_owned(),
        bytes: description.read().await?,
    };

    let walks = entries
        .iter()
        .filter(|e| e.is_dir())
        .map(|dir| walk_dir(Arc::clone(dir), format!("{}/", dir.name())));

    let mut found = Walk::default();
    for walk in join_all(walks).await {
        found.merge(walk);
    }

    debug!(assets = found.files.len(), skipped = found.skipped.len(), "asset collection complete");
    Ok(AssetBundle {
        description,
        assets: found.files.into_values().collect(),
        skipped: found.skipped,
    })
}

#[derive(Default)]
struct Walk {
    files: BTreeMap<String, CollectedFile>,
    skipped: Vec<String>,
}

impl Walk {
    fn merge(&mut self, other: Walk) {
        for (path, file) in other.files {
            if self.files.contains_key(&path) {
                debug!(%path, "duplicate asset path ignored");
                continue;
            }
            self.files.insert(path, file);
        }
        self.skipped.extend(other.skipped);
    }
}

fn walk_dir(dir: Arc<dyn Entry>, prefix: String) -> BoxFuture<'static, Walk> {
    async move {
        let mut walk = Walk::default();
        let mut reader = match dir.open_dir() {
            Ok(reader) => reader,
            Err(e) => {
                warn!(path = %prefix, error = %e, "cannot list directory");
                walk.skipped.push(prefix);
                return walk;
            }
        };

        let mut children = Vec::new();
        loop {
            let page = match reader.next_page().await {
                Ok(page) => page,
                Err(e) => {
                    warn!(path = %prefix, error = %e, "directory listing failed");
                    walk.skipped.push(prefix.clone());
                    break;
                }
            };
            if page.is_empty() {
                break;
            }
            for child in page {
                let path = format!("{prefix}{}", child.name());
                let task = if child.is_dir() {
                    tokio::spawn(walk_dir(child, format!("{path}/")))
                } else {
                    tokio::spawn(read_file(child, path))
                };
                children.push(task);
            }
        }

        for result in join_all(children).await {
            match result {
                Ok(child) => walk.merge(child),
                Err(e) => warn!(path = %prefix, error = %e, "asset traversal task failed"),
            }
        }
        walk
    }
    .boxed()
}

fn read_file(file: Arc<dyn Entry>, path: String) -> BoxFuture<'static, Walk> {
    async move {
        let mut walk = Walk::default();
        match file.read().await {
            Ok(bytes) => {
                walk.files.insert(path.clone(), CollectedFile { relative_path: path, bytes });
            }
            Err(e) => {
                warn!(%path, error = %e, "cannot read asset file");
                walk.skipped.push(path);
            }
        }
        walk
    }
    .boxed()
}

#[cfg(test)]
#[path = "collect_test.rs"]
mod tests;
