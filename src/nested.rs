//! Nested archive walker
//!
//! After an archive is extracted its output tree is scanned for further archives. Each one
//! found is unpacked into a sibling `extracted_<stem>` directory by the discovery pipeline
//! (automatic stages first, then the operator prompt and brute force) and its output is
//! walked in turn before the task finishes. Sibling archives of one scan run concurrently.
//! Archives of one scan that share a stem (`x.zip`, `x.rar`) get `extracted_<stem>_<ext>`
//! instead, so no two of them write into the same directory.
//!
//! A [`ProcessedSet`] shared by the whole walk tree makes sure no path is unpacked twice,
//! even when an extraction re-creates a file some other task already handled.

use crate::extraction::is_archive;
use crate::pipeline::Shared;
use crate::types::{ArchiveTarget, DiscoveryOutcome, Event};
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Archive paths already handled by one walk, shared by all of its tasks
#[derive(Clone, Debug, Default)]
pub struct ProcessedSet {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ProcessedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as processed; `false` if it already was
    pub fn insert(&self, path: &Path) -> bool {
        let key = normalize(path);
        match self.paths.lock() {
            Ok(mut paths) => paths.insert(key),
            Err(poisoned) => poisoned.into_inner().insert(key),
        }
    }

    /// Whether `path` has been processed
    pub fn contains(&self, path: &Path) -> bool {
        let key = normalize(path);
        match self.paths.lock() {
            Ok(paths) => paths.contains(&key),
            Err(poisoned) => poisoned.into_inner().contains(&key),
        }
    }

    /// Number of processed paths
    pub fn len(&self) -> usize {
        match self.paths.lock() {
            Ok(paths) => paths.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Whether nothing has been processed yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Directory a nested archive is extracted into: `<archive dir>/<prefix><file stem>`
pub fn nested_output_dir(archive: &Path, prefix: &str) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = archive.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}{}", prefix, stem))
}

/// Output directories for one scan's `archives`, index for index, all distinct
///
/// An archive keeps [`nested_output_dir`] unless another archive maps to the same place.
/// Those get the extension appended, then a counter if even that is taken.
pub fn assign_output_dirs(archives: &[PathBuf], prefix: &str) -> Vec<PathBuf> {
    let defaults: Vec<PathBuf> = archives
        .iter()
        .map(|archive| nested_output_dir(archive, prefix))
        .collect();
    let mut counts: HashMap<&Path, usize> = HashMap::new();
    for dir in &defaults {
        *counts.entry(dir.as_path()).or_default() += 1;
    }

    let mut taken: HashSet<PathBuf> = defaults
        .iter()
        .filter(|dir| counts[dir.as_path()] == 1)
        .cloned()
        .collect();

    archives
        .iter()
        .zip(&defaults)
        .map(|(archive, default)| {
            if counts[default.as_path()] == 1 {
                return default.clone();
            }
            let ext = archive
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let base = format!("{}_{}", default.to_string_lossy(), ext);
            let mut dir = PathBuf::from(&base);
            let mut n = 2;
            while !taken.insert(dir.clone()) {
                dir = PathBuf::from(format!("{}_{}", base, n));
                n += 1;
            }
            dir
        })
        .collect()
}

/// Walk `root` at nesting `depth`, unpacking every archive not yet in `processed`
///
/// Resolves once every archive found below `root`, and everything nested inside those, has
/// been handled. Returns the number of archives this scan handled directly.
pub(crate) fn walk(
    shared: Arc<Shared>,
    root: PathBuf,
    depth: u32,
    processed: ProcessedSet,
) -> BoxFuture<'static, usize> {
    Box::pin(async move {
        let nested = &shared.config.nested;
        if depth > nested.max_depth {
            warn!(?root, depth, max_depth = nested.max_depth, "nested archive depth limit reached");
            shared.events.emit(Event::NestedDepthLimit {
                dir: root,
                max_depth: nested.max_depth,
            });
            return 0;
        }

        shared.events.emit(Event::NestedScanStarted {
            dir: root.clone(),
            depth,
        });

        let archives = match scan(&root, nested.follow_symlinks, &nested.archive_extensions).await {
            Ok(archives) => archives,
            Err(e) => {
                warn!(?root, error = %e, "nested archive scan failed");
                Vec::new()
            }
        };

        let output_dirs = assign_output_dirs(&archives, &nested.output_prefix);
        let mut tasks = JoinSet::new();
        for (archive, output_dir) in archives.into_iter().zip(output_dirs) {
            if !processed.insert(&archive) {
                debug!(?archive, "nested archive already processed, skipping");
                continue;
            }

            let target = ArchiveTarget::new(&archive, output_dir);
            if !shared.runner.supports(&target) {
                debug!(?archive, "no backend for nested archive, skipping");
                continue;
            }

            info!(?archive, depth, "found nested archive");
            shared.events.emit(Event::NestedArchiveFound {
                archive: archive.clone(),
            });
            tasks.spawn(unpack(
                Arc::clone(&shared),
                target,
                depth,
                processed.clone(),
            ));
        }

        let mut handled = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(()) => handled += 1,
                Err(e) => warn!(?root, error = %e, "nested archive task failed"),
            }
        }

        shared.events.emit(Event::NestedScanFinished {
            dir: root,
            archives: handled,
        });
        handled
    })
}

/// Unpack one nested archive, then walk its output
async fn unpack(shared: Arc<Shared>, target: ArchiveTarget, depth: u32, processed: ProcessedSet) {
    match shared.discover(&target, true).await {
        Ok(DiscoveryOutcome::Extracted { .. }) => {
            walk(shared, target.output_dir, depth + 1, processed).await;
        }
        Ok(DiscoveryOutcome::Exhausted) => {
            debug!(archive_path = ?target.path, "nested archive left locked");
        }
        Err(e) => {
            warn!(archive_path = ?target.path, error = %e, "nested archive discovery failed");
            shared.events.emit(Event::TrialFailed {
                archive: target.path,
                error: e.to_string(),
            });
        }
    }
}

/// Every archive below `root`, sorted
async fn scan(
    root: &Path,
    follow_symlinks: bool,
    extensions: &[String],
) -> crate::error::Result<Vec<PathBuf>> {
    let root = root.to_path_buf();
    let extensions = extensions.to_vec();

    let archives = tokio::task::spawn_blocking(move || {
        let mut archives = Vec::new();
        for entry in walkdir::WalkDir::new(&root).follow_links(follow_symlinks) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Includes symlink loops when following links
                    warn!(?root, error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && is_archive(entry.path(), &extensions) {
                archives.push(entry.into_path());
            }
        }
        archives.sort();
        archives
    })
    .await
    .map_err(|e| crate::error::Error::Other(format!("nested scan task failed: {}", e)))?;

    Ok(archives)
}
