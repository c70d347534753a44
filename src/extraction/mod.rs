//! Archive backends
//!
//! One backend per container format (RAR, 7z, ZIP). A backend opens the archive with a
//! candidate password and, if the archive accepts it, fully extracts it into a
//! destination directory. Backends report rejected passwords as
//! [`ExtractError::WrongPassword`](crate::error::ExtractError::WrongPassword), classified
//! from the codec crate's own error types.

mod rar;
mod sevenz;
mod shared;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use rar::RarBackend;
pub use sevenz::SevenZipBackend;
pub use shared::{detect_archive_type, is_archive};
pub use zip::ZipBackend;

use crate::error::Result;
use crate::types::ArchiveType;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Capability to open an archive with a password and extract all of it
///
/// Implementations are blocking; callers run them on the blocking thread pool. A call must
/// only write below `dest_path`, so concurrent calls with distinct destinations never
/// interfere. Output written before a failure may remain on disk.
pub trait ArchiveBackend: Send + Sync {
    /// Format handled by this backend
    fn archive_type(&self) -> ArchiveType;

    /// Extract `archive_path` into `dest_path` using `password` (empty = no password)
    ///
    /// Returns the extracted files on success.
    fn extract(&self, archive_path: &Path, password: &str, dest_path: &Path)
    -> Result<Vec<PathBuf>>;
}

/// Backends keyed by archive type
#[derive(Clone)]
pub struct BackendSet {
    backends: HashMap<ArchiveType, Arc<dyn ArchiveBackend>>,
}

impl BackendSet {
    /// An empty set; every trial against it is an unsupported format
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// The native backends for ZIP, RAR and 7z
    pub fn native() -> Self {
        Self::empty()
            .with(Arc::new(RarBackend))
            .with(Arc::new(SevenZipBackend))
            .with(Arc::new(ZipBackend))
    }

    /// Register (or replace) the backend for its archive type
    pub fn with(mut self, backend: Arc<dyn ArchiveBackend>) -> Self {
        self.backends.insert(backend.archive_type(), backend);
        self
    }

    /// Backend for `archive_type`, if registered
    pub fn get(&self, archive_type: ArchiveType) -> Option<Arc<dyn ArchiveBackend>> {
        self.backends.get(&archive_type).cloned()
    }
}

impl Default for BackendSet {
    fn default() -> Self {
        Self::native()
    }
}

impl std::fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.backends.keys().map(|t| t.name()).collect();
        types.sort_unstable();
        f.debug_struct("BackendSet").field("formats", &types).finish()
    }
}
