//! Single password trials
//!
//! [`TrialRunner::try_password`] dispatches on the archive extension, runs the backend on
//! the blocking pool and folds the backend's structured error into a [`TrialOutcome`].

use crate::error::{Error, ExtractError};
use crate::extraction::{BackendSet, detect_archive_type};
use crate::types::{ArchiveTarget, TrialOutcome};
use tokio::task::spawn_blocking;
use tracing::{debug, trace};

/// Reason reported for archives no backend can open
pub const UNSUPPORTED_FORMAT: &str = "unsupported format";

/// Runs one extraction attempt per call
#[derive(Clone, Debug, Default)]
pub struct TrialRunner {
    backends: BackendSet,
}

impl TrialRunner {
    /// Create a runner over the given backends
    pub fn new(backends: BackendSet) -> Self {
        Self { backends }
    }

    /// Whether some backend handles this archive
    pub fn supports(&self, target: &ArchiveTarget) -> bool {
        detect_archive_type(&target.path)
            .and_then(|t| self.backends.get(t))
            .is_some()
    }

    /// Try to fully extract `target` with `candidate` (empty = no password)
    ///
    /// Blocks only a pool thread, never the caller's task. Errors never escape: a rejected
    /// password is `WrongPassword`, anything else is `Fatal`.
    pub async fn try_password(&self, target: &ArchiveTarget, candidate: &str) -> TrialOutcome {
        let Some(backend) = detect_archive_type(&target.path).and_then(|t| self.backends.get(t))
        else {
            debug!(archive_path = ?target.path, "no backend for archive");
            return TrialOutcome::Fatal(UNSUPPORTED_FORMAT.to_string());
        };

        trace!(
            archive_path = ?target.path,
            password_length = candidate.len(),
            "trying password"
        );

        let archive_path = target.path.clone();
        let dest_path = target.output_dir.clone();
        let password = candidate.to_string();

        let result = spawn_blocking(move || backend.extract(&archive_path, &password, &dest_path))
            .await
            .map_err(|e| {
                Error::Extract(ExtractError::TaskFailed {
                    archive: target.path.clone(),
                    reason: e.to_string(),
                })
            })
            .and_then(|r| r);

        match result {
            Ok(files) => TrialOutcome::Success { files },
            Err(e) if e.is_wrong_password() => TrialOutcome::WrongPassword,
            Err(e) => {
                debug!(archive_path = ?target.path, error = %e, "trial failed");
                TrialOutcome::Fatal(e.to_string())
            }
        }
    }
}
