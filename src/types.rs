//! Core types and events

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Archive type detected by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// RAR archive (.rar)
    Rar,
    /// 7-Zip archive (.7z)
    SevenZip,
    /// ZIP archive (.zip)
    Zip,
}

impl ArchiveType {
    /// Human-readable format name used in logs
    pub fn name(self) -> &'static str {
        match self {
            ArchiveType::Rar => "RAR",
            ArchiveType::SevenZip => "7z",
            ArchiveType::Zip => "ZIP",
        }
    }
}

/// One archive to discover a password for, and where its contents go
///
/// Immutable once a discovery attempt begins. Concurrent attempts each own their target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveTarget {
    /// Path to the archive file
    pub path: PathBuf,
    /// Directory the archive is extracted into
    pub output_dir: PathBuf,
}

impl ArchiveTarget {
    /// Create a target for `path`, extracting into `output_dir`
    pub fn new(path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Same archive, different destination (used for private brute-force scratch dirs)
    pub fn with_output_dir(&self, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: self.path.clone(),
            output_dir: output_dir.into(),
        }
    }

    /// File name of the archive, for log lines
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Result of a single password trial
///
/// `WrongPassword` never stops a caller from trying its remaining candidates;
/// `Fatal` means the archive could not be processed for a reason other than the password.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrialOutcome {
    /// The archive was fully extracted with this candidate
    Success {
        /// Files written to the output directory
        files: Vec<PathBuf>,
    },
    /// The archive rejected the candidate
    WrongPassword,
    /// Hard failure unrelated to the password (unsupported format, corruption, I/O)
    Fatal(String),
}

impl TrialOutcome {
    /// Whether the trial extracted the archive
    pub fn is_success(&self) -> bool {
        matches!(self, TrialOutcome::Success { .. })
    }
}

/// Discovery stage of the pipeline state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Trial with the empty password
    NoPassword,
    /// Candidates from the persisted password list
    PasswordList,
    /// Operator-supplied password
    Manual,
    /// Exhaustive charset search
    BruteForce,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::NoPassword => "no password",
            Stage::PasswordList => "password list",
            Stage::Manual => "manual password",
            Stage::BruteForce => "brute force",
        };
        f.write_str(name)
    }
}

/// Terminal state of one discovery attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// The archive was extracted
    Extracted {
        /// The password that opened the archive (empty for unencrypted archives)
        password: String,
        /// Which stage found it
        stage: Stage,
        /// Files written to the output directory
        files: Vec<PathBuf>,
    },
    /// Every stage ran and no candidate opened the archive
    Exhausted,
}

impl DiscoveryOutcome {
    /// The discovered password, if any
    pub fn password(&self) -> Option<&str> {
        match self {
            DiscoveryOutcome::Extracted { password, .. } => Some(password),
            DiscoveryOutcome::Exhausted => None,
        }
    }
}

/// Event emitted while discovering passwords and unpacking archives
///
/// Every event renders to a human-readable status line through `Display`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Discovery started for a top-level archive
    DiscoveryStarted {
        /// Archive path
        archive: PathBuf,
        /// Output directory
        output_dir: PathBuf,
    },

    /// A pipeline stage started
    StageStarted {
        /// Archive path
        archive: PathBuf,
        /// Stage that started
        stage: Stage,
    },

    /// A candidate was rejected by the archive
    WrongPassword {
        /// Archive path
        archive: PathBuf,
    },

    /// A trial failed for a reason other than the password
    TrialFailed {
        /// Archive path
        archive: PathBuf,
        /// Failure reason
        error: String,
    },

    /// The password list was read
    PasswordListLoaded {
        /// List path
        path: PathBuf,
        /// Number of candidates read
        count: usize,
    },

    /// One list candidate is about to be tried
    PasswordListAttempt {
        /// Archive path
        archive: PathBuf,
        /// 1-based position in the list
        attempt: usize,
        /// List length
        total: usize,
    },

    /// The password list could not be used (missing, unreadable)
    PasswordListUnavailable {
        /// Why the list was skipped
        reason: String,
    },

    /// Every candidate from the list failed
    PasswordListExhausted {
        /// Archive path
        archive: PathBuf,
        /// Number of candidates tried
        count: usize,
    },

    /// A discovered password was appended to the list
    PasswordSaved {
        /// List path
        path: PathBuf,
        /// The saved password
        password: String,
    },

    /// Appending a discovered password failed
    PasswordSaveFailed {
        /// Failure reason
        error: String,
    },

    /// The operator is asked for a password
    ManualPasswordRequired {
        /// Archive path
        archive: PathBuf,
    },

    /// The operator cancelled the password prompt
    ManualPasswordCancelled {
        /// Archive path
        archive: PathBuf,
    },

    /// Brute force moved on to a new charset tier
    BruteForceTier {
        /// Archive path
        archive: PathBuf,
        /// Tier description
        tier: String,
        /// Alphabet size of the tier
        alphabet_len: usize,
    },

    /// Brute force finished
    BruteForceFinished {
        /// Archive path
        archive: PathBuf,
        /// Number of candidates tested
        tested: u64,
        /// Wall-clock duration in seconds
        elapsed_secs: f64,
        /// Whether a password was found
        found: bool,
    },

    /// A stage found the password
    PasswordFound {
        /// Archive path
        archive: PathBuf,
        /// Stage that found it
        stage: Stage,
        /// The password
        password: String,
    },

    /// The archive was extracted
    Extracted {
        /// Archive path
        archive: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Number of files written
        files: usize,
    },

    /// No stage could open the archive
    Exhausted {
        /// Archive path
        archive: PathBuf,
    },

    /// A nested archive scan started
    NestedScanStarted {
        /// Directory being scanned
        dir: PathBuf,
        /// Nesting depth of this scan (0 = top-level output)
        depth: u32,
    },

    /// A nested archive was found
    NestedArchiveFound {
        /// Nested archive path
        archive: PathBuf,
    },

    /// A nested archive could not be opened automatically
    NestedNeedsManual {
        /// Nested archive path
        archive: PathBuf,
    },

    /// Nested scanning stopped at the configured depth bound
    NestedDepthLimit {
        /// Directory that was not scanned
        dir: PathBuf,
        /// Configured maximum depth
        max_depth: u32,
    },

    /// A nested archive scan and all of its descendants finished
    NestedScanFinished {
        /// Directory that was scanned
        dir: PathBuf,
        /// Number of archives handled by this scan
        archives: usize,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::DiscoveryStarted {
                archive,
                output_dir,
            } => write!(
                f,
                "starting extraction of {} into {}",
                archive.display(),
                output_dir.display()
            ),
            Event::StageStarted { archive, stage } => {
                write!(f, "{}: trying {}", display_name(archive), stage)
            }
            Event::WrongPassword { archive } => {
                write!(f, "{}: wrong password", display_name(archive))
            }
            Event::TrialFailed { archive, error } => {
                write!(f, "{}: extraction failed: {}", display_name(archive), error)
            }
            Event::PasswordListLoaded { path, count } => write!(
                f,
                "loaded {} password(s) from {}",
                count,
                path.display()
            ),
            Event::PasswordListAttempt {
                archive,
                attempt,
                total,
            } => write!(
                f,
                "{}: trying password {}/{}",
                display_name(archive),
                attempt,
                total
            ),
            Event::PasswordListUnavailable { reason } => {
                write!(f, "password list unavailable: {}", reason)
            }
            Event::PasswordListExhausted { archive, count } => write!(
                f,
                "{}: all {} listed password(s) failed",
                display_name(archive),
                count
            ),
            Event::PasswordSaved { path, password } => {
                write!(f, "saved password [{}] to {}", password, path.display())
            }
            Event::PasswordSaveFailed { error } => {
                write!(f, "failed to save password: {}", error)
            }
            Event::ManualPasswordRequired { archive } => {
                write!(f, "{}: waiting for a password", display_name(archive))
            }
            Event::ManualPasswordCancelled { archive } => write!(
                f,
                "{}: password prompt cancelled, starting brute force",
                display_name(archive)
            ),
            Event::BruteForceTier {
                archive,
                tier,
                alphabet_len,
            } => write!(
                f,
                "{}: brute force over {} ({} characters)",
                display_name(archive),
                tier,
                alphabet_len
            ),
            Event::BruteForceFinished {
                archive,
                tested,
                elapsed_secs,
                found,
            } => {
                let speed = if *elapsed_secs > 0.0 {
                    *tested as f64 / elapsed_secs
                } else {
                    0.0
                };
                write!(
                    f,
                    "{}: brute force {} after {} candidate(s) in {:.2}s ({:.0}/s)",
                    display_name(archive),
                    if *found { "succeeded" } else { "failed" },
                    tested,
                    elapsed_secs,
                    speed
                )
            }
            Event::PasswordFound {
                archive,
                stage,
                password,
            } => write!(
                f,
                "{}: password found via {}: {}",
                display_name(archive),
                stage,
                password
            ),
            Event::Extracted {
                archive,
                output_dir,
                files,
            } => write!(
                f,
                "{}: extracted {} file(s) into {}",
                display_name(archive),
                files,
                output_dir.display()
            ),
            Event::Exhausted { archive } => {
                write!(f, "{}: could not determine password", display_name(archive))
            }
            Event::NestedScanStarted { dir, depth } => write!(
                f,
                "scanning {} for nested archives (depth {})",
                dir.display(),
                depth
            ),
            Event::NestedArchiveFound { archive } => {
                write!(f, "found nested archive {}", display_name(archive))
            }
            Event::NestedNeedsManual { archive } => write!(
                f,
                "{}: could not be extracted automatically, needs a password",
                display_name(archive)
            ),
            Event::NestedDepthLimit { dir, max_depth } => write!(
                f,
                "not scanning {}: nesting deeper than {}",
                dir.display(),
                max_depth
            ),
            Event::NestedScanFinished { dir, archives } => write!(
                f,
                "finished {} nested archive(s) under {}",
                archives,
                dir.display()
            ),
        }
    }
}
