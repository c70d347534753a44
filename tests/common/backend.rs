//! Scripted in-memory archive backend

use archive_unlock::error::{Error, ExtractError, Result};
use archive_unlock::{ArchiveBackend, ArchiveType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Meeting point for blocking trials: `arrive` returns once `parties` callers arrived
#[derive(Debug)]
pub struct Rendezvous {
    parties: usize,
    arrived: Mutex<usize>,
    cvar: Condvar,
}

impl Rendezvous {
    pub fn new(parties: usize) -> Arc<Self> {
        Arc::new(Self {
            parties,
            arrived: Mutex::new(0),
            cvar: Condvar::new(),
        })
    }

    /// Arrive and wait (bounded) for the others; `true` if everyone made it
    pub fn arrive(&self, timeout: Duration) -> bool {
        let mut arrived = self.arrived.lock().unwrap();
        *arrived += 1;
        self.cvar.notify_all();
        let (arrived, _) = self
            .cvar
            .wait_timeout_while(arrived, timeout, |n| *n < self.parties)
            .unwrap();
        *arrived >= self.parties
    }
}

/// What one scripted archive contains
#[derive(Clone, Debug, Default)]
pub struct ScriptedArchive {
    /// Accepted password (empty = not encrypted)
    pub password: String,
    /// Files written on success, relative to the destination
    pub files: Vec<(PathBuf, Vec<u8>)>,
    /// Blocks each trial until the rendezvous completes
    pub rendezvous: Option<Arc<Rendezvous>>,
}

/// One recorded `extract` call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub archive: PathBuf,
    pub password: String,
    pub dest: PathBuf,
}

/// Backend that serves archives by file name from a script
///
/// Archives missing from the script fail as corrupt.
#[derive(Debug)]
pub struct ScriptedBackend {
    archive_type: ArchiveType,
    archives: HashMap<String, ScriptedArchive>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new(archive_type: ArchiveType) -> Self {
        Self {
            archive_type,
            archives: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add an archive `name` opened by `password` and containing `files`
    pub fn archive(mut self, name: &str, password: &str, files: &[(&str, &[u8])]) -> Self {
        self.archives.insert(
            name.to_string(),
            ScriptedArchive {
                password: password.to_string(),
                files: files
                    .iter()
                    .map(|(path, content)| (PathBuf::from(path), content.to_vec()))
                    .collect(),
                rendezvous: None,
            },
        );
        self
    }

    /// Make every trial of `name` wait on `rendezvous`
    pub fn gated(mut self, name: &str, rendezvous: Arc<Rendezvous>) -> Self {
        if let Some(archive) = self.archives.get_mut(name) {
            archive.rendezvous = Some(rendezvous);
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made for the archive with file name `name`
    pub fn calls_for(&self, name: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.archive.file_name().is_some_and(|n| n == name))
            .collect()
    }

    /// Successful trials of `name`
    pub fn successes_for(&self, name: &str) -> usize {
        let Some(archive) = self.archives.get(name) else {
            return 0;
        };
        self.calls_for(name)
            .iter()
            .filter(|c| c.password == archive.password)
            .count()
    }
}

impl ArchiveBackend for ScriptedBackend {
    fn archive_type(&self) -> ArchiveType {
        self.archive_type
    }

    fn extract(&self, archive_path: &Path, password: &str, dest_path: &Path) -> Result<Vec<PathBuf>> {
        self.calls.lock().unwrap().push(Call {
            archive: archive_path.to_path_buf(),
            password: password.to_string(),
            dest: dest_path.to_path_buf(),
        });

        let name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(archive) = self.archives.get(&name) else {
            return Err(failed(archive_path, "not a scripted archive"));
        };

        if let Some(rendezvous) = &archive.rendezvous
            && !rendezvous.arrive(Duration::from_secs(10))
        {
            return Err(failed(archive_path, "rendezvous timed out"));
        }

        if archive.password != password {
            return Err(Error::Extract(ExtractError::WrongPassword {
                archive: archive_path.to_path_buf(),
            }));
        }

        std::fs::create_dir_all(dest_path)?;
        let mut written = Vec::new();
        for (path, content) in &archive.files {
            let target = dest_path.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, content)?;
            written.push(target);
        }
        Ok(written)
    }
}

fn failed(archive: &Path, reason: &str) -> Error {
    Error::Extract(ExtractError::ExtractionFailed {
        archive: archive.to_path_buf(),
        reason: reason.to_string(),
    })
}
