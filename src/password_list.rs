//! Persisted password list
//!
//! A plain text file, one password per line, tried in file order. Files written by older
//! tools are usually in a legacy encoding (GBK by default), so text is decoded with that
//! encoding first and falls back to lossy UTF-8.
//!
//! Discovered passwords are appended to the list. When no list is configured the first
//! append creates one at the default location, which becomes the active list from then on.

use crate::config::PasswordListConfig;
use crate::error::{Error, PasswordListError};
use encoding_rs::Encoding;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Candidates read from a password list, in file order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordList {
    path: PathBuf,
    passwords: Vec<String>,
}

impl PasswordList {
    /// File the candidates were read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get an iterator over passwords
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.passwords.iter()
    }

    /// Check if there are any passwords to try
    pub fn is_empty(&self) -> bool {
        self.passwords.is_empty()
    }

    /// Get the number of passwords
    pub fn len(&self) -> usize {
        self.passwords.len()
    }

    /// Whether `candidate` is already listed
    pub fn contains(&self, candidate: &str) -> bool {
        self.passwords.iter().any(|p| p == candidate)
    }
}

/// Decode list bytes: legacy encoding first, lossy UTF-8 when that fails
pub fn decode<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return String::from_utf8_lossy(rest);
    }
    match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text,
        None => String::from_utf8_lossy(bytes),
    }
}

/// Split decoded text into candidates: trimmed, blank lines dropped, order kept
pub fn parse(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read the list at `path`
pub async fn load(
    path: &Path,
    encoding: &'static Encoding,
) -> Result<PasswordList, PasswordListError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| PasswordListError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let passwords = parse(&decode(&bytes, encoding));
    debug!(?path, count = passwords.len(), "loaded password list");

    Ok(PasswordList {
        path: path.to_path_buf(),
        passwords,
    })
}

/// Append `candidate` as a new line of the list at `path`, creating the file if needed
///
/// A newline separator is written first only when the file already exists and is non-empty.
/// Existing content is never rewritten. The entry is written in the legacy encoding when
/// every character is representable there, otherwise as UTF-8.
pub async fn append(
    path: &Path,
    candidate: &str,
    encoding: &'static Encoding,
) -> Result<(), PasswordListError> {
    let unwritable = |source: std::io::Error| PasswordListError::Unwritable {
        path: path.to_path_buf(),
        source,
    };

    let needs_separator = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len() > 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(unwritable(e)),
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(unwritable)?;
    }

    let mut entry = String::with_capacity(candidate.len() + 1);
    if needs_separator {
        entry.push('\n');
    }
    entry.push_str(candidate);

    let (encoded, _, had_unmappable) = encoding.encode(&entry);
    let bytes: &[u8] = if had_unmappable {
        entry.as_bytes()
    } else {
        &encoded
    };

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(unwritable)?;
    file.write_all(bytes).await.map_err(unwritable)?;
    file.flush().await.map_err(unwritable)?;

    Ok(())
}

/// The password list of one [`Unlocker`](crate::pipeline::Unlocker)
///
/// Appends are serialized, so concurrent discoveries never interleave partial lines.
#[derive(Debug)]
pub struct PasswordStore {
    active: Mutex<Option<PathBuf>>,
    default_file: Option<PathBuf>,
    encoding: &'static Encoding,
    dedupe_on_append: bool,
}

impl PasswordStore {
    /// Create a store from configuration
    pub fn new(config: &PasswordListConfig) -> crate::error::Result<Self> {
        let encoding = Encoding::for_label(config.legacy_encoding.as_bytes()).ok_or_else(|| {
            Error::Config {
                message: format!(
                    "unknown password list encoding '{}'",
                    config.legacy_encoding
                ),
                key: Some("passwords.legacy_encoding".into()),
            }
        })?;

        Ok(Self {
            active: Mutex::new(config.file.clone()),
            default_file: config.default_file.clone(),
            encoding,
            dedupe_on_append: config.dedupe_on_append,
        })
    }

    /// The list currently in use, if any
    pub async fn path(&self) -> Option<PathBuf> {
        self.active.lock().await.clone()
    }

    /// Read the active list; `Ok(None)` when no list is configured yet
    pub async fn load(&self) -> Result<Option<PasswordList>, PasswordListError> {
        let Some(path) = self.path().await else {
            return Ok(None);
        };
        load(&path, self.encoding).await.map(Some)
    }

    /// Append a discovered password to the active list
    ///
    /// Returns the path written to, or `None` if the password was already listed and
    /// `dedupe_on_append` is set.
    pub async fn append(&self, candidate: &str) -> Result<Option<PathBuf>, PasswordListError> {
        let mut active = self.active.lock().await;

        let path = match active.as_ref() {
            Some(path) => path.clone(),
            None => self.default_path()?,
        };

        if self.dedupe_on_append {
            match load(&path, self.encoding).await {
                Ok(list) if list.contains(candidate) => {
                    debug!(?path, "password already listed, not appending");
                    *active = Some(path);
                    return Ok(None);
                }
                Ok(_) => {}
                Err(PasswordListError::Unreadable { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        append(&path, candidate, self.encoding).await?;
        info!(?path, "saved password to list");

        *active = Some(path.clone());
        Ok(Some(path))
    }

    fn default_path(&self) -> Result<PathBuf, PasswordListError> {
        self.default_file
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join("passwords.txt")))
            .ok_or(PasswordListError::NoDefaultLocation)
    }
}
