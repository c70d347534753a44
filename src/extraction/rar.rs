use crate::error::{Error, Result};
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use unrar::error::{Code, UnrarError};

use super::ArchiveBackend;
use super::shared::{create_destination, sanitize_entry_path};

/// Archive backend for RAR files
pub struct RarBackend;

impl RarBackend {
    /// Convert an unrar error to our error type
    ///
    /// RAR5 reports a bad key directly. RAR4 has no password check value, so a wrong key on
    /// encrypted data only surfaces as a CRC failure (`BadData`).
    pub(crate) fn convert_unrar_error(
        e: UnrarError,
        archive_path: &Path,
        encrypted: bool,
    ) -> Error {
        match e.code {
            Code::BadPassword | Code::MissingPassword => Error::wrong_password(archive_path),
            Code::BadData if encrypted => Error::wrong_password(archive_path),
            _ => Error::extraction_failed(archive_path, e.to_string()),
        }
    }
}

impl ArchiveBackend for RarBackend {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Rar
    }

    fn extract(
        &self,
        archive_path: &Path,
        password: &str,
        dest_path: &Path,
    ) -> Result<Vec<PathBuf>> {
        debug!(
            ?archive_path,
            password_length = password.len(),
            ?dest_path,
            "attempting RAR extraction"
        );

        create_destination(dest_path)?;

        let archive = if password.is_empty() {
            unrar::Archive::new(archive_path)
        } else {
            unrar::Archive::with_password(archive_path, password.as_bytes())
        };

        // Header-encrypted archives fail here when the key is wrong
        let has_password = !password.is_empty();
        let mut at_header = archive
            .open_for_processing()
            .map_err(|e| Self::convert_unrar_error(e, archive_path, has_password))?;

        let mut extracted_files = Vec::new();
        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(entry_processor)) => entry_processor,
                Ok(None) => break,
                Err(e) => return Err(Self::convert_unrar_error(e, archive_path, has_password)),
            };

            let header = at_file.entry();
            let encrypted = header.is_encrypted();

            let Some(sanitized) = sanitize_entry_path(&header.filename) else {
                warn!(?archive_path, entry = ?header.filename, "skipping entry with unsafe path");
                at_header = at_file
                    .skip()
                    .map_err(|e| Self::convert_unrar_error(e, archive_path, encrypted))?;
                continue;
            };

            let file_path = dest_path.join(&sanitized);

            if header.is_directory() {
                std::fs::create_dir_all(&file_path)?;
                at_header = at_file
                    .skip()
                    .map_err(|e| Self::convert_unrar_error(e, archive_path, encrypted))?;
            } else {
                if let Some(parent) = file_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                at_header = at_file
                    .extract_to(&file_path)
                    .map_err(|e| Self::convert_unrar_error(e, archive_path, encrypted))?;
                extracted_files.push(file_path);
            }
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "RAR extraction successful"
        );

        Ok(extracted_files)
    }
}
