use crate::error::{Error, Result};
use crate::types::ArchiveType;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::result::ZipError;

use super::ArchiveBackend;
use super::shared::create_destination;

/// Archive backend for ZIP files (ZipCrypto encryption)
pub struct ZipBackend;

impl ZipBackend {
    /// Map a `ZipError` raised while opening an entry
    fn convert_zip_error(e: ZipError, archive_path: &Path) -> Error {
        match e {
            ZipError::UnsupportedArchive(detail) if detail == ZipError::PASSWORD_REQUIRED => {
                Error::wrong_password(archive_path)
            }
            other => {
                Error::extraction_failed(archive_path, format!("failed to read ZIP entry: {}", other))
            }
        }
    }

    /// Open a ZIP entry by index, handling password decryption if needed
    ///
    /// Also reports whether the entry is encrypted. zip 0.6 ignores a password given for a
    /// plain entry, so a plain `by_index` refusing the entry is what tells the two apart.
    fn open_zip_entry<'a>(
        archive: &'a mut zip::ZipArchive<std::fs::File>,
        index: usize,
        password: &str,
        archive_path: &Path,
    ) -> Result<(zip::read::ZipFile<'a>, bool)> {
        let encrypted = match archive.by_index(index) {
            Ok(_) => false,
            Err(ZipError::UnsupportedArchive(detail)) if detail == ZipError::PASSWORD_REQUIRED => {
                true
            }
            Err(e) => return Err(Self::convert_zip_error(e, archive_path)),
        };

        if !encrypted {
            let file = archive
                .by_index(index)
                .map_err(|e| Self::convert_zip_error(e, archive_path))?;
            return Ok((file, false));
        }
        if password.is_empty() {
            return Err(Error::wrong_password(archive_path));
        }

        let file = archive
            .by_index_decrypt(index, password.as_bytes())
            .map_err(|e| Self::convert_zip_error(e, archive_path))?
            .map_err(|_| Error::wrong_password(archive_path))?;
        Ok((file, true))
    }

    /// Extract a single ZIP entry to disk, creating directories as needed
    fn extract_zip_entry(
        mut file: zip::read::ZipFile,
        encrypted: bool,
        dest_path: &Path,
        archive_path: &Path,
    ) -> Result<Option<PathBuf>> {
        let file_path = match file.enclosed_name() {
            Some(path) => dest_path.join(path),
            None => {
                warn!(?archive_path, entry = file.name(), "skipping entry with unsafe path");
                return Ok(None);
            }
        };

        if file.is_dir() {
            std::fs::create_dir_all(&file_path).map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to create directory: {}",
                    e
                )))
            })?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to create parent directories: {}",
                    e
                )))
            })?;
        }

        let mut outfile = std::fs::File::create(&file_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create output file: {}",
                e
            )))
        })?;

        // A wrong key that passes ZipCrypto's header check only shows up as a checksum or
        // inflate failure while reading
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = match file.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if encrypted => {
                    debug!(?archive_path, error = %e, "encrypted entry failed to decode");
                    return Err(Error::wrong_password(archive_path));
                }
                Err(e) => {
                    return Err(Error::extraction_failed(
                        archive_path,
                        format!("failed to read ZIP entry {}: {}", file.name(), e),
                    ));
                }
            };
            outfile.write_all(&buf[..n]).map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to write {}: {}",
                    file_path.display(),
                    e
                )))
            })?;
        }

        Ok(Some(file_path))
    }
}

impl ArchiveBackend for ZipBackend {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Zip
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
            "attempting ZIP extraction"
        );

        create_destination(dest_path)?;

        let file = std::fs::File::open(archive_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to open ZIP archive: {}",
                e
            )))
        })?;

        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            Error::extraction_failed(archive_path, format!("failed to read ZIP archive: {}", e))
        })?;

        let mut extracted_files = Vec::new();
        for i in 0..archive.len() {
            let (file, encrypted) = Self::open_zip_entry(&mut archive, i, password, archive_path)?;
            if let Some(file_path) =
                Self::extract_zip_entry(file, encrypted, dest_path, archive_path)?
            {
                extracted_files.push(file_path);
            }
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "ZIP extraction successful"
        );

        Ok(extracted_files)
    }
}
