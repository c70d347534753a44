use crate::error::{Error, Result};
use crate::types::ArchiveType;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::ArchiveBackend;
use super::shared::{create_destination, validate_extracted_paths};

/// Archive backend for 7z files (AES-256 encryption)
pub struct SevenZipBackend;

impl SevenZipBackend {
    /// Classify a decoder error
    ///
    /// 7z has no password check value. A wrong AES key produces garbage that the decoder
    /// notices as a malformed header, a bad stream or a CRC mismatch, so those count as a
    /// rejected password whenever one was supplied. Failures opening or writing files stay
    /// extraction failures.
    pub(crate) fn convert_sevenz_error(
        e: sevenz_rust::Error,
        archive_path: &Path,
        password: &str,
    ) -> Error {
        use sevenz_rust::Error as SevenZError;

        if matches!(e, SevenZError::PasswordRequired) {
            return Error::wrong_password(archive_path);
        }

        let garbled = match &e {
            SevenZError::ChecksumVerificationFailed
            | SevenZError::NextHeaderCrcMismatch
            | SevenZError::BadTerminatedStreamsInfo(_)
            | SevenZError::BadTerminatedUnpackInfo
            | SevenZError::BadTerminatedPackInfo(_)
            | SevenZError::BadTerminatedSubStreamsInfo
            | SevenZError::BadTerminatedheader(_)
            | SevenZError::UnsupportedCompressionMethod(_)
            | SevenZError::MaxMemLimited { .. }
            | SevenZError::Unsupported(_)
            | SevenZError::Other(_) => true,
            // A non-empty context names the file that could not be opened or created
            SevenZError::Io(io, context) => context.is_empty() && is_decode_failure(io),
            _ => false,
        };

        if garbled && !password.is_empty() {
            debug!(?archive_path, error = %e, "decoder failed with a password set");
            return Error::wrong_password(archive_path);
        }

        Error::extraction_failed(
            archive_path,
            format!("failed to extract 7z archive: {}", e),
        )
    }
}

/// Whether an I/O error came out of the decoder rather than the filesystem
fn is_decode_failure(e: &std::io::Error) -> bool {
    match e.kind() {
        ErrorKind::InvalidData
        | ErrorKind::InvalidInput
        | ErrorKind::UnexpectedEof
        | ErrorKind::OutOfMemory => true,
        // Entry CRC mismatches arrive wrapped in an `Other` I/O error
        ErrorKind::Other => e
            .get_ref()
            .is_some_and(|inner| inner.downcast_ref::<sevenz_rust::Error>().is_some()),
        _ => false,
    }
}

impl ArchiveBackend for SevenZipBackend {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::SevenZip
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
            "attempting 7z extraction"
        );

        create_destination(dest_path)?;

        let file = std::fs::File::open(archive_path).map_err(|e| {
            Error::extraction_failed(archive_path, format!("failed to open 7z archive: {}", e))
        })?;
        let pw = if password.is_empty() {
            sevenz_rust::Password::empty()
        } else {
            sevenz_rust::Password::from(password)
        };

        let mut extracted_files = Vec::new();
        sevenz_rust::decompress_with_extract_fn_and_password(
            file,
            dest_path,
            pw,
            |entry, reader, path| {
                let more = sevenz_rust::default_entry_extract_fn(entry, reader, path)?;
                if !entry.is_directory() {
                    extracted_files.push(path.clone());
                }
                Ok(more)
            },
        )
        .map_err(|e| Self::convert_sevenz_error(e, archive_path, password))?;

        // The decoder writes entries itself, so traversal is checked after the fact
        validate_extracted_paths(archive_path, dest_path)?;
        extracted_files.sort();

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "7z extraction successful"
        );

        Ok(extracted_files)
    }
}
