use crate::error::{Error, ExtractError, Result};
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};

/// Detect archive type by file extension (case-insensitive)
///
/// Supports RAR (.rar), 7z (.7z), and ZIP (.zip).
pub fn detect_archive_type(path: &Path) -> Option<ArchiveType> {
    let ext = path.extension()?.to_str()?.to_lowercase();

    match ext.as_str() {
        "rar" => Some(ArchiveType::Rar),
        "7z" => Some(ArchiveType::SevenZip),
        "zip" => Some(ArchiveType::Zip),
        _ => None,
    }
}

/// Check if a file is an archive based on its extension
///
/// # Arguments
/// * `path` - Path to the file to check
/// * `archive_extensions` - List of extensions to treat as archives (without dots)
pub fn is_archive(path: &Path, archive_extensions: &[String]) -> bool {
    if let Some(ext) = path.extension() {
        let ext_str = ext.to_string_lossy().to_lowercase();
        archive_extensions
            .iter()
            .any(|ae| ae.to_lowercase() == ext_str)
    } else {
        false
    }
}

/// Create the destination directory if it doesn't exist
pub(crate) fn create_destination(dest_path: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_path).map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "failed to create destination {}: {}",
            dest_path.display(),
            e
        )))
    })
}

/// Strip root, prefix and `..` components from an entry name
///
/// Returns `None` when nothing safe is left (e.g. an entry named `../..`).
pub(crate) fn sanitize_entry_path(entry: &Path) -> Option<PathBuf> {
    let sanitized = entry
        .components()
        .filter(|c| matches!(c, std::path::Component::Normal(_)))
        .collect::<PathBuf>();

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Validate that everything below `dest_path` stays inside it once links are resolved
///
/// Used for backends that write entries themselves and cannot be filtered up front.
pub(crate) fn validate_extracted_paths(archive_path: &Path, dest_path: &Path) -> Result<()> {
    let canonical_dest = dest_path.canonicalize().map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "failed to canonicalize destination path: {}",
            e
        )))
    })?;

    for entry in walkdir::WalkDir::new(dest_path).min_depth(1) {
        let entry = entry.map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to read extracted entry: {}",
                e
            )))
        })?;
        let canonical = entry.path().canonicalize().map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to canonicalize extracted path: {}",
                e
            )))
        })?;

        if !canonical.starts_with(&canonical_dest) {
            return Err(Error::Extract(ExtractError::UnsafePath {
                archive: archive_path.to_path_buf(),
                entry: canonical,
            }));
        }
    }
    Ok(())
}
