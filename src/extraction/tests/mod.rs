use crate::error::{Error, ExtractError};
use crate::extraction::shared::{sanitize_entry_path, validate_extracted_paths};
use crate::extraction::*;
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing multiple files
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Create a password-encrypted ZIP using the deprecated ZipCrypto method
/// (only encryption method supported for writing by zip 0.6)
fn create_encrypted_zip(archive_path: &Path, file_name: &str, content: &[u8], password: &[u8]) {
    use ::zip::unstable::write::FileOptionsExt;
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored)
        .with_deprecated_encryption(password);
    writer.start_file(file_name, options).unwrap();
    std::io::Write::write_all(&mut writer, content).unwrap();
    writer.finish().unwrap();
}

/// Create a source directory with a couple of files, for 7z compression
fn create_source_dir(root: &Path) -> PathBuf {
    let src_dir = root.join("source");
    std::fs::create_dir_all(&src_dir).unwrap();
    std::fs::write(src_dir.join("hello.txt"), b"Hello, world!").unwrap();
    std::fs::write(src_dir.join("data.bin"), b"\x00\x01\x02\x03").unwrap();
    src_dir
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[test]
fn detect_archive_type_by_extension() {
    assert_eq!(
        detect_archive_type(Path::new("a.rar")),
        Some(ArchiveType::Rar)
    );
    assert_eq!(
        detect_archive_type(Path::new("a.7z")),
        Some(ArchiveType::SevenZip)
    );
    assert_eq!(
        detect_archive_type(Path::new("/some/dir/a.zip")),
        Some(ArchiveType::Zip)
    );
    assert_eq!(detect_archive_type(Path::new("a.txt")), None);
}

#[test]
fn detect_archive_type_is_case_insensitive() {
    assert_eq!(
        detect_archive_type(Path::new("A.ZIP")),
        Some(ArchiveType::Zip)
    );
    assert_eq!(
        detect_archive_type(Path::new("A.Rar")),
        Some(ArchiveType::Rar)
    );
}

#[test]
fn detect_archive_type_no_extension_returns_none() {
    assert_eq!(detect_archive_type(Path::new("no_extension")), None);
}

#[test]
fn detect_archive_type_double_extension_uses_last() {
    assert_eq!(
        detect_archive_type(Path::new("file.tar.zip")),
        Some(ArchiveType::Zip),
        "should detect based on last extension"
    );
}

#[test]
fn is_archive_matches_configured_extensions() {
    let extensions = vec!["zip".to_string(), "rar".to_string(), "7z".to_string()];
    assert!(is_archive(Path::new("x.zip"), &extensions));
    assert!(is_archive(Path::new("x.RAR"), &extensions));
    assert!(is_archive(Path::new("x.7z"), &extensions));
    assert!(!is_archive(Path::new("x.txt"), &extensions));
    assert!(!is_archive(Path::new("no_extension"), &extensions));
}

#[test]
fn is_archive_empty_extensions_list_never_matches() {
    let extensions: Vec<String> = vec![];
    assert!(!is_archive(Path::new("file.rar"), &extensions));
    assert!(!is_archive(Path::new("file.zip"), &extensions));
}

#[test]
fn is_archive_dotfile_without_extension_returns_false() {
    let extensions = vec!["hidden".to_string()];
    assert!(
        !is_archive(Path::new(".hidden"), &extensions),
        "dotfile with no extension should not match"
    );
}

// ---------------------------------------------------------------------------
// BackendSet
// ---------------------------------------------------------------------------

#[test]
fn native_backend_set_covers_all_formats() {
    let set = BackendSet::native();
    for archive_type in [ArchiveType::Rar, ArchiveType::SevenZip, ArchiveType::Zip] {
        let backend = set.get(archive_type).expect("backend registered");
        assert_eq!(backend.archive_type(), archive_type);
    }
    assert!(BackendSet::empty().get(ArchiveType::Zip).is_none());
}

#[test]
fn backend_set_with_replaces_existing_backend() {
    struct Marker;
    impl ArchiveBackend for Marker {
        fn archive_type(&self) -> ArchiveType {
            ArchiveType::Zip
        }
        fn extract(&self, _: &Path, _: &str, _: &Path) -> crate::error::Result<Vec<PathBuf>> {
            Ok(vec![PathBuf::from("marker")])
        }
    }

    let set = BackendSet::native().with(Arc::new(Marker));
    let backend = set.get(ArchiveType::Zip).unwrap();
    let files = backend
        .extract(Path::new("a.zip"), "", Path::new("/nowhere"))
        .unwrap();
    assert_eq!(files, vec![PathBuf::from("marker")]);
    assert!(format!("{set:?}").contains("ZIP"));
}

// ---------------------------------------------------------------------------
// Path safety
// ---------------------------------------------------------------------------

#[test]
fn sanitize_entry_path_strips_traversal() {
    assert_eq!(
        sanitize_entry_path(Path::new("../../etc/passwd")),
        Some(PathBuf::from("etc/passwd"))
    );
    assert_eq!(
        sanitize_entry_path(Path::new("/abs/file.txt")),
        Some(PathBuf::from("abs/file.txt"))
    );
    assert_eq!(
        sanitize_entry_path(Path::new("dir/./file.txt")),
        Some(PathBuf::from("dir/file.txt"))
    );
    assert_eq!(sanitize_entry_path(Path::new("../..")), None);
}

#[test]
fn validate_extracted_paths_accepts_nested_files() {
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("out");
    std::fs::create_dir_all(dest.join("a/b")).unwrap();
    std::fs::write(dest.join("a/b/c.txt"), b"x").unwrap();

    validate_extracted_paths(Path::new("x.7z"), &dest).unwrap();
}

#[cfg(unix)]
#[test]
fn validate_extracted_paths_rejects_escaping_symlink() {
    let temp_dir = TempDir::new().unwrap();
    let outside = temp_dir.path().join("outside.txt");
    std::fs::write(&outside, b"secret").unwrap();

    let dest = temp_dir.path().join("out");
    std::fs::create_dir_all(&dest).unwrap();
    std::os::unix::fs::symlink(&outside, dest.join("link")).unwrap();

    let result = validate_extracted_paths(Path::new("x.7z"), &dest);
    assert!(matches!(
        result,
        Err(Error::Extract(ExtractError::UnsafePath { .. }))
    ));
}

// ---------------------------------------------------------------------------
// ZIP backend
// ---------------------------------------------------------------------------

#[test]
fn zip_extracts_plain_archive_with_empty_password() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("plain.zip");
    create_zip_archive(
        &archive_path,
        &[("one.txt", b"1"), ("dir/two.txt", b"22")],
    );

    let dest = temp_dir.path().join("extracted");
    let files = ZipBackend.extract(&archive_path, "", &dest).unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(std::fs::read(dest.join("dir/two.txt")).unwrap(), b"22");
}

#[test]
fn zip_encrypted_with_correct_password_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("encrypted.zip");
    let content = b"secret data inside";
    create_encrypted_zip(&archive_path, "secret.txt", content, b"abc123");

    let dest = temp_dir.path().join("extracted");
    let files = ZipBackend.extract(&archive_path, "abc123", &dest).unwrap();

    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("secret.txt"));
    assert_eq!(std::fs::read(&files[0]).unwrap(), content);
}

#[test]
fn zip_encrypted_with_wrong_password_is_wrong_password() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("encrypted.zip");
    create_encrypted_zip(&archive_path, "secret.txt", b"data", b"correctpassword");

    let dest = temp_dir.path().join("extracted");
    match ZipBackend.extract(&archive_path, "wrongpassword", &dest) {
        Err(Error::Extract(ExtractError::WrongPassword { archive })) => {
            assert_eq!(archive, archive_path, "should report the archive path");
        }
        other => panic!("expected WrongPassword, got: {other:?}"),
    }
}

#[test]
fn zip_encrypted_without_password_is_wrong_password() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("encrypted.zip");
    create_encrypted_zip(&archive_path, "secret.txt", b"data", b"password123");

    let dest = temp_dir.path().join("extracted");
    let err = ZipBackend.extract(&archive_path, "", &dest).unwrap_err();
    assert!(err.is_wrong_password(), "got: {err:?}");
}

#[test]
fn zip_key_passing_header_check_is_still_wrong_password() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("encrypted.zip");
    let content = b"a payload long enough that a garbage key cannot match its CRC";
    create_encrypted_zip(&archive_path, "secret.txt", content, b"abc123");

    // Roughly one key in 256 gets past the ZipCrypto header byte
    let mut archive = ::zip::ZipArchive::new(std::fs::File::open(&archive_path).unwrap()).unwrap();
    let lucky_key = (0..20_000)
        .map(|i| format!("key{i}"))
        .find(|key| {
            key != "abc123"
                && matches!(archive.by_index_decrypt(0, key.as_bytes()), Ok(Ok(_)))
        })
        .expect("some wrong key passes the header check");
    drop(archive);

    let dest = temp_dir.path().join("extracted");
    let err = ZipBackend.extract(&archive_path, &lucky_key, &dest).unwrap_err();
    assert!(err.is_wrong_password(), "key {lucky_key:?}, got: {err:?}");
}

#[test]
fn zip_password_for_plain_archive_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("plain.zip");
    create_zip_archive(&archive_path, &[("one.txt", b"1")]);

    let dest = temp_dir.path().join("extracted");
    let files = ZipBackend.extract(&archive_path, "anything", &dest).unwrap();
    assert_eq!(files, vec![dest.join("one.txt")]);
}

#[test]
fn zip_write_failure_with_right_password_is_not_wrong_password() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("encrypted.zip");
    create_encrypted_zip(&archive_path, "secret.txt", b"data", b"abc123");

    // A directory squats on the entry's output path
    let dest = temp_dir.path().join("extracted");
    std::fs::create_dir_all(dest.join("secret.txt")).unwrap();

    let err = ZipBackend.extract(&archive_path, "abc123", &dest).unwrap_err();
    assert!(!err.is_wrong_password(), "got: {err:?}");
}

#[test]
fn zip_corrupt_archive_is_extraction_failure() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("corrupt.zip");
    std::fs::write(&archive_path, b"definitely not a zip").unwrap();

    let dest = temp_dir.path().join("out");
    match ZipBackend.extract(&archive_path, "", &dest) {
        Err(Error::Extract(ExtractError::ExtractionFailed { archive, reason })) => {
            assert_eq!(archive, archive_path);
            assert!(!reason.is_empty());
        }
        other => panic!("expected ExtractionFailed, got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// 7z backend
// ---------------------------------------------------------------------------

#[test]
fn sevenz_extracts_real_archive() {
    let temp_dir = TempDir::new().unwrap();
    let src_dir = create_source_dir(temp_dir.path());
    let archive_path = temp_dir.path().join("test.7z");
    sevenz_rust::compress_to_path(&src_dir, &archive_path).unwrap();

    let dest = temp_dir.path().join("extracted");
    let files = SevenZipBackend.extract(&archive_path, "", &dest).unwrap();

    assert_eq!(files.len(), 2, "should extract exactly 2 files");
    let hello_file = files.iter().find(|p| p.ends_with("hello.txt")).unwrap();
    assert_eq!(
        std::fs::read_to_string(hello_file).unwrap(),
        "Hello, world!"
    );
}

#[test]
fn sevenz_encrypted_archive_needs_the_right_password() {
    let temp_dir = TempDir::new().unwrap();
    let src_dir = create_source_dir(temp_dir.path());
    let archive_path = temp_dir.path().join("secret.7z");
    sevenz_rust::compress_to_path_encrypted(
        &src_dir,
        &archive_path,
        sevenz_rust::Password::from("s3cret"),
    )
    .unwrap();

    let err = SevenZipBackend
        .extract(&archive_path, "", &temp_dir.path().join("none"))
        .unwrap_err();
    assert!(err.is_wrong_password(), "empty password, got: {err:?}");

    let err = SevenZipBackend
        .extract(&archive_path, "nope", &temp_dir.path().join("wrong"))
        .unwrap_err();
    assert!(err.is_wrong_password(), "wrong password, got: {err:?}");

    let dest = temp_dir.path().join("right");
    let files = SevenZipBackend.extract(&archive_path, "s3cret", &dest).unwrap();
    assert_eq!(files.len(), 2);
}

#[test]
fn sevenz_write_failure_with_right_password_is_not_wrong_password() {
    let temp_dir = TempDir::new().unwrap();
    let src_dir = create_source_dir(temp_dir.path());
    let archive_path = temp_dir.path().join("secret.7z");
    sevenz_rust::compress_to_path_encrypted(
        &src_dir,
        &archive_path,
        sevenz_rust::Password::from("s3cret"),
    )
    .unwrap();

    let dest = temp_dir.path().join("out");
    std::fs::create_dir_all(dest.join("hello.txt")).unwrap();

    match SevenZipBackend.extract(&archive_path, "s3cret", &dest) {
        Err(Error::Extract(ExtractError::ExtractionFailed { archive, .. })) => {
            assert_eq!(archive, archive_path);
        }
        other => panic!("expected ExtractionFailed, got: {other:?}"),
    }
}

#[test]
fn sevenz_error_classification() {
    use sevenz_rust::Error as SevenZError;
    use std::io::ErrorKind;

    let archive = Path::new("x.7z");
    let classify = |e: SevenZError, password: &str| {
        SevenZipBackend::convert_sevenz_error(e, archive, password).is_wrong_password()
    };

    assert!(classify(SevenZError::PasswordRequired, ""));
    assert!(classify(SevenZError::ChecksumVerificationFailed, "pw"));
    assert!(!classify(SevenZError::ChecksumVerificationFailed, ""));
    assert!(classify(SevenZError::other("bad property id"), "pw"));

    let crc = std::io::Error::new(ErrorKind::Other, SevenZError::ChecksumVerificationFailed);
    assert!(classify(SevenZError::io(crc), "pw"));
    assert!(classify(SevenZError::io(ErrorKind::InvalidData.into()), "pw"));
    assert!(classify(SevenZError::io(ErrorKind::UnexpectedEof.into()), "pw"));

    // Filesystem trouble is not a password problem
    assert!(!classify(SevenZError::io(ErrorKind::PermissionDenied.into()), "pw"));
    assert!(!classify(SevenZError::io(ErrorKind::StorageFull.into()), "pw"));
    assert!(!classify(SevenZError::io(std::io::Error::other("disk gone")), "pw"));
    let create_failed = SevenZError::io_msg(ErrorKind::InvalidInput.into(), "/out/hello.txt");
    assert!(!classify(create_failed, "pw"));
}

#[test]
fn sevenz_reports_only_files_it_wrote() {
    let temp_dir = TempDir::new().unwrap();
    let src_dir = create_source_dir(temp_dir.path());
    let archive_path = temp_dir.path().join("test.7z");
    sevenz_rust::compress_to_path(&src_dir, &archive_path).unwrap();

    // Left over from an earlier stage
    let dest = temp_dir.path().join("extracted");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("partial.tmp"), b"junk").unwrap();

    let files = SevenZipBackend.extract(&archive_path, "", &dest).unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|p| p.starts_with(&dest) && p.is_file()));
    assert!(!files.contains(&dest.join("partial.tmp")));
}

#[test]
fn sevenz_nonexistent_archive_is_extraction_failure() {
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("out");

    match SevenZipBackend.extract(Path::new("/no/such/archive.7z"), "", &dest) {
        Err(Error::Extract(ExtractError::ExtractionFailed { archive, .. })) => {
            assert_eq!(archive, PathBuf::from("/no/such/archive.7z"));
        }
        other => panic!("expected ExtractionFailed, got: {other:?}"),
    }
}

#[test]
fn sevenz_corrupt_archive_is_extraction_failure() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("corrupt.7z");
    std::fs::write(&archive_path, b"this is not a valid 7z archive").unwrap();

    let err = SevenZipBackend
        .extract(&archive_path, "", &temp_dir.path().join("out"))
        .unwrap_err();
    assert!(!err.is_wrong_password());
}

// ---------------------------------------------------------------------------
// RAR backend
// ---------------------------------------------------------------------------

#[test]
fn rar_error_classification() {
    use unrar::error::{Code, UnrarError, When};

    let archive = Path::new("x.rar");
    let bad_password = UnrarError::from(Code::BadPassword, When::Process);
    assert!(RarBackend::convert_unrar_error(bad_password, archive, false).is_wrong_password());

    let bad_data = UnrarError::from(Code::BadData, When::Process);
    assert!(RarBackend::convert_unrar_error(bad_data, archive, true).is_wrong_password());

    let bad_data = UnrarError::from(Code::BadData, When::Process);
    assert!(!RarBackend::convert_unrar_error(bad_data, archive, false).is_wrong_password());

    let bad_archive = UnrarError::from(Code::BadArchive, When::Open);
    assert!(!RarBackend::convert_unrar_error(bad_archive, archive, true).is_wrong_password());
}

#[test]
fn rar_corrupt_archive_is_not_wrong_password() {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join("corrupt.rar");
    std::fs::write(&archive_path, b"Rar! but not really").unwrap();

    let err = RarBackend
        .extract(&archive_path, "", &temp_dir.path().join("out"))
        .unwrap_err();
    assert!(!err.is_wrong_password(), "got: {err:?}");
}
