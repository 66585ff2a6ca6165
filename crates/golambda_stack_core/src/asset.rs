use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SynthError;

/// Code shipped from a prebuilt directory.
///
/// The relative path is kept verbatim so it can be compared against what the
/// descriptor declared; [`AssetCode::resolve`] anchors it at `base_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetCode {
    base_dir: PathBuf,
    relative_path: PathBuf,
}

impl AssetCode {
    pub fn from_asset(base_dir: impl Into<PathBuf>, relative_path: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            relative_path: relative_path.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Joins the relative path onto the base directory and folds `..`
    /// components lexically, without touching the filesystem.
    pub fn resolve(&self) -> PathBuf {
        let mut resolved = PathBuf::new();
        for component in self.base_dir.join(&self.relative_path).components() {
            match component {
                Component::ParentDir => {
                    if !resolved.pop() {
                        resolved.push(component);
                    }
                }
                Component::CurDir => {}
                other => resolved.push(other),
            }
        }
        resolved
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub relative_path: String,
    pub absolute_path: PathBuf,
}

/// Lists regular files below `root`, sorted by their `/`-separated relative path.
///
/// Symbolic links are followed. Hidden entries (names starting with `.`) are
/// not part of the asset.
pub fn list_files(root: &Path) -> Result<Vec<AssetFile>, SynthError> {
    let mut files = Vec::new();
    let mut parents = Vec::new();
    collect_files(root, root, &mut parents, &mut files)?;
    files.sort_by(|left, right| left.relative_path.cmp(&right.relative_path));
    Ok(files)
}

fn collect_files(
    root: &Path,
    dir: &Path,
    parents: &mut Vec<PathBuf>,
    files: &mut Vec<AssetFile>,
) -> Result<(), SynthError> {
    let canonical = fs::canonicalize(dir).map_err(|error| SynthError::io(dir, error))?;
    if parents.contains(&canonical) {
        return Err(SynthError::SymlinkCycle {
            path: dir.to_path_buf(),
        });
    }
    parents.push(canonical);

    let entries = fs::read_dir(dir).map_err(|error| SynthError::io(dir, error))?;
    for entry in entries {
        let entry = entry.map_err(|error| SynthError::io(dir, error))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let metadata = fs::metadata(&path).map_err(|error| SynthError::io(&path, error))?;

        if metadata.is_dir() {
            collect_files(root, &path, parents, files)?;
        } else if metadata.is_file() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push(AssetFile {
                relative_path: relative,
                absolute_path: path,
            });
        }
    }

    parents.pop();
    Ok(())
}

/// Content fingerprint of an asset directory: SHA-256 over every file's
/// relative path, length and bytes, in sorted order.
pub fn fingerprint_directory(root: &Path) -> Result<String, SynthError> {
    let mut hasher = Sha256::new();
    for file in list_files(root)? {
        let bytes = fs::read(&file.absolute_path)
            .map_err(|error| SynthError::io(&file.absolute_path, error))?;
        hasher.update(file.relative_path.as_bytes());
        hasher.update([0u8]);
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Writes every file below `root` into a deflated zip at `zip_path`.
///
/// Entry timestamps are left at the archive default so identical inputs give
/// identical archives. The archive is built next to `zip_path` and renamed
/// into place, so `zip_path` never holds a partial file.
pub fn stage_zip(root: &Path, zip_path: &Path) -> Result<usize, SynthError> {
    let files = list_files(root)?;
    let partial = partial_path(zip_path);
    let written = write_zip(&files, &partial).and_then(|()| {
        fs::rename(&partial, zip_path).map_err(|error| SynthError::io(zip_path, error))
    });
    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written?;
    Ok(files.len())
}

fn partial_path(zip_path: &Path) -> PathBuf {
    let name = zip_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    zip_path.with_file_name(format!(".{name}.partial"))
}

fn write_zip(files: &[AssetFile], zip_path: &Path) -> Result<(), SynthError> {
    let file = fs::File::create(zip_path).map_err(|error| SynthError::io(zip_path, error))?;
    let mut zip = ZipWriter::new(file);

    for entry in files {
        let bytes = fs::read(&entry.absolute_path)
            .map_err(|error| SynthError::io(&entry.absolute_path, error))?;
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(file_mode(&entry.absolute_path)?);
        zip.start_file(entry.relative_path.clone(), options)?;
        zip.write_all(&bytes)
            .map_err(|error| SynthError::io(zip_path, error))?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Result<u32, SynthError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|error| SynthError::io(path, error))?;
    Ok(metadata.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(path: &Path) -> Result<u32, SynthError> {
    let name = path.file_name().and_then(|name| name.to_str());
    Ok(if name == Some("bootstrap") { 0o755 } else { 0o644 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_parent_directory_lexically() {
        let code = AssetCode::from_asset("/srv/deployable/cdk", "../build");
        assert_eq!(code.resolve(), PathBuf::from("/srv/deployable/build"));
        assert_eq!(code.relative_path(), Path::new("../build"));
    }

    #[test]
    fn fingerprint_ignores_directory_listing_order() {
        let first = tempfile::tempdir().expect("tempdir");
        fs::write(first.path().join("b.txt"), "beta").expect("write");
        fs::write(first.path().join("a.txt"), "alpha").expect("write");

        let second = tempfile::tempdir().expect("tempdir");
        fs::write(second.path().join("a.txt"), "alpha").expect("write");
        fs::write(second.path().join("b.txt"), "beta").expect("write");

        assert_eq!(
            fingerprint_directory(first.path()).expect("fingerprint"),
            fingerprint_directory(second.path()).expect("fingerprint"),
        );
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("bootstrap"), "v1").expect("write");
        let before = fingerprint_directory(dir.path()).expect("fingerprint");

        fs::write(dir.path().join("bootstrap"), "v2").expect("write");
        let after = fingerprint_directory(dir.path()).expect("fingerprint");

        assert_ne!(before, after);
        assert_eq!(after.len(), 64);
    }

    #[test]
    fn lists_nested_files_with_forward_slashes() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lib/nested")).expect("mkdir");
        fs::write(dir.path().join("lib/nested/data.json"), "{}").expect("write");
        fs::write(dir.path().join("bootstrap"), "bin").expect("write");

        let files = list_files(dir.path()).expect("listing");
        let names: Vec<_> = files.iter().map(|file| file.relative_path.as_str()).collect();
        assert_eq!(names, vec!["bootstrap", "lib/nested/data.json"]);
    }

    #[test]
    fn hidden_entries_are_not_shipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(".gitignore"), "*\n").expect("write");
        fs::create_dir_all(dir.path().join(".cache")).expect("mkdir");
        fs::write(dir.path().join(".cache/state"), "x").expect("write");
        fs::write(dir.path().join("bootstrap"), "bin").expect("write");

        let files = list_files(dir.path()).expect("listing");
        let names: Vec<_> = files.iter().map(|file| file.relative_path.as_str()).collect();
        assert_eq!(names, vec!["bootstrap"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_bootstrap_is_followed() {
        let target = tempfile::tempdir().expect("tempdir");
        let binary = target.path().join("decap_event");
        fs::write(&binary, "v1").expect("write");

        let dir = tempfile::tempdir().expect("tempdir");
        std::os::unix::fs::symlink(&binary, dir.path().join("bootstrap")).expect("symlink");

        let files = list_files(dir.path()).expect("listing");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "bootstrap");

        let before = fingerprint_directory(dir.path()).expect("fingerprint");
        fs::write(&binary, "v2").expect("write");
        let after = fingerprint_directory(dir.path()).expect("fingerprint");
        assert_ne!(before, after);

        let zip_path = target.path().join("asset.zip");
        assert_eq!(stage_zip(dir.path(), &zip_path).expect("zip"), 1);
        let mut archive =
            zip::ZipArchive::new(fs::File::open(&zip_path).expect("open")).expect("archive");
        let mut staged = String::new();
        std::io::Read::read_to_string(
            &mut archive.by_name("bootstrap").expect("bootstrap entry"),
            &mut staged,
        )
        .expect("read entry");
        assert_eq!(staged, "v2");
    }

    #[cfg(unix)]
    #[test]
    fn directory_link_cycle_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lib")).expect("mkdir");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("lib/loop")).expect("symlink");

        let error = list_files(dir.path()).expect_err("cycle should fail");
        assert!(matches!(error, SynthError::SymlinkCycle { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_link_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("bootstrap"))
            .expect("symlink");

        let error = list_files(dir.path()).expect_err("dangling link should fail");
        assert!(matches!(error, SynthError::Io { .. }));
    }

    #[test]
    fn staging_replaces_existing_archive() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("bootstrap"), "binary").expect("write");
        let out = tempfile::tempdir().expect("tempdir");
        let zip_path = out.path().join("asset.zip");
        fs::write(&zip_path, "truncated").expect("write");

        stage_zip(dir.path(), &zip_path).expect("zip");

        let archive =
            zip::ZipArchive::new(fs::File::open(&zip_path).expect("open")).expect("archive");
        assert_eq!(archive.len(), 1);
        assert!(!partial_path(&zip_path).exists());
    }

    #[test]
    fn staged_zip_is_reproducible() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("bootstrap"), "binary").expect("write");
        let out = tempfile::tempdir().expect("tempdir");

        let first = out.path().join("first.zip");
        let second = out.path().join("second.zip");
        assert_eq!(stage_zip(dir.path(), &first).expect("zip"), 1);
        stage_zip(dir.path(), &second).expect("zip");

        assert_eq!(
            fs::read(first).expect("read"),
            fs::read(second).expect("read")
        );
    }
}
