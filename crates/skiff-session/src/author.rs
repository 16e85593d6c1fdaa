//! Descriptor authoring helpers.
//!
//! Building the file listing for a new shareable descriptor is a
//! stateless, single-shot operation; the opaque descriptor bytes
//! themselves come from the engine (`TransferEngine::author_descriptor`),
//! which owns piece hashing and encoding.

use std::fs;
use std::path::{Path, PathBuf};

use skiff_engine_core::{AuthorFile, AuthorRequest};
use walkdir::WalkDir;

use crate::error::AuthorError;

/// Build an authoring request from a source folder.
///
/// Walks the folder once, collecting regular files as root-relative paths
/// sorted lexicographically so the produced listing is deterministic.
///
/// # Errors
///
/// Returns an error when the folder cannot be walked, has no derivable
/// name, or contains no files.
pub fn build_request(
    folder: &Path,
    tracker: Option<String>,
) -> Result<AuthorRequest, AuthorError> {
    let name = folder
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| AuthorError::UnnamedFolder {
            path: folder.to_path_buf(),
        })?;

    let mut files = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| AuthorError::Walk {
            path: folder.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(folder)
            .unwrap_or_else(|_| entry.path());
        let size_bytes = entry.metadata().map_or(0, |meta| meta.len());
        files.push(AuthorFile {
            path: relative.to_string_lossy().into_owned(),
            size_bytes,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    if files.is_empty() {
        return Err(AuthorError::EmptyFolder {
            path: folder.to_path_buf(),
        });
    }

    Ok(AuthorRequest {
        name,
        tracker,
        files,
    })
}

/// Default output path: a sibling file named after the folder.
#[must_use]
pub fn default_destination(folder: &Path) -> PathBuf {
    let name = folder
        .file_name()
        .map_or_else(|| "descriptor".into(), ToOwned::to_owned);
    let mut file_name = name;
    file_name.push(".torrent");
    folder.with_file_name(file_name)
}

/// Write authored descriptor bytes, atomically, to the destination.
///
/// # Errors
///
/// Returns an error if the temp file cannot be written or renamed into
/// place.
pub fn write_descriptor(destination: &Path, payload: &[u8]) -> Result<(), AuthorError> {
    let mut tmp = destination.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, payload).map_err(|source| AuthorError::Write {
        path: destination.to_path_buf(),
        source,
    })?;
    fs::rename(&tmp, destination).map_err(|source| AuthorError::Write {
        path: destination.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn build_request_lists_files_sorted_and_relative() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let folder = temp.path().join("album");
        fs::create_dir_all(folder.join("disc-2"))?;
        fs::write(folder.join("track-b.flac"), vec![0_u8; 64])?;
        fs::write(folder.join("track-a.flac"), vec![0_u8; 32])?;
        fs::write(folder.join("disc-2").join("track-c.flac"), vec![0_u8; 16])?;

        let request = build_request(&folder, Some("http://tracker.example/announce".into()))?;
        assert_eq!(request.name, "album");
        assert_eq!(
            request.tracker.as_deref(),
            Some("http://tracker.example/announce")
        );
        let paths: Vec<&str> = request.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["disc-2/track-c.flac", "track-a.flac", "track-b.flac"]
        );
        assert_eq!(request.files[1].size_bytes, 32);
        Ok(())
    }

    #[test]
    fn empty_folder_is_rejected() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let folder = temp.path().join("empty");
        fs::create_dir_all(&folder)?;
        assert!(matches!(
            build_request(&folder, None),
            Err(AuthorError::EmptyFolder { .. })
        ));
        Ok(())
    }

    #[test]
    fn default_destination_is_a_sibling_file() {
        let dest = default_destination(Path::new("/data/shared/album"));
        assert_eq!(dest, PathBuf::from("/data/shared/album.torrent"));
    }

    #[test]
    fn write_descriptor_is_atomic() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let destination = temp.path().join("album.torrent");
        write_descriptor(&destination, b"descriptor-bytes")?;

        assert_eq!(fs::read(&destination)?, b"descriptor-bytes");
        let names: Vec<String> = fs::read_dir(temp.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["album.torrent".to_string()]);
        Ok(())
    }
}
