//! Durable persistence for per-job checkpoints and the global session
//! blob.
//!
//! Both stores treat their payloads as raw engine-format bytes; the
//! coordinator only cares about existence and successful decode of the
//! file key. Writes go through a temp-file + rename pair so a partial
//! write never leaves a corrupt file readable by a later load.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use skiff_engine_core::JobId;
use tracing::warn;

use crate::error::StoreError;

/// File extension for per-job checkpoint blobs.
const CHECKPOINT_EXT: &str = "resume";

/// Keyed on-disk store for per-job resume checkpoints.
///
/// Files are named `<info-hash-hex>.resume`; the key is the job's stable
/// content identity, never its display name, so two jobs with identical
/// names cannot overwrite or miscorrelate each other's checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at the given checkpoint directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the checkpoint files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the checkpoint directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_initialized(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .map_err(|source| StoreError::io("create_dir", self.root.clone(), source))
    }

    /// Atomically write one job's checkpoint blob, overwriting any previous
    /// checkpoint for the same identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp file cannot be written or renamed into
    /// place.
    pub fn save(&self, id: JobId, payload: &[u8]) -> Result<(), StoreError> {
        self.ensure_initialized()?;
        write_atomic(&self.path_for(id), payload)
            .map_err(|source| StoreError::io("save", self.path_for(id), source))
    }

    /// Load every decodable checkpoint in one pass over the directory.
    ///
    /// Entries whose file stem is not a valid content hash, that are empty,
    /// or that cannot be read are skipped with a warning; a missing
    /// directory yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory exists but cannot be listed.
    pub fn load_all(&self) -> Result<Vec<(JobId, Vec<u8>)>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::io("read_dir", self.root.clone(), source)),
        };

        let mut loaded = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            let Some(id) = checkpoint_key(&path) else {
                continue;
            };
            match fs::read(&path) {
                Ok(payload) if payload.is_empty() => {
                    warn!(path = %path.display(), "skipping empty checkpoint file");
                }
                Ok(payload) => loaded.push((id, payload)),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable checkpoint file"
                    );
                }
            }
        }
        Ok(loaded)
    }

    /// Remove a job's checkpoint file; absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn delete(&self, id: JobId) -> Result<(), StoreError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::io("delete", path, source)),
        }
    }

    fn path_for(&self, id: JobId) -> PathBuf {
        self.root.join(format!("{id}.{CHECKPOINT_EXT}"))
    }
}

/// Extract the job identity from a checkpoint path, if it is one.
fn checkpoint_key(path: &Path) -> Option<JobId> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(CHECKPOINT_EXT) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.parse().ok()
}

/// Single-blob store for the global engine configuration.
#[derive(Debug, Clone)]
pub struct SessionStateStore {
    path: PathBuf,
}

impl SessionStateStore {
    /// Create a store writing to the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the session blob; absence means "use engine defaults".
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read.
    pub fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path) {
            Ok(blob) if blob.is_empty() => Ok(None),
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::io("load", self.path.clone(), source)),
        }
    }

    /// Atomically overwrite the session blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp file cannot be written or renamed into
    /// place.
    pub fn save(&self, blob: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| StoreError::io("create_dir", parent.to_path_buf(), source))?;
        }
        write_atomic(&self.path, blob)
            .map_err(|source| StoreError::io("save", self.path.clone(), source))
    }
}

/// Full-file overwrite through a sibling temp file and rename.
fn write_atomic(path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, payload)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(seed: u8) -> JobId {
        JobId::from_bytes([seed; 20])
    }

    #[test]
    fn save_then_load_all_round_trips() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = CheckpointStore::new(temp.path().join("checkpoints"));

        store.save(id(1), b"resume-one")?;
        store.save(id(2), b"resume-two")?;
        // Overwrite keeps a single file per identity.
        store.save(id(1), b"resume-one-v2")?;

        let mut loaded = store.load_all()?;
        loaded.sort_by_key(|(id, _)| *id);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], (id(1), b"resume-one-v2".to_vec()));
        assert_eq!(loaded[1], (id(2), b"resume-two".to_vec()));
        Ok(())
    }

    #[test]
    fn load_all_skips_undecodable_entries() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("checkpoints");
        let store = CheckpointStore::new(&root);
        store.save(id(7), b"good")?;

        fs::write(root.join("not-a-hash.resume"), b"junk")?;
        fs::write(root.join(format!("{}.resume", id(9))), b"")?;
        fs::write(root.join("unrelated.txt"), b"junk")?;

        let loaded = store.load_all()?;
        assert_eq!(loaded, vec![(id(7), b"good".to_vec())]);
        Ok(())
    }

    #[test]
    fn load_all_on_missing_directory_is_empty() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = CheckpointStore::new(temp.path().join("never-created"));
        assert!(store.load_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn delete_is_idempotent() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = CheckpointStore::new(temp.path().join("checkpoints"));

        store.save(id(3), b"payload")?;
        store.delete(id(3))?;
        store.delete(id(3))?;
        store.delete(id(4))?;

        assert!(store.load_all()?.is_empty());
        Ok(())
    }

    #[test]
    fn writes_leave_no_temp_files_behind() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let root = temp.path().join("checkpoints");
        let store = CheckpointStore::new(&root);
        store.save(id(5), b"payload")?;

        let names: Vec<String> = fs::read_dir(&root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.resume", id(5))]);
        Ok(())
    }

    #[test]
    fn session_store_round_trips_and_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = SessionStateStore::new(temp.path().join("state").join("session.state"));

        assert!(store.load()?.is_none(), "absent blob means defaults");

        store.save(b"engine-settings")?;
        assert_eq!(store.load()?, Some(b"engine-settings".to_vec()));

        store.save(b"engine-settings-v2")?;
        assert_eq!(store.load()?, Some(b"engine-settings-v2".to_vec()));
        Ok(())
    }
}
