//! Artifact persistence
//!
//! Each artifact is a single encoded audio file named by a fresh unique
//! identifier, stored under one flat directory. There is no database or
//! index; discovery is solely by the identifier returned to the caller.

use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use voxcard_core::{Artifact, AudioEncoding, StorageError};

use crate::scratch::JobScratch;

pub struct ArtifactStore {
    dir: PathBuf,
    public_base: Option<String>,
}

impl ArtifactStore {
    /// Create the store, ensuring the audio directory exists.
    pub fn new(dir: impl Into<PathBuf>, public_base: Option<String>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir,
            public_base: public_base.map(|b| b.trim_end_matches('/').to_string()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist encoded bytes as `{id}.{ext}`.
    ///
    /// Written through a scratch-registered part file and renamed into
    /// place, so a failed write leaves nothing behind and a reader can
    /// never observe a half-written artifact.
    pub async fn store(
        &self,
        scratch: &mut JobScratch,
        id: Uuid,
        bytes: &[u8],
        encoding: AudioEncoding,
    ) -> Result<Artifact, StorageError> {
        let file_name = format!("{}.{}", id, encoding.extension());
        let final_path = self.dir.join(&file_name);
        let part_path = self.dir.join(format!("{}.part", file_name));

        scratch.register(&part_path);
        tokio::fs::write(&part_path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                path: part_path.display().to_string(),
                source,
            })?;
        tokio::fs::rename(&part_path, &final_path)
            .await
            .map_err(|source| StorageError::Write {
                path: final_path.display().to_string(),
                source,
            })?;
        scratch.release(&part_path);

        tracing::info!(artifact = %file_name, bytes = bytes.len(), "artifact stored");

        Ok(Artifact {
            id,
            file_name,
            path: final_path,
            encoding,
            created_at: Utc::now(),
        })
    }

    /// URL callers retrieve the artifact from. Relative unless a public
    /// base is configured.
    pub fn public_url(&self, artifact: &Artifact) -> String {
        match &self.public_base {
            Some(base) => format!("{}/static/audio/{}", base, artifact.file_name),
            None => format!("/static/audio/{}", artifact.file_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_under_uuid_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), None).unwrap();
        let id = Uuid::new_v4();
        let mut scratch = JobScratch::new(id);

        let artifact = store
            .store(&mut scratch, id, b"bytes", AudioEncoding::Wav)
            .await
            .unwrap();

        assert_eq!(artifact.file_name, format!("{}.wav", id));
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"bytes");
        // no part file left behind
        drop(scratch);
        assert!(artifact.path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn url_joins_public_base() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            ArtifactStore::new(dir.path(), Some("http://localhost:5000/".to_string())).unwrap();
        let id = Uuid::new_v4();
        let mut scratch = JobScratch::new(id);
        let artifact = store
            .store(&mut scratch, id, b"x", AudioEncoding::Mp3)
            .await
            .unwrap();

        assert_eq!(
            store.public_url(&artifact),
            format!("http://localhost:5000/static/audio/{}.mp3", id)
        );
    }

    #[tokio::test]
    async fn failed_write_leaves_no_partial_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), None).unwrap();
        // remove the directory out from under the store to force a failure
        std::fs::remove_dir_all(dir.path()).unwrap();

        let id = Uuid::new_v4();
        let mut scratch = JobScratch::new(id);
        let result = store
            .store(&mut scratch, id, b"x", AudioEncoding::Wav)
            .await;
        assert!(result.is_err());
    }
}
