//! Job-scoped temporary file lifecycle
//!
//! Every temporary path a job creates is registered here; the registry
//! removes whatever is still present when it drops, on every exit path
//! (success, validation failure, provider failure). This replaces
//! per-site cleanup calls scattered across success and failure
//! branches.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Per-job registry of temporary paths.
#[derive(Debug)]
pub struct JobScratch {
    job_id: Uuid,
    paths: Vec<PathBuf>,
}

impl JobScratch {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            paths: Vec::new(),
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Register a path for cleanup when the job ends.
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Release a path from cleanup, typically after it was promoted to
    /// a permanent artifact.
    pub fn release(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }
}

impl Drop for JobScratch {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(job_id = %self.job_id, path = %path.display(), "removed scratch file");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        job_id = %self.job_id,
                        path = %path.display(),
                        error = %e,
                        "failed to remove scratch file"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_registered_files_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intermediate.wav");
        std::fs::write(&path, b"pcm").unwrap();

        let mut scratch = JobScratch::new(Uuid::new_v4());
        scratch.register(&path);
        drop(scratch);

        assert!(!path.exists());
    }

    #[test]
    fn released_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.wav");
        std::fs::write(&path, b"pcm").unwrap();

        let mut scratch = JobScratch::new(Uuid::new_v4());
        scratch.register(&path);
        scratch.release(&path);
        drop(scratch);

        assert!(path.exists());
    }

    #[test]
    fn missing_files_are_ignored() {
        let mut scratch = JobScratch::new(Uuid::new_v4());
        scratch.register("/nonexistent/never-created.wav");
        drop(scratch); // must not panic
    }
}
