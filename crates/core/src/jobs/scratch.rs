//! Per-job scratch directories.

use std::io;
use std::path::Path;

use tempfile::TempDir;

/// A directory private to one job attempt, removed when closed or dropped.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn create(root: &Path, job_id: &str) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job_id))
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory, surfacing any error that drop would swallow.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
