//! Per-run temporary workspace
//!
//! Holds the downloaded archive and the extraction staging area. Dropping
//! the workspace deletes it, so every exit path of a run releases it;
//! [`Workspace::close`] does the same but reports failures.

use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempDir;

use super::InstallerError;

const WORKSPACE_PREFIX: &str = "mintas-install-";

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a workspace under the system temp directory, or under `root`
    pub fn create(root: Option<&Path>) -> Result<Self, InstallerError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => std::fs::create_dir_all(root).and_then(|()| builder.tempdir_in(root)),
            None => builder.tempdir(),
        }
        .map_err(|e| InstallerError::Workspace(format!("cannot create workspace: {e}")))?;

        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Destination for the downloaded archive
    pub fn archive_path(&self, filename: &str) -> PathBuf {
        self.dir.path().join(filename)
    }

    /// Directory the archive is unpacked into
    pub fn staging_dir(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    /// Delete the workspace now, surfacing any I/O error
    pub fn close(self) -> std::io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!("Removed workspace {}", path.display());
        Ok(())
    }
}
