//! store
//!
//! Project discovery on the local filesystem.
//!
//! Every direct subdirectory of the projects directory is a project, named
//! after the directory. A directory is skipped when:
//!
//! - its name ends with the ignore suffix (case-insensitive, `.disabled` by
//!   default)
//! - it contains the ignore marker file (`.ignored` by default)
//! - its name is not a valid [`ProjectName`]
//!
//! Plain files (the projects configuration, the lock file) are never
//! projects.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::DiscoveryConfig;
use crate::core::project::Project;
use crate::core::types::ProjectName;
use crate::engine::error::CollaboratorError;
use crate::engine::traits::{DiscoveredProject, ProjectStore};

/// A [`ProjectStore`] over a directory on disk.
#[derive(Debug, Clone)]
pub struct FsProjectStore {
    root: PathBuf,
    discovery: DiscoveryConfig,
}

impl FsProjectStore {
    pub fn new(root: impl Into<PathBuf>, discovery: DiscoveryConfig) -> Self {
        Self {
            root: root.into(),
            discovery,
        }
    }

    /// The projects directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if `dir` is hidden from discovery.
    pub fn is_ignored(&self, dir: &Path) -> bool {
        let suffix = self.discovery.ignore_suffix().to_lowercase();
        let hidden_by_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.to_lowercase().ends_with(&suffix));
        hidden_by_name || dir.join(self.discovery.ignore_marker()).exists()
    }

    fn candidate(&self, dir: PathBuf) -> Option<DiscoveredProject> {
        if !dir.is_dir() || self.is_ignored(&dir) {
            return None;
        }
        let name = dir.file_name()?.to_str()?;
        match ProjectName::new(name) {
            Ok(name) => Some(DiscoveredProject { name, dir }),
            Err(e) => {
                tracing::debug!(path = %dir.display(), "skipping directory: {e}");
                None
            }
        }
    }
}

impl ProjectStore for FsProjectStore {
    fn discover(&self) -> Result<Vec<DiscoveredProject>, CollaboratorError> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            CollaboratorError::new(format!("cannot read {}: {e}", self.root.display()))
        })?;

        let mut found = Vec::new();
        for entry in entries {
            if let Some(project) = self.candidate(entry?.path()) {
                found.push(project);
            }
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!(root = %self.root.display(), count = found.len(), "discovered projects");
        Ok(found)
    }

    fn find(&self, name: &ProjectName) -> Result<Option<PathBuf>, CollaboratorError> {
        Ok(self
            .candidate(self.root.join(name.as_str()))
            .map(|project| project.dir))
    }

    fn exists(&self, project: &Project) -> bool {
        project.project_dir().is_dir()
    }
}
