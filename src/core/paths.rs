//! core::paths
//!
//! Centralized path routing for project storage locations.
//!
//! # Storage Layout
//!
//! Every project lives in its own directory inside the projects directory:
//! - `<project>/src` - Source tree (layout `source_dir`)
//! - `<project>/bin` - Default binary location (layout `bin_dir`)
//! - `<project>/bin_new` - Side location used while a recompile is pending
//!   (layout `side_bin_dir`)
//!
//! The projects directory itself holds:
//! - `reloadkit.toml` - Projects-directory configuration
//! - `.reloadkit.lock` - Exclusive lock file
//!
//! **Hard rule:** No code may join layout names onto a project directory by
//! hand. All paths go through `ProjectPaths`.
//!
//! # Example
//!
//! ```
//! use reloadkit::core::config::LayoutConfig;
//! use reloadkit::core::paths::ProjectPaths;
//! use std::path::PathBuf;
//!
//! let paths = ProjectPaths::new(PathBuf::from("/srv/projects/economy"), &LayoutConfig::default());
//!
//! assert_eq!(paths.bin_dir(), PathBuf::from("/srv/projects/economy/bin"));
//! assert_eq!(paths.side_bin_dir(), PathBuf::from("/srv/projects/economy/bin_new"));
//! ```

use std::path::{Path, PathBuf};

use crate::core::config::LayoutConfig;

/// File name of the projects-directory configuration.
pub const PROJECTS_CONFIG_FILE: &str = "reloadkit.toml";

/// File name of the projects-directory lock.
pub const LOCK_FILE: &str = ".reloadkit.lock";

/// Path routing for a single project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    project_dir: PathBuf,
    source_dir: PathBuf,
    bin_dir: PathBuf,
    side_bin_dir: PathBuf,
}

impl ProjectPaths {
    /// Compute the paths of a project from its directory and the layout.
    pub fn new(project_dir: PathBuf, layout: &LayoutConfig) -> Self {
        Self {
            source_dir: project_dir.join(layout.source_dir()),
            bin_dir: project_dir.join(layout.bin_dir()),
            side_bin_dir: project_dir.join(layout.side_bin_dir()),
            project_dir,
        }
    }

    /// The project directory.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// The source tree.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// The default binary location.
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// The side binary location used while a recompile is pending.
    pub fn side_bin_dir(&self) -> &Path {
        &self.side_bin_dir
    }
}

/// Path of the configuration file inside a projects directory.
pub fn projects_config_path(projects_dir: &Path) -> PathBuf {
    projects_dir.join(PROJECTS_CONFIG_FILE)
}

/// Path of the lock file inside a projects directory.
pub fn lock_path(projects_dir: &Path) -> PathBuf {
    projects_dir.join(LOCK_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let paths = ProjectPaths::new(PathBuf::from("/p/economy"), &LayoutConfig::default());
        assert_eq!(paths.project_dir(), Path::new("/p/economy"));
        assert_eq!(paths.source_dir(), Path::new("/p/economy/src"));
        assert_eq!(paths.bin_dir(), Path::new("/p/economy/bin"));
        assert_eq!(paths.side_bin_dir(), Path::new("/p/economy/bin_new"));
    }

    #[test]
    fn custom_layout() {
        let layout = LayoutConfig {
            source_dir: Some("java".into()),
            bin_dir: Some("out".into()),
            side_bin_dir: Some("out.next".into()),
        };
        let paths = ProjectPaths::new(PathBuf::from("/p/x"), &layout);
        assert_eq!(paths.source_dir(), Path::new("/p/x/java"));
        assert_eq!(paths.bin_dir(), Path::new("/p/x/out"));
        assert_eq!(paths.side_bin_dir(), Path::new("/p/x/out.next"));
    }

    #[test]
    fn projects_dir_files() {
        let dir = Path::new("/srv/projects");
        assert_eq!(
            projects_config_path(dir),
            PathBuf::from("/srv/projects/reloadkit.toml")
        );
        assert_eq!(lock_path(dir), PathBuf::from("/srv/projects/.reloadkit.lock"));
    }
}
