//! core::project
//!
//! A managed project and its per-project state.
//!
//! # State
//!
//! - Lifecycle: derived from whether an [`Instance`] is attached, so a
//!   project can never claim to be loaded without a running instance.
//! - Artifact: [`ArtifactState::Stable`] while binaries live in the default
//!   location, [`ArtifactState::Pending`] while a recompile writes new
//!   binaries to the side location.
//! - Dependencies: `None` until resolved; cached after the first resolution
//!   from compiled metadata and dropped whenever new binaries are committed.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};

use super::dependency::Dependency;
use super::paths::ProjectPaths;
use super::types::{LifecycleState, ProjectName, RegistryId};

/// A running unit produced by a [`Loader`](crate::engine::traits::Loader).
pub trait Instance: fmt::Debug {
    /// Access the concrete instance, for hosts that need to downcast.
    fn as_any(&self) -> &dyn Any;
}

/// Where a project's binaries currently live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    /// Binaries are in the default location.
    Stable,
    /// New binaries are being produced in the side location.
    Pending {
        /// The side location.
        side: PathBuf,
    },
}

impl ArtifactState {
    /// Check if binaries are in the default location.
    pub fn is_stable(&self) -> bool {
        matches!(self, ArtifactState::Stable)
    }
}

/// A managed project.
pub struct Project {
    name: ProjectName,
    registry: RegistryId,
    paths: ProjectPaths,
    artifact: ArtifactState,
    dependencies: Option<Vec<Dependency>>,
    disabled: bool,
    instance: Option<Box<dyn Instance>>,
}

impl Project {
    /// Create an unloaded project owned by `registry`.
    pub fn new(name: ProjectName, paths: ProjectPaths, registry: RegistryId) -> Self {
        Self {
            name,
            registry,
            paths,
            artifact: ArtifactState::Stable,
            dependencies: None,
            disabled: false,
            instance: None,
        }
    }

    /// The project name.
    pub fn name(&self) -> &ProjectName {
        &self.name
    }

    /// The registry that owns this project.
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    /// Path routing for this project.
    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// The project directory.
    pub fn project_dir(&self) -> &Path {
        self.paths.project_dir()
    }

    /// The source tree.
    pub fn source_dir(&self) -> &Path {
        self.paths.source_dir()
    }

    /// The binary location matching the current artifact state.
    ///
    /// Compilers write here.
    pub fn bin_dir(&self) -> &Path {
        match &self.artifact {
            ArtifactState::Stable => self.paths.bin_dir(),
            ArtifactState::Pending { side } => side,
        }
    }

    /// The artifact state.
    pub fn artifact(&self) -> &ArtifactState {
        &self.artifact
    }

    /// The lifecycle state.
    pub fn state(&self) -> LifecycleState {
        if self.instance.is_some() {
            LifecycleState::Loaded
        } else {
            LifecycleState::Unloaded
        }
    }

    /// Check if the project is loaded.
    pub fn is_loaded(&self) -> bool {
        self.instance.is_some()
    }

    /// Check if the project is disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Enable or disable the project. Disabled projects are skipped by
    /// batch operations.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// The resolved dependencies, or `None` if not resolved yet.
    pub fn dependencies(&self) -> Option<&[Dependency]> {
        self.dependencies.as_deref()
    }

    /// The running instance, if loaded.
    pub fn instance(&self) -> Option<&dyn Instance> {
        self.instance.as_deref()
    }

    pub(crate) fn set_dependencies(&mut self, dependencies: Vec<Dependency>) {
        self.dependencies = Some(dependencies);
    }

    pub(crate) fn clear_dependencies(&mut self) {
        self.dependencies = None;
    }

    pub(crate) fn attach_instance(&mut self, instance: Box<dyn Instance>) {
        self.instance = Some(instance);
    }

    pub(crate) fn take_instance(&mut self) -> Option<Box<dyn Instance>> {
        self.instance.take()
    }

    /// Point the binary location at the side location.
    pub(crate) fn begin_pending(&mut self) -> PathBuf {
        let side = self.paths.side_bin_dir().to_path_buf();
        self.artifact = ArtifactState::Pending { side: side.clone() };
        side
    }

    /// Point the binary location back at the default location.
    ///
    /// Returns the side location if one was pending.
    pub(crate) fn settle(&mut self) -> Option<PathBuf> {
        match std::mem::replace(&mut self.artifact, ArtifactState::Stable) {
            ArtifactState::Pending { side } => Some(side),
            ArtifactState::Stable => None,
        }
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("artifact", &self.artifact)
            .field("disabled", &self.disabled)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LayoutConfig;

    #[derive(Debug)]
    struct Dummy;

    impl Instance for Dummy {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn project() -> Project {
        Project::new(
            ProjectName::new("economy").unwrap(),
            ProjectPaths::new(PathBuf::from("/p/economy"), &LayoutConfig::default()),
            RegistryId::new(),
        )
    }

    #[test]
    fn new_project_is_unloaded_and_stable() {
        let p = project();
        assert_eq!(p.state(), LifecycleState::Unloaded);
        assert!(p.artifact().is_stable());
        assert!(p.dependencies().is_none());
        assert!(!p.is_disabled());
        assert_eq!(p.bin_dir(), Path::new("/p/economy/bin"));
    }

    #[test]
    fn instance_drives_lifecycle() {
        let mut p = project();
        p.attach_instance(Box::new(Dummy));
        assert!(p.is_loaded());
        assert!(p.instance().unwrap().as_any().is::<Dummy>());

        assert!(p.take_instance().is_some());
        assert_eq!(p.state(), LifecycleState::Unloaded);
    }

    #[test]
    fn pending_redirects_bin_dir() {
        let mut p = project();
        let side = p.begin_pending();
        assert_eq!(side, PathBuf::from("/p/economy/bin_new"));
        assert_eq!(p.bin_dir(), Path::new("/p/economy/bin_new"));
        assert!(!p.artifact().is_stable());

        assert_eq!(p.settle(), Some(side));
        assert_eq!(p.bin_dir(), Path::new("/p/economy/bin"));
        assert_eq!(p.settle(), None);
    }

    #[test]
    fn debug_does_not_require_instance_debug_details() {
        let p = project();
        let text = format!("{p:?}");
        assert!(text.contains("economy"));
        assert!(text.contains("Unloaded"));
    }
}
