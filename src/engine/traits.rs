//! engine::traits
//!
//! Collaborators the orchestrator drives.
//!
//! # Design
//!
//! The orchestrator decides *when* a project is compiled, loaded or
//! unloaded; collaborators decide *how*. Every collaborator is synchronous
//! and takes `&self`, so one runtime value can implement several of them.
//!
//! The two artifact operations on [`ProjectStore`] default to `std::fs`.
//! Stores that keep projects somewhere else override them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::CollaboratorError;
use super::feedback::FeedbackSink;
use crate::core::dependency::DependencyDecl;
use crate::core::project::{Instance, Project};
use crate::core::types::ProjectName;

/// Compiles a project's source tree.
pub trait Compiler {
    /// Compile `project` into `project.bin_dir()`.
    ///
    /// Diagnostics go to `feedback.compiler_output`.
    fn compile(
        &self,
        project: &Project,
        feedback: &mut dyn FeedbackSink,
    ) -> Result<(), CollaboratorError>;
}

/// Instantiates compiled binaries.
pub trait Loader {
    /// Load `project` from `project.bin_dir()`.
    fn load(&self, project: &Project) -> Result<Box<dyn Instance>, CollaboratorError>;
}

/// Tears down a running instance.
pub trait Unloader {
    /// Tear down `instance`. The project counts as unloaded afterwards even
    /// if this fails.
    fn unload(
        &self,
        project: &Project,
        instance: Box<dyn Instance>,
        feedback: &mut dyn FeedbackSink,
    ) -> Result<(), CollaboratorError>;
}

/// Reads dependency declarations.
pub trait DependencyResolver {
    /// Dependencies recorded in the compiled binaries.
    fn compiled_dependencies(&self, project: &Project)
        -> Result<Vec<DependencyDecl>, CollaboratorError>;

    /// Dependencies declared by the current source tree.
    fn source_dependencies(&self, project: &Project)
        -> Result<Vec<DependencyDecl>, CollaboratorError>;
}

/// A project directory found by a [`ProjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProject {
    pub name: ProjectName,
    pub dir: PathBuf,
}

/// Where projects live.
pub trait ProjectStore {
    /// Every project directory that is not ignored.
    fn discover(&self) -> Result<Vec<DiscoveredProject>, CollaboratorError>;

    /// The directory of a single project, if it exists and is not ignored.
    fn find(&self, name: &ProjectName) -> Result<Option<PathBuf>, CollaboratorError>;

    /// Check if the project's directory still exists.
    fn exists(&self, project: &Project) -> bool;

    /// Remove a binary directory. Missing directories are not an error.
    fn remove_artifacts(&self, dir: &Path) -> io::Result<()> {
        match fs::remove_dir_all(dir) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Move a binary directory.
    fn rename_artifacts(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// The full set of collaborators a manager needs.
pub struct Collaborators {
    pub compiler: Box<dyn Compiler>,
    pub loader: Box<dyn Loader>,
    pub unloader: Box<dyn Unloader>,
    pub resolver: Box<dyn DependencyResolver>,
    pub store: Box<dyn ProjectStore>,
}

impl Collaborators {
    /// Use one runtime value for compiling, loading, unloading and
    /// resolving.
    pub fn from_runtime<R>(runtime: R, store: impl ProjectStore + 'static) -> Self
    where
        R: Compiler + Loader + Unloader + DependencyResolver + Clone + 'static,
    {
        Self {
            compiler: Box::new(runtime.clone()),
            loader: Box::new(runtime.clone()),
            unloader: Box::new(runtime.clone()),
            resolver: Box::new(runtime),
            store: Box::new(store),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
