//! engine::error
//!
//! Errors raised while orchestrating projects.
//!
//! Batch operations report these through a
//! [`FeedbackSink`](super::feedback::FeedbackSink) together with the
//! [`Stage`] they occurred in; single-project operations return exactly one.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::swap::SwapStep;
use crate::core::registry::RegistryError;
use crate::core::types::ProjectName;

/// The phase of a batch operation an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Compile,
    Unload,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Compile => "compile",
            Stage::Unload => "unload",
            Stage::Load => "load",
        };
        f.write_str(s)
    }
}

/// Error returned by an external collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    pub message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// A failure attributed to a project (or to the operation as a whole).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectError {
    /// Dependencies could not be resolved.
    #[error("{message}")]
    Resolution {
        project: Option<ProjectName>,
        message: String,
    },

    /// The project is a member of a dependency cycle.
    #[error("circular dependency detected including projects: {}", join(members))]
    Cycle {
        project: ProjectName,
        members: BTreeSet<ProjectName>,
    },

    /// The project depends on a dependency cycle it is not part of.
    #[error(
        "project depends directly or indirectly on (but is not part of) a circular dependency including projects: {}",
        join(members)
    )]
    CycleDependent {
        project: ProjectName,
        members: BTreeSet<ProjectName>,
    },

    /// The project lists itself as a dependency.
    #[error("project depends on itself (circular dependency): {project}")]
    SelfDependency { project: ProjectName },

    /// A direct or indirect dependency failed earlier in the same batch.
    #[error("{}: {root}", dependency_failed_prefix(*stage))]
    DependencyFailed {
        project: ProjectName,
        root: ProjectName,
        stage: Stage,
    },

    #[error("failed to compile project '{project}': {message}")]
    Compile { project: ProjectName, message: String },

    #[error("failed to load project '{project}': {message}")]
    Load { project: ProjectName, message: String },

    #[error("failed to unload project '{project}': {message}")]
    Unload { project: ProjectName, message: String },

    /// The operation requires that no loaded project depends on this one.
    #[error("loaded projects depend on project '{project}': {}", join(dependents))]
    DependencyOrder {
        project: ProjectName,
        dependents: BTreeSet<ProjectName>,
    },

    /// Committing new binaries failed; the project may have no binaries left.
    #[error("failed to {step} for project '{project}': {message}")]
    Swap {
        project: ProjectName,
        step: SwapStep,
        message: String,
    },

    /// An internal state invariant did not hold.
    #[error("{message}")]
    Consistency {
        project: Option<ProjectName>,
        message: String,
    },

    /// Listing the projects directory failed.
    #[error("failed to discover projects: {0}")]
    Discovery(String),

    #[error("project does not exist in the project registry: {0}")]
    UnknownProject(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ProjectError {
    /// The project this error is attributed to, if any.
    pub fn project(&self) -> Option<&ProjectName> {
        match self {
            ProjectError::Resolution { project, .. } | ProjectError::Consistency { project, .. } => {
                project.as_ref()
            }
            ProjectError::Cycle { project, .. }
            | ProjectError::CycleDependent { project, .. }
            | ProjectError::SelfDependency { project }
            | ProjectError::DependencyFailed { project, .. }
            | ProjectError::Compile { project, .. }
            | ProjectError::Load { project, .. }
            | ProjectError::Unload { project, .. }
            | ProjectError::DependencyOrder { project, .. }
            | ProjectError::Swap { project, .. } => Some(project),
            ProjectError::Registry(
                RegistryError::ForeignProject(project) | RegistryError::ProjectLoaded(project),
            ) => Some(project),
            ProjectError::Discovery(_) | ProjectError::UnknownProject(_) => None,
        }
    }

    pub(crate) fn consistency(project: &ProjectName, message: impl Into<String>) -> Self {
        ProjectError::Consistency {
            project: Some(project.clone()),
            message: message.into(),
        }
    }
}

fn dependency_failed_prefix(stage: Stage) -> &'static str {
    match stage {
        Stage::Compile => "indirect or direct dependency project was not successfully compiled",
        // Unload batches never prune; only host-built errors reach this arm.
        Stage::Unload => "indirect or direct dependency project could not be unloaded",
        Stage::Load => "indirect or direct dependency project could not be loaded",
    }
}

fn join(names: &BTreeSet<ProjectName>) -> String {
    names
        .iter()
        .map(ProjectName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
