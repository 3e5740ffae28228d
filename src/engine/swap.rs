//! engine::swap
//!
//! The artifact swap protocol.
//!
//! A recompile compiles into the side location while the running instance
//! keeps using the default location. Once the instance is gone, the new
//! binaries are committed:
//!
//! 1. remove the default location (if present)
//! 2. rename the side location to the default location
//!
//! # Invariants
//!
//! - After [`swap`] or [`discard`] the project is `Stable`, whatever happened
//!   on disk
//! - A failure between the two steps leaves the project without binaries.
//!   This is reported as a [`SwapFailure`] and never recovered silently.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::ProjectError;
use super::traits::ProjectStore;
use crate::core::project::Project;
use crate::core::types::ProjectName;

/// A step of the swap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStep {
    /// Removing leftovers from the side location before compiling.
    ClearSide,
    /// Removing the previous binaries.
    RemoveDefault,
    /// Moving the new binaries into place.
    RenameSide,
}

impl fmt::Display for SwapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwapStep::ClearSide => "clear the stale side binary directory",
            SwapStep::RemoveDefault => "remove the previous binary directory",
            SwapStep::RenameSide => "move the new binary directory into place",
        };
        f.write_str(s)
    }
}

/// A failed swap step.
#[derive(Debug, Error)]
#[error("failed to {step}: {source}")]
pub struct SwapFailure {
    pub step: SwapStep,
    pub source: io::Error,
}

impl SwapFailure {
    /// Attribute the failure to `project`.
    pub fn into_project_error(self, project: &ProjectName) -> ProjectError {
        ProjectError::Swap {
            project: project.clone(),
            step: self.step,
            message: self.source.to_string(),
        }
    }
}

/// Switch the project to `Pending`, clearing anything left in the side
/// location by an earlier interrupted run.
pub fn begin(project: &mut Project, store: &dyn ProjectStore) -> Result<(), SwapFailure> {
    store
        .remove_artifacts(project.paths().side_bin_dir())
        .map_err(|source| SwapFailure {
            step: SwapStep::ClearSide,
            source,
        })?;
    project.begin_pending();
    Ok(())
}

/// Commit the side location into the default location.
///
/// Cached compiled dependencies are dropped, since they describe the
/// binaries that were just replaced. Does nothing if no swap is pending.
pub fn swap(project: &mut Project, store: &dyn ProjectStore) -> Result<(), SwapFailure> {
    let Some(side) = project.settle() else {
        return Ok(());
    };
    project.clear_dependencies();

    let default = project.paths().bin_dir();
    store
        .remove_artifacts(default)
        .map_err(|source| SwapFailure {
            step: SwapStep::RemoveDefault,
            source,
        })?;
    store
        .rename_artifacts(&side, default)
        .map_err(|source| SwapFailure {
            step: SwapStep::RenameSide,
            source,
        })?;

    tracing::debug!(project = %project.name(), "committed new binaries");
    Ok(())
}

/// Abandon a pending swap and remove whatever was written to the side
/// location.
pub fn discard(project: &mut Project, store: &dyn ProjectStore) {
    if let Some(side) = project.settle() {
        if let Err(e) = store.remove_artifacts(&side) {
            tracing::warn!(
                project = %project.name(),
                path = %side.display(),
                "failed to remove side binaries: {e}"
            );
        }
    }
}
