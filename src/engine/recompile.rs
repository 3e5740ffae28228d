//! engine::recompile
//!
//! Recompiling one project in place.
//!
//! # Protocol
//!
//! 1. Refuse if loaded projects depend on the project
//! 2. Compile into the side location (the running instance is untouched)
//! 3. Unload the running instance, if any
//! 4. Swap the new binaries into the default location
//! 5. Load from the new binaries
//!
//! A compile failure leaves everything as it was. Failures after step 2
//! leave the project unloaded.

use super::error::ProjectError;
use super::feedback::FeedbackSink;
use super::manager::{load_error, ProjectManager};
use super::swap;

impl ProjectManager {
    /// Recompile `name` and reload it from the new binaries.
    ///
    /// # Errors
    ///
    /// - `UnknownProject` if not registered
    /// - `DependencyOrder` if loaded projects depend on it
    /// - `Compile` if compiling failed; a loaded instance keeps running
    /// - `Consistency` if tearing down the running instance failed
    /// - `Swap` if the new binaries could not be moved into place
    /// - `Load` if loading the new binaries failed
    pub fn recompile(
        &mut self,
        name: &str,
        sink: &mut dyn FeedbackSink,
    ) -> Result<(), ProjectError> {
        let project = self.project_or_err(name)?;
        let pname = project.name().clone();
        if project.is_loaded() {
            let dependents = self.registry.loaded_dependents(name);
            if !dependents.is_empty() {
                return Err(ProjectError::DependencyOrder {
                    project: pname,
                    dependents,
                });
            }
        }

        self.compile_to_side(&pname, sink)?;

        let store = self.collaborators.store.as_ref();
        let project = self
            .registry
            .get_mut(name)
            .ok_or_else(|| ProjectError::UnknownProject(name.to_string()))?;

        if let Some(instance) = project.take_instance() {
            if let Err(e) = self.collaborators.unloader.unload(project, instance, sink) {
                swap::discard(project, store);
                return Err(ProjectError::consistency(
                    &pname,
                    format!("failed to unload project '{pname}' before swapping binaries: {e}"),
                ));
            }
            tracing::debug!(project = %pname, "unloaded project for recompile");
        }

        swap::swap(project, store).map_err(|failure| failure.into_project_error(&pname))?;

        self.load(name).map_err(|e| match e {
            ProjectError::Load { .. } => e,
            other => load_error(&pname, other.to_string()),
        })?;

        tracing::info!(project = %pname, "recompiled project");
        Ok(())
    }
}
