//! engine::batch
//!
//! Batch operations over every managed project.
//!
//! # Architecture
//!
//! Each batch builds a fresh [`DependencyGraph`] over the projects it acts
//! on, marks cycle members and their dependents as errors, then walks the
//! graph in dependency order calling one collaborator per project. A
//! failure never aborts the batch: it is reported to the sink and the walk
//! prunes everything that transitively depends on the failed project.
//!
//! # Invariants
//!
//! - Results hold names only; `loaded` and `errors` are always disjoint
//! - Every pruned project is reported with the root cause that pruned it
//! - Nothing is loaded before all of its dependencies
//!
//! # Example
//!
//! ```
//! use reloadkit::core::config::Config;
//! use reloadkit::core::dependency::DependencyDecl;
//! use reloadkit::engine::feedback::CollectedFeedback;
//! use reloadkit::engine::mock::{MemoryStore, MockRuntime};
//! use reloadkit::engine::{Collaborators, ProjectManager};
//!
//! let runtime = MockRuntime::new();
//! let store = MemoryStore::new();
//! store.add("a");
//! store.add("b");
//! runtime.set_dependencies("b", [DependencyDecl::project("a")]);
//! runtime.fail_load("a", "corrupt binaries");
//!
//! let mut manager = ProjectManager::new(
//!     Config::default(),
//!     Collaborators::from_runtime(runtime, store),
//! );
//! manager.add_projects_from_store().unwrap();
//!
//! let mut feedback = CollectedFeedback::new();
//! let result = manager.load_all(&mut feedback);
//! assert!(result.loaded.is_empty());
//! assert_eq!(result.errors.len(), 2);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::builder::{DependencySource, GraphBuilder};
use super::error::{ProjectError, Stage};
use super::feedback::FeedbackSink;
use super::manager::ProjectManager;
use super::swap;
use crate::core::graph::{DependencyGraph, Traversal};
use crate::core::types::ProjectName;

/// Outcome of [`ProjectManager::load_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadAllResult {
    pub loaded: BTreeSet<ProjectName>,
    pub errors: BTreeSet<ProjectName>,
}

/// Outcome of [`ProjectManager::recompile_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecompileAllResult {
    /// Newly discovered projects.
    pub added: BTreeSet<ProjectName>,
    /// Projects dropped because their directory is gone.
    pub removed: BTreeSet<ProjectName>,
    /// Projects whose new binaries compiled.
    pub compiled: BTreeSet<ProjectName>,
    /// Projects unloaded by the stop-the-world pass.
    pub unloaded: BTreeSet<ProjectName>,
    /// Projects running freshly compiled and swapped binaries. Disjoint from
    /// `errors`.
    pub loaded: BTreeSet<ProjectName>,
    /// Projects that failed at any stage.
    pub errors: BTreeSet<ProjectName>,
    /// Error projects that were loaded anyway, from their previous binaries
    /// or from whatever a failed swap left in place.
    pub stale_loaded: BTreeSet<ProjectName>,
}

/// Failures of one batch stage: reports them and remembers who failed.
struct Failures<'s> {
    sink: &'s mut dyn FeedbackSink,
    stage: Stage,
    projects: BTreeSet<ProjectName>,
}

impl<'s> Failures<'s> {
    fn new(sink: &'s mut dyn FeedbackSink, stage: Stage) -> Self {
        Self {
            sink,
            stage,
            projects: BTreeSet::new(),
        }
    }

    fn report(&mut self, error: ProjectError) {
        if let Some(project) = error.project() {
            self.projects.insert(project.clone());
        }
        tracing::warn!(stage = %self.stage, "{error}");
        self.sink.report(self.stage, error);
    }

    fn mark(&mut self, project: &ProjectName) {
        self.projects.insert(project.clone());
    }

    fn contains(&self, project: &ProjectName) -> bool {
        self.projects.contains(project)
    }

    fn sink(&mut self) -> &mut dyn FeedbackSink {
        &mut *self.sink
    }

    fn into_projects(self) -> BTreeSet<ProjectName> {
        self.projects
    }

    /// Report cycle members, their dependents, and self-dependencies.
    fn report_cycles(&mut self, graph: &DependencyGraph<ProjectName>) {
        for members in graph.cycles() {
            if members.len() > 1 {
                for project in &members {
                    self.report(ProjectError::Cycle {
                        project: project.clone(),
                        members: members.clone(),
                    });
                }
                let Some(first) = members.iter().next() else {
                    continue;
                };
                for project in graph.get_ancestors(first) {
                    if !members.contains(&project) {
                        self.report(ProjectError::CycleDependent {
                            project,
                            members: members.clone(),
                        });
                    }
                }
            } else if let Some(project) = members.into_iter().next() {
                self.report(ProjectError::SelfDependency { project });
            }
        }
    }

    /// Prune the current node's dependents from the walk, naming it as root.
    fn propagate(&mut self, walk: &mut Traversal<'_, ProjectName>) {
        let mut removed = walk.remove_ancestors().into_iter();
        let Some(root) = removed.next() else {
            return;
        };
        for project in removed {
            self.report(ProjectError::DependencyFailed {
                project,
                root: root.clone(),
                stage: self.stage,
            });
        }
    }
}

impl ProjectManager {
    /// Load every unloaded, enabled project in dependency order.
    pub fn load_all(&mut self, sink: &mut dyn FeedbackSink) -> LoadAllResult {
        let selected: BTreeSet<ProjectName> = self
            .registry
            .names_where(|p| !p.is_loaded() && !p.is_disabled())
            .into_iter()
            .collect();
        let mut failures = Failures::new(sink, Stage::Load);

        let build = match GraphBuilder::new(&mut self.registry, self.collaborators.resolver.as_ref())
            .build(&selected, DependencySource::Compiled)
        {
            Ok(build) => build,
            Err(e) => {
                failures.report(e);
                return LoadAllResult {
                    loaded: BTreeSet::new(),
                    errors: failures.into_projects(),
                };
            }
        };
        for error in build.errors {
            failures.report(error);
        }
        failures.report_cycles(&build.graph);

        let mut loaded = BTreeSet::new();
        let mut walk = build.graph.child_before_parent();
        while let Some(name) = walk.next() {
            let mut failed = failures.contains(&name);
            if !failed {
                match self.load(name.as_str()) {
                    Ok(()) => {
                        loaded.insert(name);
                    }
                    Err(e) => {
                        failures.report(e);
                        failures.mark(&name);
                        failed = true;
                    }
                }
            }
            if failed {
                failures.propagate(&mut walk);
            }
        }

        let errors = failures.into_projects();
        tracing::info!(loaded = loaded.len(), errors = errors.len(), "load all finished");
        LoadAllResult { loaded, errors }
    }

    /// Unload every loaded project, dependents before dependencies.
    ///
    /// Resolution errors are reported but never block unloading.
    pub fn unload_all(&mut self, sink: &mut dyn FeedbackSink) -> BTreeSet<ProjectName> {
        let selected: BTreeSet<ProjectName> = self.registry.loaded_names().into_iter().collect();

        let graph = match GraphBuilder::new(&mut self.registry, self.collaborators.resolver.as_ref())
            .build(&selected, DependencySource::Compiled)
        {
            Ok(build) => {
                for error in build.errors {
                    sink.report(Stage::Unload, error);
                }
                build.graph
            }
            Err(e) => {
                sink.report(Stage::Unload, e);
                DependencyGraph::from_nodes(selected.iter().cloned())
            }
        };
        // Loading never lets a cycle through.
        debug_assert!(graph.cycles().is_empty(), "loaded projects form a cycle");

        let mut unloaded = BTreeSet::new();
        for name in graph.parent_before_child() {
            if self.unload_instance(&name, sink) {
                unloaded.insert(name);
            }
        }

        tracing::info!(unloaded = unloaded.len(), "unload all finished");
        unloaded
    }

    /// Recompile, unload and reload every enabled project.
    ///
    /// New project directories are registered and compiled in the same pass;
    /// projects whose directory is gone are dropped once unloaded. A project
    /// whose compile or binary swap fails is listed in `errors`; if it still
    /// loads from whatever binaries it has, it is listed in `stale_loaded`.
    ///
    /// # Errors
    ///
    /// Returns `ProjectError::Consistency` without touching anything if a
    /// project still has a binary swap pending.
    pub fn recompile_all(
        &mut self,
        sink: &mut dyn FeedbackSink,
    ) -> Result<RecompileAllResult, ProjectError> {
        if let Some(project) = self.registry.iter().find(|p| !p.artifact().is_stable()) {
            return Err(ProjectError::consistency(
                project.name(),
                format!(
                    "project has a binary swap pending before recompiling: {}",
                    project.name()
                ),
            ));
        }

        let mut selected: BTreeSet<ProjectName> = self
            .registry
            .names_where(|p| !p.is_disabled())
            .into_iter()
            .collect();
        let added = match self.add_projects_from_store() {
            Ok(added) => added,
            Err(e) => {
                tracing::warn!("{e}");
                sink.report(Stage::Compile, e);
                BTreeSet::new()
            }
        };
        selected.extend(added.iter().cloned());

        let (compiled, mut errors) = self.compile_all(&selected, sink)?;

        let unloaded = self.unload_all(sink);
        let removed = self.remove_unloaded_projects_if_deleted();

        let store = self.collaborators.store.as_ref();
        let ready: Vec<ProjectName> = compiled.difference(&errors).cloned().collect();
        for name in ready {
            let Some(project) = self.registry.get_mut(name.as_str()) else {
                continue;
            };
            if let Err(failure) = swap::swap(project, store) {
                let error = failure.into_project_error(&name);
                tracing::warn!("{error}");
                sink.report(Stage::Compile, error);
                errors.insert(name);
            }
        }

        for name in self.registry.names_where(|p| !p.artifact().is_stable()) {
            let error = ProjectError::consistency(
                &name,
                format!("project binaries were not settled after recompiling: {name}"),
            );
            tracing::warn!("{error}");
            sink.report(Stage::Compile, error);
            if let Some(project) = self.registry.get_mut(name.as_str()) {
                swap::discard(project, store);
            }
            errors.insert(name);
        }

        let load_pass = self.load_all(sink);
        errors.extend(load_pass.errors);
        let (stale_loaded, loaded): (BTreeSet<_>, BTreeSet<_>) = load_pass
            .loaded
            .into_iter()
            .partition(|name| errors.contains(name));

        tracing::info!(
            added = added.len(),
            removed = removed.len(),
            compiled = compiled.len(),
            loaded = loaded.len(),
            errors = errors.len(),
            "recompile all finished"
        );
        Ok(RecompileAllResult {
            added,
            removed,
            compiled,
            unloaded,
            loaded,
            errors,
            stale_loaded,
        })
    }

    /// Compile `selected` into their side locations in dependency order.
    ///
    /// Returns the compiled projects and the failed ones.
    fn compile_all(
        &mut self,
        selected: &BTreeSet<ProjectName>,
        sink: &mut dyn FeedbackSink,
    ) -> Result<(BTreeSet<ProjectName>, BTreeSet<ProjectName>), ProjectError> {
        let build = GraphBuilder::new(&mut self.registry, self.collaborators.resolver.as_ref())
            .build(selected, DependencySource::Source)?;

        let mut failures = Failures::new(sink, Stage::Compile);
        for error in build.errors {
            failures.report(error);
        }
        failures.report_cycles(&build.graph);

        let mut compiled = BTreeSet::new();
        let mut walk = build.graph.child_before_parent();
        while let Some(name) = walk.next() {
            let mut failed = failures.contains(&name);
            if !failed {
                match self.compile_to_side(&name, failures.sink()) {
                    Ok(()) => {
                        compiled.insert(name);
                    }
                    Err(e) => {
                        failures.report(e);
                        failures.mark(&name);
                        failed = true;
                    }
                }
            }
            if failed {
                failures.propagate(&mut walk);
            }
        }

        Ok((compiled, failures.into_projects()))
    }

    /// Compile one project into its side location.
    ///
    /// On failure the side location is removed and the project is `Stable`
    /// again.
    pub(crate) fn compile_to_side(
        &mut self,
        name: &ProjectName,
        sink: &mut dyn FeedbackSink,
    ) -> Result<(), ProjectError> {
        let store = self.collaborators.store.as_ref();
        let project = self
            .registry
            .get_mut(name.as_str())
            .ok_or_else(|| ProjectError::UnknownProject(name.to_string()))?;

        swap::begin(project, store).map_err(|failure| failure.into_project_error(name))?;
        if let Err(e) = self.collaborators.compiler.compile(project, sink) {
            swap::discard(project, store);
            return Err(ProjectError::Compile {
                project: name.clone(),
                message: e.message,
            });
        }

        tracing::debug!(project = %name, "compiled project");
        Ok(())
    }
}
