//! engine::manager
//!
//! The project manager: a registry plus the collaborators that act on it.
//!
//! # Architecture
//!
//! `ProjectManager` owns the [`ProjectRegistry`] and a [`Collaborators`]
//! bundle. This module holds registration and single-project operations;
//! batch operations live in [`batch`](super::batch) and the single-project
//! recompile in [`recompile`](super::recompile).
//!
//! Every mutating operation takes `&mut self`, so two orchestrations can
//! never interleave on one manager. Cross-process exclusion is the host's
//! job (see [`ProjectsLock`](crate::core::lock::ProjectsLock)).
//!
//! # Invariants
//!
//! - A project is loaded only while all of its project dependencies are
//!   loaded
//! - A loaded project is never removed from the registry

use std::collections::BTreeSet;

use super::builder::{resolve_dependencies, DependencySource, GraphBuilder};
use super::error::{ProjectError, Stage};
use super::feedback::FeedbackSink;
use super::traits::Collaborators;
use crate::core::config::Config;
use crate::core::dependency::Dependency;
use crate::core::project::{Instance, Project};
use crate::core::registry::ProjectRegistry;
use crate::core::types::ProjectName;

/// How [`ProjectManager::unload`] treats loaded dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadMethod {
    /// Unload only this project. The caller guarantees no loaded project
    /// depends on it.
    IgnoreDependents,
    /// Unload every loaded project that transitively depends on this one
    /// first.
    UnloadDependents,
    /// Refuse with `ProjectError::DependencyOrder` if any loaded project
    /// depends on this one.
    FailOnLoadedDependents,
}

/// Manages a set of projects.
#[derive(Debug)]
pub struct ProjectManager {
    pub(crate) config: Config,
    pub(crate) registry: ProjectRegistry,
    pub(crate) collaborators: Collaborators,
}

impl ProjectManager {
    /// Create a manager with an empty registry.
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        Self {
            config,
            registry: ProjectRegistry::new(),
            collaborators,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProjectRegistry {
        &mut self.registry
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register every project directory the store knows about that is not
    /// registered yet.
    ///
    /// # Errors
    ///
    /// Returns `ProjectError::Discovery` if the store cannot be listed.
    pub fn add_projects_from_store(&mut self) -> Result<BTreeSet<ProjectName>, ProjectError> {
        let discovered = self
            .collaborators
            .store
            .discover()
            .map_err(|e| ProjectError::Discovery(e.to_string()))?;

        let layout = self.config.layout();
        let mut added = BTreeSet::new();
        for found in discovered {
            if self.registry.contains(found.name.as_str()) {
                continue;
            }
            let project = self
                .registry
                .create_project(found.name.clone(), found.dir, &layout);
            if self.registry.add(project)? {
                added.insert(found.name);
            }
        }

        if !added.is_empty() {
            tracing::info!(count = added.len(), "added projects from store");
        }
        Ok(added)
    }

    /// Register a single project directory by name.
    ///
    /// Returns `None` if the name is invalid, already registered, or not
    /// found in the store.
    pub fn add_project_from_store(
        &mut self,
        name: &str,
    ) -> Result<Option<ProjectName>, ProjectError> {
        let Ok(name) = ProjectName::new(name) else {
            return Ok(None);
        };
        if self.registry.contains(name.as_str()) {
            return Ok(None);
        }
        let Some(dir) = self
            .collaborators
            .store
            .find(&name)
            .map_err(|e| ProjectError::Discovery(e.to_string()))?
        else {
            return Ok(None);
        };

        let project = self
            .registry
            .create_project(name.clone(), dir, &self.config.layout());
        self.registry.add(project)?;
        tracing::debug!(project = %name, "added project from store");
        Ok(Some(name))
    }

    /// Drop every unloaded project whose directory no longer exists.
    pub fn remove_unloaded_projects_if_deleted(&mut self) -> BTreeSet<ProjectName> {
        let store = &self.collaborators.store;
        let removed = self.registry.remove_unloaded_where(|p| !store.exists(p));
        for name in &removed {
            tracing::debug!(project = %name, "removed deleted project");
        }
        removed
    }

    /// Drop one project if it is unloaded and its directory no longer
    /// exists.
    pub fn remove_unloaded_project_if_deleted(&mut self, name: &str) -> Option<ProjectName> {
        let project = self.registry.get(name)?;
        if project.is_loaded() || self.collaborators.store.exists(project) {
            return None;
        }
        let removed = self.registry.remove(name).ok().flatten()?;
        Some(removed.name().clone())
    }

    /// Unload (with dependents) and drop one project if its directory no
    /// longer exists.
    ///
    /// Returns the unloaded projects, dependents first, or `None` if the
    /// project is unknown or still present on disk. An empty list means it
    /// was removed without having been loaded.
    pub fn unload_and_remove_project_if_deleted(
        &mut self,
        name: &str,
        sink: &mut dyn FeedbackSink,
    ) -> Result<Option<Vec<ProjectName>>, ProjectError> {
        let Some(project) = self.registry.get(name) else {
            return Ok(None);
        };
        if self.collaborators.store.exists(project) {
            return Ok(None);
        }

        let unloaded = if project.is_loaded() {
            self.unload(name, UnloadMethod::UnloadDependents, sink)?
        } else {
            Vec::new()
        };
        self.registry.remove(name)?;
        tracing::debug!(project = name, "removed deleted project");
        Ok(Some(unloaded))
    }

    // =========================================================================
    // Single-project lifecycle
    // =========================================================================

    /// Load one project.
    ///
    /// # Errors
    ///
    /// - `UnknownProject` if not registered
    /// - `Load` if already loaded, disabled, a dependency is not loaded, or
    ///   the loader fails
    /// - `Resolution` / `SelfDependency` if its dependencies cannot be
    ///   satisfied at all
    pub fn load(&mut self, name: &str) -> Result<(), ProjectError> {
        let project = self.project_or_err(name)?;
        let pname = project.name().clone();
        if project.is_loaded() {
            return Err(load_error(&pname, "project is already loaded"));
        }
        if project.is_disabled() {
            return Err(load_error(&pname, "project is disabled"));
        }

        let dependencies = resolve_dependencies(
            &mut self.registry,
            self.collaborators.resolver.as_ref(),
            &pname,
            DependencySource::Compiled,
        )?;
        self.check_dependencies_loaded(&pname, &dependencies)?;

        let project = self
            .registry
            .get_mut(name)
            .ok_or_else(|| ProjectError::UnknownProject(name.to_string()))?;
        let instance = self
            .collaborators
            .loader
            .load(project)
            .map_err(|e| load_error(&pname, e.message))?;
        project.attach_instance(instance);

        tracing::debug!(project = %pname, "loaded project");
        Ok(())
    }

    fn check_dependencies_loaded(
        &self,
        project: &ProjectName,
        dependencies: &[Dependency],
    ) -> Result<(), ProjectError> {
        for dep in dependencies.iter().filter_map(Dependency::as_project) {
            if dep.registry() != self.registry.id() {
                return Err(ProjectError::Resolution {
                    project: Some(project.clone()),
                    message: format!(
                        "dependency project is managed by a different project registry: {}",
                        dep.name()
                    ),
                });
            }
            if dep.name() == project.as_str() {
                return Err(ProjectError::SelfDependency {
                    project: project.clone(),
                });
            }
            match self.registry.get(dep.name()) {
                None => {
                    return Err(ProjectError::Resolution {
                        project: Some(project.clone()),
                        message: format!(
                            "dependency project does not exist in the project registry: {}",
                            dep.name()
                        ),
                    })
                }
                Some(target) if !target.is_loaded() => {
                    return Err(load_error(
                        project,
                        format!("dependency project is not loaded: {}", dep.name()),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Unload one project.
    ///
    /// Returns the unloaded projects in unload order (dependents first); an
    /// empty list if the project was not loaded. Unloader failures are
    /// reported to `sink` and the project still ends unloaded.
    ///
    /// # Errors
    ///
    /// - `UnknownProject` if not registered
    /// - `DependencyOrder` with [`UnloadMethod::FailOnLoadedDependents`]
    ///   when loaded projects depend on it
    pub fn unload(
        &mut self,
        name: &str,
        method: UnloadMethod,
        sink: &mut dyn FeedbackSink,
    ) -> Result<Vec<ProjectName>, ProjectError> {
        let project = self.project_or_err(name)?;
        if !project.is_loaded() {
            return Ok(Vec::new());
        }
        let pname = project.name().clone();

        match method {
            UnloadMethod::IgnoreDependents => {}
            UnloadMethod::FailOnLoadedDependents => {
                let dependents = self.registry.loaded_dependents(name);
                if !dependents.is_empty() {
                    return Err(ProjectError::DependencyOrder {
                        project: pname,
                        dependents,
                    });
                }
            }
            UnloadMethod::UnloadDependents => {
                return self.unload_with_dependents(pname, sink);
            }
        }

        self.unload_instance(&pname, sink);
        Ok(vec![pname])
    }

    fn unload_with_dependents(
        &mut self,
        root: ProjectName,
        sink: &mut dyn FeedbackSink,
    ) -> Result<Vec<ProjectName>, ProjectError> {
        let mut closure = BTreeSet::from([root.clone()]);
        let mut frontier = vec![root];
        while let Some(next) = frontier.pop() {
            for dependent in self.registry.loaded_dependents(next.as_str()) {
                if closure.insert(dependent.clone()) {
                    frontier.push(dependent);
                }
            }
        }

        let build = GraphBuilder::new(&mut self.registry, self.collaborators.resolver.as_ref())
            .build(&closure, DependencySource::Compiled)?;
        for error in build.errors {
            sink.report(Stage::Unload, error);
        }

        let mut order = Vec::with_capacity(closure.len());
        for name in build.graph.parent_before_child() {
            if self.unload_instance(&name, sink) {
                order.push(name);
            }
        }
        Ok(order)
    }

    /// Tear down one instance without looking at dependents.
    ///
    /// Returns `false` if the project was not loaded.
    pub(crate) fn unload_instance(&mut self, name: &ProjectName, sink: &mut dyn FeedbackSink) -> bool {
        let Some(project) = self.registry.get_mut(name.as_str()) else {
            return false;
        };
        let Some(instance) = project.take_instance() else {
            return false;
        };

        if let Err(e) = self.collaborators.unloader.unload(project, instance, sink) {
            tracing::warn!(project = %name, "unload failed: {e}");
            sink.report(
                Stage::Unload,
                ProjectError::Unload {
                    project: name.clone(),
                    message: e.message,
                },
            );
        } else {
            tracing::debug!(project = %name, "unloaded project");
        }
        true
    }

    /// Loaded projects that depend directly on `name`.
    pub fn loaded_dependents(&self, name: &str) -> BTreeSet<ProjectName> {
        self.registry.loaded_dependents(name)
    }

    /// Enable or disable a project for batch operations.
    pub fn set_disabled(&mut self, name: &str, disabled: bool) -> Result<(), ProjectError> {
        self.registry
            .get_mut(name)
            .ok_or_else(|| ProjectError::UnknownProject(name.to_string()))?
            .set_disabled(disabled);
        Ok(())
    }

    /// Unload everything and forget every project.
    pub fn clear(&mut self, sink: &mut dyn FeedbackSink) {
        self.unload_all(sink);
        self.registry.clear();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn project(&self, name: &str) -> Option<&Project> {
        self.registry.get(name)
    }

    pub fn instance(&self, name: &str) -> Option<&dyn Instance> {
        self.registry.instance(name)
    }

    pub fn has_project(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    pub fn project_names(&self) -> Vec<ProjectName> {
        self.registry.names()
    }

    pub fn loaded_project_names(&self) -> Vec<ProjectName> {
        self.registry.loaded_names()
    }

    pub fn unloaded_project_names(&self) -> Vec<ProjectName> {
        self.registry.unloaded_names()
    }

    pub(crate) fn project_or_err(&self, name: &str) -> Result<&Project, ProjectError> {
        self.registry
            .get(name)
            .ok_or_else(|| ProjectError::UnknownProject(name.to_string()))
    }
}

pub(crate) fn load_error(project: &ProjectName, message: impl Into<String>) -> ProjectError {
    ProjectError::Load {
        project: project.clone(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dependency::DependencyDecl;
    use crate::engine::feedback::CollectedFeedback;
    use crate::engine::mock::{MemoryStore, MockRuntime};

    fn name(s: &str) -> ProjectName {
        ProjectName::new(s).unwrap()
    }

    fn setup(projects: &[&str]) -> (ProjectManager, MockRuntime, MemoryStore) {
        let runtime = MockRuntime::new();
        let store = MemoryStore::new();
        for p in projects {
            store.add(p);
        }
        let mut manager = ProjectManager::new(
            Config::default(),
            Collaborators::from_runtime(runtime.clone(), store.clone()),
        );
        manager.add_projects_from_store().unwrap();
        (manager, runtime, store)
    }

    mod registration {
        use super::*;

        #[test]
        fn add_from_store_skips_registered() {
            let (mut manager, _, store) = setup(&["a", "b"]);
            assert_eq!(manager.project_names(), vec![name("a"), name("b")]);

            store.add("c");
            let added = manager.add_projects_from_store().unwrap();
            assert_eq!(added, BTreeSet::from([name("c")]));
            assert!(manager.add_projects_from_store().unwrap().is_empty());
        }

        #[test]
        fn add_single_from_store() {
            let (mut manager, _, store) = setup(&[]);
            store.add("x");

            assert_eq!(manager.add_project_from_store("x").unwrap(), Some(name("x")));
            assert_eq!(manager.add_project_from_store("x").unwrap(), None);
            assert_eq!(manager.add_project_from_store("missing").unwrap(), None);
            assert_eq!(manager.add_project_from_store("../x").unwrap(), None);
        }

        #[test]
        fn discovery_failure_is_reported() {
            let (mut manager, _, store) = setup(&[]);
            store.fail_discovery(Some("permission denied"));
            let err = manager.add_projects_from_store().unwrap_err();
            assert_eq!(
                err.to_string(),
                "failed to discover projects: permission denied"
            );
        }

        #[test]
        fn project_dirs_follow_layout() {
            let (manager, _, _) = setup(&["a"]);
            let project = manager.project("a").unwrap();
            assert_eq!(project.project_dir(), std::path::Path::new("/projects/a"));
            assert_eq!(project.bin_dir(), std::path::Path::new("/projects/a/bin"));
        }

        #[test]
        fn remove_deleted_keeps_loaded() {
            let (mut manager, _, store) = setup(&["a", "b"]);
            manager.load("a").unwrap();
            store.delete("a");
            store.delete("b");

            assert_eq!(
                manager.remove_unloaded_projects_if_deleted(),
                BTreeSet::from([name("b")])
            );
            assert!(manager.has_project("a"));
            assert_eq!(manager.remove_unloaded_project_if_deleted("a"), None);
        }

        #[test]
        fn remove_single_deleted() {
            let (mut manager, _, store) = setup(&["a"]);
            assert_eq!(manager.remove_unloaded_project_if_deleted("a"), None);
            store.delete("a");
            assert_eq!(manager.remove_unloaded_project_if_deleted("a"), Some(name("a")));
            assert!(!manager.has_project("a"));
        }

        #[test]
        fn unload_and_remove_deleted_unloads_dependents() {
            let (mut manager, runtime, store) = setup(&["a", "b", "c"]);
            runtime.set_dependencies("b", [DependencyDecl::project("a")]);
            runtime.set_dependencies("c", [DependencyDecl::project("b")]);
            for p in ["a", "b", "c"] {
                manager.load(p).unwrap();
            }
            let mut feedback = CollectedFeedback::new();

            assert_eq!(
                manager
                    .unload_and_remove_project_if_deleted("a", &mut feedback)
                    .unwrap(),
                None
            );

            store.delete("a");
            let unloaded = manager
                .unload_and_remove_project_if_deleted("a", &mut feedback)
                .unwrap()
                .unwrap();
            assert_eq!(unloaded, vec![name("c"), name("b"), name("a")]);
            assert!(!manager.has_project("a"));
            assert!(manager.has_project("b"));
            assert!(manager.loaded_project_names().is_empty());
        }
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn load_requires_loaded_dependencies() {
            let (mut manager, runtime, _) = setup(&["a", "b"]);
            runtime.set_dependencies("b", [DependencyDecl::project("a")]);

            let err = manager.load("b").unwrap_err();
            assert_eq!(
                err.to_string(),
                "failed to load project 'b': dependency project is not loaded: a"
            );

            manager.load("a").unwrap();
            manager.load("b").unwrap();
            assert_eq!(manager.loaded_project_names(), vec![name("a"), name("b")]);
            assert!(manager.instance("b").is_some());
        }

        #[test]
        fn load_rejections() {
            let (mut manager, runtime, _) = setup(&["a", "s", "d"]);
            manager.load("a").unwrap();
            assert!(matches!(manager.load("a"), Err(ProjectError::Load { .. })));

            runtime.set_dependencies("s", [DependencyDecl::project("s")]);
            assert_eq!(
                manager.load("s"),
                Err(ProjectError::SelfDependency { project: name("s") })
            );

            manager.set_disabled("d", true).unwrap();
            let err = manager.load("d").unwrap_err();
            assert!(err.to_string().contains("disabled"));

            assert_eq!(
                manager.load("nope"),
                Err(ProjectError::UnknownProject("nope".into()))
            );
        }

        #[test]
        fn loader_failure_leaves_unloaded() {
            let (mut manager, runtime, _) = setup(&["a"]);
            runtime.fail_load("a", "missing entry point");
            let err = manager.load("a").unwrap_err();
            assert_eq!(
                err.to_string(),
                "failed to load project 'a': missing entry point"
            );
            assert!(!manager.project("a").unwrap().is_loaded());
        }

        #[test]
        fn unload_methods() {
            let (mut manager, runtime, _) = setup(&["a", "b"]);
            runtime.set_dependencies("b", [DependencyDecl::project("a")]);
            manager.load("a").unwrap();
            manager.load("b").unwrap();
            let mut feedback = CollectedFeedback::new();

            let err = manager
                .unload("a", UnloadMethod::FailOnLoadedDependents, &mut feedback)
                .unwrap_err();
            assert_eq!(
                err,
                ProjectError::DependencyOrder {
                    project: name("a"),
                    dependents: BTreeSet::from([name("b")]),
                }
            );
            assert_eq!(manager.loaded_dependents("a"), BTreeSet::from([name("b")]));

            let unloaded = manager
                .unload("b", UnloadMethod::FailOnLoadedDependents, &mut feedback)
                .unwrap();
            assert_eq!(unloaded, vec![name("b")]);

            let unloaded = manager
                .unload("a", UnloadMethod::IgnoreDependents, &mut feedback)
                .unwrap();
            assert_eq!(unloaded, vec![name("a")]);
            assert!(manager
                .unload("a", UnloadMethod::IgnoreDependents, &mut feedback)
                .unwrap()
                .is_empty());
            assert!(feedback.is_empty());
        }

        #[test]
        fn unloader_failure_is_reported_and_project_ends_unloaded() {
            let (mut manager, runtime, _) = setup(&["a"]);
            manager.load("a").unwrap();
            runtime.fail_unload("a", "still has open handles");
            let mut feedback = CollectedFeedback::new();

            let unloaded = manager
                .unload("a", UnloadMethod::IgnoreDependents, &mut feedback)
                .unwrap();
            assert_eq!(unloaded, vec![name("a")]);
            assert!(!manager.project("a").unwrap().is_loaded());
            assert_eq!(feedback.in_stage(Stage::Unload).count(), 1);
        }

        #[test]
        fn clear_unloads_and_forgets() {
            let (mut manager, _, _) = setup(&["a", "b"]);
            manager.load("a").unwrap();
            manager.clear(&mut CollectedFeedback::new());
            assert!(manager.project_names().is_empty());
        }
    }
}
