//! core::registry
//!
//! The authoritative name -> project map.
//!
//! # Invariants
//!
//! - A project belongs to exactly one registry for its lifetime
//! - A loaded project cannot be removed
//! - Names are unique; adding a name that exists is a no-op

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use thiserror::Error;

use super::config::LayoutConfig;
use super::dependency::Dependency;
use super::paths::ProjectPaths;
use super::project::{Instance, Project};
use super::types::{ProjectName, RegistryId};

/// Errors from registry mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The project was created for a different registry.
    #[error("project '{0}' was created for a different project registry")]
    ForeignProject(ProjectName),

    /// The project is loaded and cannot be removed.
    #[error("cannot remove loaded project '{0}'")]
    ProjectLoaded(ProjectName),
}

/// Owns every managed project.
#[derive(Debug, Default)]
pub struct ProjectRegistry {
    id: RegistryId,
    projects: BTreeMap<ProjectName, Project>,
}

impl ProjectRegistry {
    /// Create an empty registry with a fresh identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// This registry's identity.
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Create a project owned by this registry (not yet added).
    pub fn create_project(
        &self,
        name: ProjectName,
        project_dir: PathBuf,
        layout: &LayoutConfig,
    ) -> Project {
        Project::new(name, ProjectPaths::new(project_dir, layout), self.id)
    }

    /// Add a project.
    ///
    /// Returns `Ok(false)` if a project with the same name already exists.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::ForeignProject` if the project was created for
    /// another registry.
    pub fn add(&mut self, project: Project) -> Result<bool, RegistryError> {
        if project.registry() != self.id {
            return Err(RegistryError::ForeignProject(project.name().clone()));
        }
        if self.projects.contains_key(project.name()) {
            return Ok(false);
        }
        self.projects.insert(project.name().clone(), project);
        Ok(true)
    }

    /// Remove a project.
    ///
    /// Returns `Ok(None)` if no such project exists.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::ProjectLoaded` if the project is loaded.
    pub fn remove(&mut self, name: &str) -> Result<Option<Project>, RegistryError> {
        match self.projects.get(name) {
            Some(project) if project.is_loaded() => {
                Err(RegistryError::ProjectLoaded(project.name().clone()))
            }
            Some(_) => Ok(self.projects.remove(name)),
            None => Ok(None),
        }
    }

    /// Remove every project whose directory check returns `true` and which
    /// is not loaded.
    pub(crate) fn remove_unloaded_where(
        &mut self,
        mut deleted: impl FnMut(&Project) -> bool,
    ) -> BTreeSet<ProjectName> {
        let removed: BTreeSet<ProjectName> = self
            .projects
            .values()
            .filter(|p| !p.is_loaded() && deleted(p))
            .map(|p| p.name().clone())
            .collect();
        for name in &removed {
            self.projects.remove(name);
        }
        removed
    }

    /// Drop every project regardless of state.
    pub(crate) fn clear(&mut self) {
        self.projects.clear();
    }

    /// Look up a project.
    pub fn get(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Look up a project mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.projects.get_mut(name)
    }

    /// Look up a project's running instance.
    pub fn instance(&self, name: &str) -> Option<&dyn Instance> {
        self.projects.get(name).and_then(|p| p.instance())
    }

    /// Check if a project is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    /// Number of projects.
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Check if there are no projects.
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Iterate projects in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    /// All project names.
    pub fn names(&self) -> Vec<ProjectName> {
        self.projects.keys().cloned().collect()
    }

    /// Names of loaded projects.
    pub fn loaded_names(&self) -> Vec<ProjectName> {
        self.names_where(|p| p.is_loaded())
    }

    /// Names of unloaded projects.
    pub fn unloaded_names(&self) -> Vec<ProjectName> {
        self.names_where(|p| !p.is_loaded())
    }

    pub(crate) fn names_where(&self, pred: impl Fn(&Project) -> bool) -> Vec<ProjectName> {
        self.projects
            .values()
            .filter(|p| pred(p))
            .map(|p| p.name().clone())
            .collect()
    }

    /// Loaded projects whose resolved dependencies reference `name`.
    ///
    /// Only references resolved against this registry count.
    pub fn loaded_dependents(&self, name: &str) -> BTreeSet<ProjectName> {
        self.projects
            .values()
            .filter(|p| p.is_loaded() && p.name().as_str() != name)
            .filter(|p| {
                p.dependencies()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Dependency::as_project)
                    .any(|dep| dep.refers_to(name, self.id))
            })
            .map(|p| p.name().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dependency::DependencyDecl;
    use std::any::Any;

    #[derive(Debug)]
    struct Dummy;

    impl Instance for Dummy {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn name(s: &str) -> ProjectName {
        ProjectName::new(s).unwrap()
    }

    fn add(registry: &mut ProjectRegistry, n: &str) {
        let project =
            registry.create_project(name(n), PathBuf::from("/p").join(n), &LayoutConfig::default());
        assert!(registry.add(project).unwrap());
    }

    #[test]
    fn add_and_lookup() {
        let mut registry = ProjectRegistry::new();
        add(&mut registry, "b");
        add(&mut registry, "a");

        assert!(registry.contains("a"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec![name("a"), name("b")]);
        assert_eq!(registry.unloaded_names(), vec![name("a"), name("b")]);
        assert!(registry.loaded_names().is_empty());
    }

    #[test]
    fn duplicate_add_is_noop() {
        let mut registry = ProjectRegistry::new();
        add(&mut registry, "a");
        let dup = registry.create_project(name("a"), PathBuf::from("/other"), &LayoutConfig::default());
        assert!(!registry.add(dup).unwrap());
        assert_eq!(registry.get("a").unwrap().project_dir(), PathBuf::from("/p/a"));
    }

    #[test]
    fn foreign_project_rejected() {
        let mut registry = ProjectRegistry::new();
        let other = ProjectRegistry::new();
        let project = other.create_project(name("a"), PathBuf::from("/p/a"), &LayoutConfig::default());

        assert_eq!(
            registry.add(project),
            Err(RegistryError::ForeignProject(name("a")))
        );
    }

    #[test]
    fn loaded_project_cannot_be_removed() {
        let mut registry = ProjectRegistry::new();
        add(&mut registry, "a");
        registry.get_mut("a").unwrap().attach_instance(Box::new(Dummy));

        assert_eq!(
            registry.remove("a").unwrap_err(),
            RegistryError::ProjectLoaded(name("a"))
        );
        assert!(registry.instance("a").is_some());

        registry.get_mut("a").unwrap().take_instance();
        assert!(registry.remove("a").unwrap().is_some());
        assert!(registry.remove("a").unwrap().is_none());
    }

    #[test]
    fn remove_unloaded_where_skips_loaded() {
        let mut registry = ProjectRegistry::new();
        add(&mut registry, "a");
        add(&mut registry, "b");
        registry.get_mut("a").unwrap().attach_instance(Box::new(Dummy));

        let removed = registry.remove_unloaded_where(|_| true);
        assert_eq!(removed, BTreeSet::from([name("b")]));
        assert!(registry.contains("a"));
    }

    #[test]
    fn loaded_dependents_only_counts_own_registry() {
        let mut registry = ProjectRegistry::new();
        let id = registry.id();
        add(&mut registry, "core");
        add(&mut registry, "app");
        add(&mut registry, "tool");
        add(&mut registry, "idle");

        for (n, decl) in [
            ("app", DependencyDecl::project("core")),
            (
                "tool",
                DependencyDecl::Project {
                    name: "core".into(),
                    registry: Some(RegistryId::new()),
                },
            ),
            ("idle", DependencyDecl::project("core")),
        ] {
            let p = registry.get_mut(n).unwrap();
            p.set_dependencies(vec![Dependency::bind(decl, id)]);
            if n != "idle" {
                p.attach_instance(Box::new(Dummy));
            }
        }

        assert_eq!(registry.loaded_dependents("core"), BTreeSet::from([name("app")]));
        assert!(registry.loaded_dependents("app").is_empty());
    }
}
