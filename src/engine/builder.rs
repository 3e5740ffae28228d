//! engine::builder
//!
//! Builds the dependency graph for one operation.
//!
//! # Resolution
//!
//! For every project in the chosen subset, the dependency declarations are
//! read (from compiled binaries or from source), bound to the registry and
//! turned into edges:
//!
//! | Reference | Result |
//! |---|---|
//! | resolved against another registry | resolution error, skipped |
//! | name not registered | resolution error, skipped |
//! | registered but outside the subset | omitted silently |
//! | otherwise | edge `project -> dependency` |
//!
//! A resolver failure is attributed to the project, which then gets no
//! outgoing edges. None of these abort the build.

use std::collections::BTreeSet;

use super::error::ProjectError;
use super::traits::DependencyResolver;
use crate::core::dependency::Dependency;
use crate::core::graph::DependencyGraph;
use crate::core::registry::ProjectRegistry;
use crate::core::types::ProjectName;

/// Where dependency declarations are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencySource {
    /// The compiled binaries. Resolved once and cached on the project.
    Compiled,
    /// The current source tree. Never cached.
    Source,
}

/// A built graph plus the resolution errors met along the way.
#[derive(Debug)]
pub struct GraphBuild {
    pub graph: DependencyGraph<ProjectName>,
    pub errors: Vec<ProjectError>,
}

/// Builds dependency graphs over a registry.
pub struct GraphBuilder<'a> {
    registry: &'a mut ProjectRegistry,
    resolver: &'a dyn DependencyResolver,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(registry: &'a mut ProjectRegistry, resolver: &'a dyn DependencyResolver) -> Self {
        Self { registry, resolver }
    }

    /// Build a graph over `projects`.
    ///
    /// # Errors
    ///
    /// Returns `ProjectError::UnknownProject` if any name is not registered.
    /// Nothing is resolved in that case.
    pub fn build(
        &mut self,
        projects: &BTreeSet<ProjectName>,
        source: DependencySource,
    ) -> Result<GraphBuild, ProjectError> {
        if let Some(unknown) = projects.iter().find(|n| !self.registry.contains(n.as_str())) {
            return Err(ProjectError::UnknownProject(unknown.to_string()));
        }

        let mut graph = DependencyGraph::from_nodes(projects.iter().cloned());
        let mut errors = Vec::new();

        for name in projects {
            let dependencies = match self.dependencies(name, source) {
                Ok(deps) => deps,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            for dep in dependencies.iter().filter_map(Dependency::as_project) {
                if dep.registry() != self.registry.id() {
                    errors.push(ProjectError::Resolution {
                        project: Some(name.clone()),
                        message: format!(
                            "dependency project is managed by a different project registry: {}",
                            dep.name()
                        ),
                    });
                    continue;
                }
                let Some(target) = self.registry.get(dep.name()).map(|p| p.name().clone()) else {
                    errors.push(ProjectError::Resolution {
                        project: Some(name.clone()),
                        message: format!(
                            "dependency project does not exist in the project registry: {}",
                            dep.name()
                        ),
                    });
                    continue;
                };
                if graph.contains(&target) {
                    // Both endpoints were added up front.
                    let _ = graph.add_directed_edge(name, &target);
                }
            }
        }

        tracing::debug!(
            nodes = graph.len(),
            errors = errors.len(),
            ?source,
            "built dependency graph"
        );
        Ok(GraphBuild { graph, errors })
    }

    fn dependencies(
        &mut self,
        name: &ProjectName,
        source: DependencySource,
    ) -> Result<Vec<Dependency>, ProjectError> {
        resolve_dependencies(self.registry, self.resolver, name, source)
    }
}

/// Resolve and bind the dependencies of one registered project.
///
/// With [`DependencySource::Compiled`] the cached list is used when present
/// and filled otherwise.
pub(crate) fn resolve_dependencies(
    registry: &mut ProjectRegistry,
    resolver: &dyn DependencyResolver,
    name: &ProjectName,
    source: DependencySource,
) -> Result<Vec<Dependency>, ProjectError> {
    let owner = registry.id();
    let project = registry
        .get_mut(name.as_str())
        .ok_or_else(|| ProjectError::UnknownProject(name.to_string()))?;

    if source == DependencySource::Compiled {
        if let Some(cached) = project.dependencies() {
            return Ok(cached.to_vec());
        }
    }

    let declared = match source {
        DependencySource::Compiled => resolver.compiled_dependencies(project),
        DependencySource::Source => resolver.source_dependencies(project),
    }
    .map_err(|e| ProjectError::Resolution {
        project: Some(name.clone()),
        message: format!("failed to resolve dependencies: {e}"),
    })?;

    let bound: Vec<Dependency> = declared
        .into_iter()
        .map(|decl| Dependency::bind(decl, owner))
        .collect();

    if source == DependencySource::Compiled {
        project.set_dependencies(bound.clone());
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LayoutConfig;
    use crate::core::dependency::DependencyDecl;
    use crate::core::types::RegistryId;
    use crate::engine::mock::MockRuntime;
    use std::path::PathBuf;

    fn name(s: &str) -> ProjectName {
        ProjectName::new(s).unwrap()
    }

    fn names(list: &[&str]) -> BTreeSet<ProjectName> {
        list.iter().map(|s| name(s)).collect()
    }

    fn registry(list: &[&str]) -> ProjectRegistry {
        let mut registry = ProjectRegistry::new();
        for n in list {
            let p = registry.create_project(name(n), PathBuf::from("/p").join(n), &LayoutConfig::default());
            registry.add(p).unwrap();
        }
        registry
    }

    #[test]
    fn edges_follow_declarations() {
        let mut reg = registry(&["a", "b", "c"]);
        let rt = MockRuntime::new();
        rt.set_dependencies("b", [DependencyDecl::project("a")]);
        rt.set_dependencies("c", [DependencyDecl::project("b"), DependencyDecl::external("libc")]);

        let build = GraphBuilder::new(&mut reg, &rt)
            .build(&names(&["a", "b", "c"]), DependencySource::Compiled)
            .unwrap();

        assert!(build.errors.is_empty());
        assert!(build.graph.has_directed_edge(&name("b"), &name("a")));
        assert!(build.graph.has_directed_edge(&name("c"), &name("b")));
        assert!(!build.graph.has_directed_edge(&name("a"), &name("b")));
    }

    #[test]
    fn targets_outside_subset_are_omitted() {
        let mut reg = registry(&["a", "b"]);
        let rt = MockRuntime::new();
        rt.set_dependencies("b", [DependencyDecl::project("a")]);

        let build = GraphBuilder::new(&mut reg, &rt)
            .build(&names(&["b"]), DependencySource::Compiled)
            .unwrap();

        assert!(build.errors.is_empty());
        assert_eq!(build.graph.nodes(), vec![name("b")]);
        assert!(build.graph.dependencies(&name("b")).is_empty());
    }

    #[test]
    fn unknown_and_foreign_targets_are_resolution_errors() {
        let mut reg = registry(&["a", "b"]);
        let rt = MockRuntime::new();
        rt.set_dependencies(
            "b",
            [
                DependencyDecl::project("ghost"),
                DependencyDecl::Project {
                    name: "a".into(),
                    registry: Some(RegistryId::new()),
                },
            ],
        );

        let build = GraphBuilder::new(&mut reg, &rt)
            .build(&names(&["a", "b"]), DependencySource::Compiled)
            .unwrap();

        let messages: Vec<String> = build.errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "dependency project does not exist in the project registry: ghost".to_string(),
                "dependency project is managed by a different project registry: a".to_string(),
            ]
        );
        assert!(build.errors.iter().all(|e| e.project() == Some(&name("b"))));
        assert!(!build.graph.has_directed_edge(&name("b"), &name("a")));
    }

    #[test]
    fn resolver_failure_leaves_project_without_edges() {
        let mut reg = registry(&["a", "b"]);
        let rt = MockRuntime::new();
        rt.set_dependencies("b", [DependencyDecl::project("a")]);
        rt.fail_resolve("b", "manifest unreadable");

        let build = GraphBuilder::new(&mut reg, &rt)
            .build(&names(&["a", "b"]), DependencySource::Compiled)
            .unwrap();

        assert_eq!(build.errors.len(), 1);
        assert!(build.errors[0].to_string().contains("manifest unreadable"));
        assert!(build.graph.dependencies(&name("b")).is_empty());
        assert!(reg.get("b").unwrap().dependencies().is_none());
    }

    #[test]
    fn unregistered_input_is_rejected() {
        let mut reg = registry(&["a"]);
        let rt = MockRuntime::new();

        let err = GraphBuilder::new(&mut reg, &rt)
            .build(&names(&["a", "zz"]), DependencySource::Compiled)
            .unwrap_err();
        assert_eq!(err, ProjectError::UnknownProject("zz".into()));
    }

    #[test]
    fn compiled_dependencies_are_cached_source_are_not() {
        let mut reg = registry(&["a", "b"]);
        let rt = MockRuntime::new();
        rt.set_dependencies("b", [DependencyDecl::project("a")]);

        GraphBuilder::new(&mut reg, &rt)
            .build(&names(&["a", "b"]), DependencySource::Compiled)
            .unwrap();
        assert_eq!(reg.get("b").unwrap().dependencies().map(<[_]>::len), Some(1));

        // Source changes are invisible to the cached compiled view...
        rt.set_source_dependencies("b", Vec::<DependencyDecl>::new());
        let build = GraphBuilder::new(&mut reg, &rt)
            .build(&names(&["a", "b"]), DependencySource::Compiled)
            .unwrap();
        assert!(build.graph.has_directed_edge(&name("b"), &name("a")));

        // ...but drive a source build, which leaves the cache alone.
        let build = GraphBuilder::new(&mut reg, &rt)
            .build(&names(&["a", "b"]), DependencySource::Source)
            .unwrap();
        assert!(!build.graph.has_directed_edge(&name("b"), &name("a")));
        assert_eq!(reg.get("b").unwrap().dependencies().map(<[_]>::len), Some(1));
    }

    #[test]
    fn self_dependency_becomes_self_edge() {
        let mut reg = registry(&["a"]);
        let rt = MockRuntime::new();
        rt.set_dependencies("a", [DependencyDecl::project("a")]);

        let build = GraphBuilder::new(&mut reg, &rt)
            .build(&names(&["a"]), DependencySource::Compiled)
            .unwrap();
        assert!(build.graph.has_directed_edge(&name("a"), &name("a")));
        assert_eq!(build.graph.cycles(), vec![names(&["a"])]);
    }
}
