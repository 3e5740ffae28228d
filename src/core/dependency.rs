//! core::dependency
//!
//! Dependency declarations and their resolved form.
//!
//! # Lifecycle
//!
//! A [`DependencyResolver`](crate::engine::traits::DependencyResolver)
//! produces [`DependencyDecl`] values from a manifest or source tree. The
//! registry binds them into [`Dependency`] values, stamping every project
//! reference with the registry it was resolved against. The target itself is
//! looked up by name whenever a graph is built, so a dependency on a project
//! that is added later resolves without re-reading declarations.
//!
//! # Invariants
//!
//! - A bound project dependency always carries a registry id
//! - A registry mismatch is a resolution error, never a cycle

use super::types::RegistryId;

/// A dependency as declared by a project, before binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyDecl {
    /// A reference outside the managed project set (opaque to the core).
    External(String),
    /// A reference to another managed project.
    Project {
        /// Declared project name.
        name: String,
        /// Registry the reference is qualified with; `None` means the
        /// registry owning the declaring project.
        registry: Option<RegistryId>,
    },
}

impl DependencyDecl {
    /// Declare a dependency on a project in the same registry.
    pub fn project(name: impl Into<String>) -> Self {
        DependencyDecl::Project {
            name: name.into(),
            registry: None,
        }
    }

    /// Declare an external dependency.
    pub fn external(reference: impl Into<String>) -> Self {
        DependencyDecl::External(reference.into())
    }
}

/// A bound dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// An external reference.
    External(String),
    /// A project reference.
    Project(ProjectDependency),
}

impl Dependency {
    /// Bind a declaration for a project owned by `owner`.
    pub fn bind(decl: DependencyDecl, owner: RegistryId) -> Self {
        match decl {
            DependencyDecl::External(reference) => Dependency::External(reference),
            DependencyDecl::Project { name, registry } => {
                Dependency::Project(ProjectDependency {
                    name,
                    registry: registry.unwrap_or(owner),
                })
            }
        }
    }

    /// Get the project reference, if this is one.
    pub fn as_project(&self) -> Option<&ProjectDependency> {
        match self {
            Dependency::Project(dep) => Some(dep),
            Dependency::External(_) => None,
        }
    }
}

/// A reference to a managed project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectDependency {
    name: String,
    registry: RegistryId,
}

impl ProjectDependency {
    /// The referenced project name, as declared.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registry this reference was resolved against.
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    /// Check if this reference points at `name` inside `registry`.
    pub fn refers_to(&self, name: &str, registry: RegistryId) -> bool {
        self.registry == registry && self.name == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_unqualified_uses_owner() {
        let owner = RegistryId::new();
        let dep = Dependency::bind(DependencyDecl::project("core"), owner);

        let project = dep.as_project().unwrap();
        assert_eq!(project.name(), "core");
        assert_eq!(project.registry(), owner);
        assert!(project.refers_to("core", owner));
    }

    #[test]
    fn bind_qualified_keeps_foreign_registry() {
        let owner = RegistryId::new();
        let other = RegistryId::new();
        let decl = DependencyDecl::Project {
            name: "core".into(),
            registry: Some(other),
        };

        let dep = Dependency::bind(decl, owner);
        let project = dep.as_project().unwrap();
        assert_eq!(project.registry(), other);
        assert!(!project.refers_to("core", owner));
    }

    #[test]
    fn external_is_not_a_project() {
        let dep = Dependency::bind(DependencyDecl::external("libc"), RegistryId::new());
        assert!(dep.as_project().is_none());
        assert_eq!(dep, Dependency::External("libc".into()));
    }
}
