//! engine
//!
//! Orchestrates compiling, loading and unloading of projects in dependency
//! order.
//!
//! # Architecture
//!
//! [`ProjectManager`] owns the [`ProjectRegistry`](crate::core::registry::ProjectRegistry)
//! and drives the external [`Collaborators`]. Every operation follows the
//! same shape:
//!
//! 1. **Select**: choose the subset of projects the operation acts on
//! 2. **Build**: [`GraphBuilder`] resolves their dependencies into a graph
//! 3. **Check**: cycle members and their dependents are marked as errors
//! 4. **Walk**: the graph is traversed in dependency order, one
//!    collaborator call per project, pruning dependents of every failure
//!
//! Batch operations report failures through a [`FeedbackSink`] and keep
//! going; single-project operations return one [`ProjectError`].
//!
//! # Invariants
//!
//! - A project is only loaded after all of its dependencies
//! - A project is only unloaded or recompiled once nothing loaded depends
//!   on it (batch operations unload everything first)
//! - Every mutating operation takes `&mut self`
//! - After any operation returns, every project is `ArtifactState::Stable`
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
//! store.add("core");
//! store.add("app");
//! runtime.set_dependencies("app", [DependencyDecl::project("core")]);
//!
//! let mut manager = ProjectManager::new(
//!     Config::default(),
//!     Collaborators::from_runtime(runtime.clone(), store),
//! );
//! manager.add_projects_from_store().unwrap();
//!
//! let mut feedback = CollectedFeedback::new();
//! manager.load_all(&mut feedback);
//!
//! // app depends on core, so core cannot be recompiled on its own...
//! assert!(manager.recompile("core", &mut feedback).is_err());
//!
//! // ...but a full recompile handles the ordering.
//! let result = manager.recompile_all(&mut feedback).unwrap();
//! assert_eq!(result.loaded.len(), 2);
//! assert!(feedback.is_empty());
//! ```

pub mod batch;
pub mod builder;
pub mod error;
pub mod feedback;
pub mod manager;
pub mod mock;
pub mod recompile;
pub mod swap;
pub mod traits;

pub use batch::{LoadAllResult, RecompileAllResult};
pub use builder::{DependencySource, GraphBuild, GraphBuilder};
pub use error::{CollaboratorError, ProjectError, Stage};
pub use feedback::{CollectedFeedback, Discard, FeedbackSink};
pub use manager::{ProjectManager, UnloadMethod};
pub use swap::{SwapFailure, SwapStep};
pub use traits::{
    Collaborators, Compiler, DependencyResolver, DiscoveredProject, Loader, ProjectStore, Unloader,
};
