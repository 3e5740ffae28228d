//! engine::mock
//!
//! Deterministic collaborators for tests.
//!
//! # Design
//!
//! [`MockRuntime`] implements every runtime collaborator (compiler, loader,
//! unloader, dependency resolver) over in-memory declarations, with scripted
//! failures and a log of every call. [`MemoryStore`] is a project store that
//! never touches the filesystem.
//!
//! Both are cheap handles over shared state, so a test keeps a clone and
//! keeps scripting after handing the original to a manager.
//!
//! When a project directory exists on disk, a successful mock compile writes
//! an `artifact` file into `project.bin_dir()`, which lets filesystem tests
//! observe the swap protocol.
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
//! let result = manager.load_all(&mut feedback);
//! assert_eq!(result.loaded.len(), 2);
//! assert_eq!(runtime.loads(), vec!["core", "app"]);
//! ```

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::CollaboratorError;
use super::feedback::FeedbackSink;
use super::swap::SwapStep;
use super::traits::{Compiler, DependencyResolver, DiscoveredProject, Loader, ProjectStore, Unloader};
use crate::core::config::LayoutConfig;
use crate::core::dependency::DependencyDecl;
use crate::core::project::{Instance, Project};
use crate::core::types::ProjectName;

/// Name of the file a mock compile writes into the binary location.
pub const ARTIFACT_FILE: &str = "artifact";

/// Which call should fail for a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailOn {
    Compile(String),
    Load(String),
    Unload(String),
    Resolve(String),
}

impl FailOn {
    fn project(&self) -> &str {
        match self {
            FailOn::Compile(p) | FailOn::Load(p) | FailOn::Unload(p) | FailOn::Resolve(p) => p,
        }
    }
}

/// A recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Compile(String),
    Load(String),
    Unload(String),
}

/// The instance a [`MockRuntime`] hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockInstance {
    pub project: String,
    /// Number of successful compiles of the project when it was loaded.
    pub generation: u64,
}

impl Instance for MockInstance {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Scriptable compiler, loader, unloader and dependency resolver.
#[derive(Debug, Clone, Default)]
pub struct MockRuntime {
    inner: Arc<Mutex<RuntimeInner>>,
}

#[derive(Debug, Default)]
struct RuntimeInner {
    source: HashMap<String, Vec<DependencyDecl>>,
    compiled: HashMap<String, Vec<DependencyDecl>>,
    failures: HashMap<FailOn, String>,
    generations: HashMap<String, u64>,
    events: Vec<MockEvent>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RuntimeInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Declare dependencies in both the source tree and the compiled
    /// binaries.
    pub fn set_dependencies(&self, project: &str, decls: impl IntoIterator<Item = DependencyDecl>) {
        let decls: Vec<_> = decls.into_iter().collect();
        let mut state = self.state();
        state.source.insert(project.to_string(), decls.clone());
        state.compiled.insert(project.to_string(), decls);
    }

    /// Declare dependencies in the source tree only. They reach the compiled
    /// view on the next successful compile.
    pub fn set_source_dependencies(
        &self,
        project: &str,
        decls: impl IntoIterator<Item = DependencyDecl>,
    ) {
        self.state()
            .source
            .insert(project.to_string(), decls.into_iter().collect());
    }

    pub fn fail_compile(&self, project: &str, message: &str) {
        self.fail(FailOn::Compile(project.to_string()), message);
    }

    pub fn fail_load(&self, project: &str, message: &str) {
        self.fail(FailOn::Load(project.to_string()), message);
    }

    pub fn fail_unload(&self, project: &str, message: &str) {
        self.fail(FailOn::Unload(project.to_string()), message);
    }

    pub fn fail_resolve(&self, project: &str, message: &str) {
        self.fail(FailOn::Resolve(project.to_string()), message);
    }

    /// Make a call fail with `message` until healed.
    pub fn fail(&self, on: FailOn, message: &str) {
        self.state().failures.insert(on, message.to_string());
    }

    /// Drop every scripted failure for `project`.
    pub fn heal(&self, project: &str) {
        self.state().failures.retain(|on, _| on.project() != project);
    }

    /// Drop every scripted failure.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Every recorded call, in order.
    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Projects passed to the compiler, in order.
    pub fn compiles(&self) -> Vec<String> {
        self.filter_events(|e| match e {
            MockEvent::Compile(p) => Some(p),
            _ => None,
        })
    }

    /// Projects passed to the loader, in order.
    pub fn loads(&self) -> Vec<String> {
        self.filter_events(|e| match e {
            MockEvent::Load(p) => Some(p),
            _ => None,
        })
    }

    /// Projects passed to the unloader, in order.
    pub fn unloads(&self) -> Vec<String> {
        self.filter_events(|e| match e {
            MockEvent::Unload(p) => Some(p),
            _ => None,
        })
    }

    /// Number of successful compiles of `project`.
    pub fn generation(&self, project: &str) -> u64 {
        self.state().generations.get(project).copied().unwrap_or(0)
    }

    fn filter_events(&self, pick: impl Fn(&MockEvent) -> Option<&String>) -> Vec<String> {
        self.state().events.iter().filter_map(pick).cloned().collect()
    }

    fn record(&self, event: MockEvent, on: FailOn) -> Result<(), CollaboratorError> {
        let mut state = self.state();
        state.events.push(event);
        match state.failures.get(&on) {
            Some(message) => Err(CollaboratorError::new(message.clone())),
            None => Ok(()),
        }
    }
}

impl Compiler for MockRuntime {
    fn compile(
        &self,
        project: &Project,
        feedback: &mut dyn FeedbackSink,
    ) -> Result<(), CollaboratorError> {
        let name = project.name().as_str();
        if let Err(e) = self.record(
            MockEvent::Compile(name.to_string()),
            FailOn::Compile(name.to_string()),
        ) {
            feedback.compiler_output(project.name(), &e.message);
            return Err(e);
        }

        let generation = {
            let mut state = self.state();
            if let Some(decls) = state.source.get(name).cloned() {
                state.compiled.insert(name.to_string(), decls);
            }
            let generation = state.generations.entry(name.to_string()).or_insert(0);
            *generation += 1;
            *generation
        };

        if project.project_dir().is_dir() {
            fs::create_dir_all(project.bin_dir())?;
            fs::write(project.bin_dir().join(ARTIFACT_FILE), generation.to_string())?;
        }
        Ok(())
    }
}

impl Loader for MockRuntime {
    fn load(&self, project: &Project) -> Result<Box<dyn Instance>, CollaboratorError> {
        let name = project.name().to_string();
        self.record(MockEvent::Load(name.clone()), FailOn::Load(name.clone()))?;
        let generation = self.generation(&name);
        Ok(Box::new(MockInstance {
            project: name,
            generation,
        }))
    }
}

impl Unloader for MockRuntime {
    fn unload(
        &self,
        project: &Project,
        _instance: Box<dyn Instance>,
        _feedback: &mut dyn FeedbackSink,
    ) -> Result<(), CollaboratorError> {
        let name = project.name().to_string();
        self.record(MockEvent::Unload(name.clone()), FailOn::Unload(name))
    }
}

impl DependencyResolver for MockRuntime {
    fn compiled_dependencies(
        &self,
        project: &Project,
    ) -> Result<Vec<DependencyDecl>, CollaboratorError> {
        self.declarations(project, |state| &state.compiled)
    }

    fn source_dependencies(
        &self,
        project: &Project,
    ) -> Result<Vec<DependencyDecl>, CollaboratorError> {
        self.declarations(project, |state| &state.source)
    }
}

impl MockRuntime {
    fn declarations(
        &self,
        project: &Project,
        view: impl Fn(&RuntimeInner) -> &HashMap<String, Vec<DependencyDecl>>,
    ) -> Result<Vec<DependencyDecl>, CollaboratorError> {
        let name = project.name().as_str();
        let state = self.state();
        if let Some(message) = state.failures.get(&FailOn::Resolve(name.to_string())) {
            return Err(CollaboratorError::new(message.clone()));
        }
        Ok(view(&state).get(name).cloned().unwrap_or_default())
    }
}

/// A recorded artifact operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOp {
    Remove(PathBuf),
    Rename(PathBuf, PathBuf),
}

/// A project store held in memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Debug)]
struct StoreInner {
    root: PathBuf,
    projects: BTreeMap<String, PathBuf>,
    discovery_failure: Option<String>,
    failing_swaps: BTreeSet<(PathBuf, SwapStep)>,
    ops: Vec<ArtifactOp>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_root("/projects")
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose project directories live under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                root: root.into(),
                projects: BTreeMap::new(),
                discovery_failure: None,
                failing_swaps: BTreeSet::new(),
                ops: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a project directory. Returns its path.
    pub fn add(&self, name: &str) -> PathBuf {
        let mut state = self.state();
        let dir = state.root.join(name);
        state.projects.insert(name.to_string(), dir.clone());
        dir
    }

    /// Delete a project directory.
    pub fn delete(&self, name: &str) {
        self.state().projects.remove(name);
    }

    /// Make `discover` fail with `message` (or succeed again with `None`).
    pub fn fail_discovery(&self, message: Option<&str>) {
        self.state().discovery_failure = message.map(str::to_string);
    }

    /// Make one swap step of `name` fail, assuming the default layout.
    pub fn fail_swap(&self, name: &str, step: SwapStep) {
        let layout = LayoutConfig::default();
        let mut state = self.state();
        let dir = state.root.join(name);
        let target = match step {
            SwapStep::ClearSide | SwapStep::RenameSide => dir.join(layout.side_bin_dir()),
            SwapStep::RemoveDefault => dir.join(layout.bin_dir()),
        };
        state.failing_swaps.insert((target, step));
    }

    /// Every artifact operation, in order.
    pub fn artifact_ops(&self) -> Vec<ArtifactOp> {
        self.state().ops.clone()
    }
}

impl ProjectStore for MemoryStore {
    fn discover(&self) -> Result<Vec<DiscoveredProject>, CollaboratorError> {
        let state = self.state();
        if let Some(message) = &state.discovery_failure {
            return Err(CollaboratorError::new(message.clone()));
        }
        let mut found = Vec::new();
        for (name, dir) in &state.projects {
            // Names the registry would reject are skipped, as on disk.
            if let Ok(name) = ProjectName::new(name.as_str()) {
                found.push(DiscoveredProject {
                    name,
                    dir: dir.clone(),
                });
            }
        }
        Ok(found)
    }

    fn find(&self, name: &ProjectName) -> Result<Option<PathBuf>, CollaboratorError> {
        Ok(self.state().projects.get(name.as_str()).cloned())
    }

    fn exists(&self, project: &Project) -> bool {
        self.state()
            .projects
            .get(project.name().as_str())
            .is_some_and(|dir| dir == project.project_dir())
    }

    fn remove_artifacts(&self, dir: &Path) -> io::Result<()> {
        let mut state = self.state();
        state.ops.push(ArtifactOp::Remove(dir.to_path_buf()));
        let refused = state
            .failing_swaps
            .iter()
            .any(|(target, step)| *step != SwapStep::RenameSide && target == dir);
        if refused {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "remove refused"));
        }
        Ok(())
    }

    fn rename_artifacts(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state();
        state
            .ops
            .push(ArtifactOp::Rename(from.to_path_buf(), to.to_path_buf()));
        let refused = state
            .failing_swaps
            .iter()
            .any(|(target, step)| *step == SwapStep::RenameSide && target == from);
        if refused {
            return Err(io::Error::new(io::ErrorKind::Other, "rename refused"));
        }
        Ok(())
    }
}
