//! core
//!
//! Core domain types and data structures for reloadkit.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ProjectName, RegistryId, LifecycleState
//! - [`graph`] - Generic dependency graph and ordered traversals
//! - [`dependency`] - Dependency declarations and bound references
//! - [`project`] - A managed project and its artifact state
//! - [`registry`] - The authoritative name -> project map
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for project storage
//! - [`lock`] - Exclusive lock on a projects directory
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Graphs hold names only and never outlive an operation
//! - Every ordering is deterministic

pub mod config;
pub mod dependency;
pub mod graph;
pub mod lock;
pub mod paths;
pub mod project;
pub mod registry;
pub mod types;
