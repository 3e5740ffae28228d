//! Reloadkit - dependency-ordered compile, load and hot reload of projects
//!
//! Reloadkit manages a set of named, independently versioned projects. Each
//! project is compiled from source into a binary directory and instantiated
//! into a running unit. Reloadkit keeps the set of running units consistent
//! with the dependencies between projects: nothing loads before what it
//! depends on, and nothing is unloaded or recompiled while something loaded
//! still depends on it.
//!
//! # Architecture
//!
//! - [`core`] - Domain types, the dependency graph, the registry, config
//! - [`engine`] - Orchestration: graph building, batch and single-project
//!   operations, the binary swap protocol, collaborator traits
//! - [`store`] - Project discovery on the filesystem
//! - [`logging`] - Subscriber setup for hosts
//!
//! Compiling, loading, unloading and dependency resolution are supplied by
//! the host through the traits in [`engine::traits`].
//!
//! # Correctness Invariants
//!
//! 1. A project is only loaded after every project it depends on
//! 2. Cycles never load; every member and every dependent is reported
//! 3. A failure prunes exactly the projects that depend on it
//! 4. New binaries replace old ones only once the old instance is gone

pub mod core;
pub mod engine;
pub mod logging;
pub mod store;
