//! Property-based tests for dependency ordering and failure isolation.
//!
//! These tests use proptest to verify that batch operations respect
//! dependency order on randomly generated project graphs.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use reloadkit::core::config::Config;
use reloadkit::core::dependency::DependencyDecl;
use reloadkit::core::graph::DependencyGraph;
use reloadkit::core::types::ProjectName;
use reloadkit::engine::feedback::CollectedFeedback;
use reloadkit::engine::mock::{MemoryStore, MockRuntime};
use reloadkit::engine::{Collaborators, ProjectManager};

fn project(i: usize) -> String {
    format!("p{i}")
}

/// Strategy for an acyclic dependency map: a project only depends on
/// projects with a smaller index.
fn dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..9).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                if i == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    prop::collection::vec(0..i, 0..4)
                        .prop_map(|deps| {
                            deps.into_iter()
                                .collect::<BTreeSet<_>>()
                                .into_iter()
                                .collect()
                        })
                        .boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

/// Strategy for an arbitrary directed graph, cycles and self edges included.
fn digraph() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..9).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..20)))
}

fn manager_for(deps: &[Vec<usize>]) -> (ProjectManager, MockRuntime) {
    let runtime = MockRuntime::new();
    let store = MemoryStore::new();
    for (i, list) in deps.iter().enumerate() {
        store.add(&project(i));
        runtime.set_dependencies(
            &project(i),
            list.iter().map(|&d| DependencyDecl::project(project(d))),
        );
    }
    let mut manager = ProjectManager::new(
        Config::default(),
        Collaborators::from_runtime(runtime.clone(), store),
    );
    manager.add_projects_from_store().unwrap();
    (manager, runtime)
}

/// Every project that transitively depends on `root`, plus `root`.
fn dependents_closure(deps: &[Vec<usize>], root: usize) -> BTreeSet<String> {
    let mut closure = BTreeSet::from([root]);
    loop {
        let before = closure.len();
        for (i, list) in deps.iter().enumerate() {
            if list.iter().any(|d| closure.contains(d)) {
                closure.insert(i);
            }
        }
        if closure.len() == before {
            return closure.into_iter().map(project).collect();
        }
    }
}

fn names(set: &BTreeSet<ProjectName>) -> BTreeSet<String> {
    set.iter().map(|n| n.to_string()).collect()
}

proptest! {
    /// Every project loads, and only after all of its dependencies.
    #[test]
    fn load_all_respects_dependencies(deps in dag()) {
        let (mut manager, runtime) = manager_for(&deps);

        let mut feedback = CollectedFeedback::new();
        let result = manager.load_all(&mut feedback);

        prop_assert!(feedback.is_empty());
        prop_assert_eq!(result.loaded.len(), deps.len());
        let position: HashMap<String, usize> = runtime
            .loads()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (p, i))
            .collect();
        for (i, list) in deps.iter().enumerate() {
            for d in list {
                prop_assert!(position[&project(*d)] < position[&project(i)]);
            }
        }
    }

    /// A load failure takes down exactly the failed project and its
    /// transitive dependents.
    #[test]
    fn load_failure_is_isolated(deps in dag(), pick in any::<prop::sample::Index>()) {
        let failing = pick.index(deps.len());
        let (mut manager, runtime) = manager_for(&deps);
        runtime.fail_load(&project(failing), "boom");

        let result = manager.load_all(&mut CollectedFeedback::new());

        let expected = dependents_closure(&deps, failing);
        prop_assert_eq!(names(&result.errors), expected.clone());
        prop_assert!(result.loaded.is_disjoint(&result.errors));
        prop_assert_eq!(result.loaded.len() + expected.len(), deps.len());
    }

    /// Unloading reverses the load order constraints.
    #[test]
    fn unload_all_unloads_dependents_first(deps in dag()) {
        let (mut manager, runtime) = manager_for(&deps);
        manager.load_all(&mut CollectedFeedback::new());

        let unloaded = manager.unload_all(&mut CollectedFeedback::new());

        prop_assert_eq!(unloaded.len(), deps.len());
        let position: HashMap<String, usize> = runtime
            .unloads()
            .into_iter()
            .enumerate()
            .map(|(i, p)| (p, i))
            .collect();
        for (i, list) in deps.iter().enumerate() {
            for d in list {
                prop_assert!(position[&project(i)] < position[&project(*d)]);
            }
        }
    }

    /// Both traversals visit every node exactly once, cycles or not.
    #[test]
    fn traversals_visit_every_node_once((n, edges) in digraph()) {
        let mut graph = DependencyGraph::from_nodes(0..n);
        for (from, to) in &edges {
            graph.add_directed_edge(from, to).unwrap();
        }

        let forward: Vec<usize> = graph.child_before_parent().collect();
        let backward: Vec<usize> = graph.parent_before_child().collect();

        prop_assert_eq!(forward.len(), n);
        prop_assert_eq!(backward.len(), n);
        prop_assert_eq!(forward.iter().collect::<BTreeSet<_>>().len(), n);
        prop_assert_eq!(backward.iter().collect::<BTreeSet<_>>().len(), n);
    }

    /// A project involved in a cycle, or depending on one, never loads.
    #[test]
    fn cycles_never_load((n, edges) in digraph()) {
        let mut deps = vec![Vec::new(); n];
        for (from, to) in &edges {
            if !deps[*from].contains(to) {
                deps[*from].push(*to);
            }
        }
        let (mut manager, _) = manager_for(&deps);

        let result = manager.load_all(&mut CollectedFeedback::new());

        let mut graph = DependencyGraph::from_nodes((0..n).map(project));
        for (from, to) in &edges {
            graph.add_directed_edge(&project(*from), &project(*to)).unwrap();
        }
        for members in graph.cycles() {
            for member in &members {
                let blocked = graph.get_ancestors(member);
                prop_assert!(!names(&result.loaded).contains(member));
                for p in blocked {
                    prop_assert!(!names(&result.loaded).contains(&p));
                }
            }
        }
        prop_assert_eq!(result.loaded.len() + result.errors.len(), n);
    }
}
