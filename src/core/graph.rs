//! core::graph
//!
//! Dependency graph representation and traversals.
//!
//! # Architecture
//!
//! The dependency graph is a directed graph where:
//! - Nodes are the projects chosen for one operation
//! - An edge `P -> Q` means "P depends on Q" (Q must be ready before P)
//!
//! Unlike a stack graph, a dependency graph is allowed to contain cycles.
//! Cycles are detected with strongly connected components and reported by
//! the orchestrator; the traversals still terminate in their presence.
//!
//! # Traversals
//!
//! - [`DependencyGraph::child_before_parent`] yields a node only after all of
//!   its dependencies. Used for loading and compiling.
//! - [`DependencyGraph::parent_before_child`] yields a node only after all of
//!   its dependents. Used for unloading.
//!
//! Both can prune the remaining walk with [`Traversal::remove_ancestors`],
//! which drops the current node and everything that transitively depends on
//! it. The graph itself is never mutated while a traversal is running; the
//! traversal keeps its own frontier.
//!
//! # Invariants
//!
//! - Graphs are built fresh per operation and never persisted
//! - Every traversal yields each node at most once
//! - Ties are broken by node order, so traversals are deterministic

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use thiserror::Error;

/// Errors from graph construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node is not part of the graph: {0}")]
    UnknownNode(String),
}

/// A directed dependency graph over nodes of type `N`.
///
/// # Example
///
/// ```
/// use reloadkit::core::graph::DependencyGraph;
///
/// let mut graph = DependencyGraph::from_nodes(["app", "lib", "util"]);
/// graph.add_directed_edge(&"app", &"lib").unwrap();
/// graph.add_directed_edge(&"lib", &"util").unwrap();
///
/// let order: Vec<_> = graph.child_before_parent().collect();
/// assert_eq!(order, vec!["util", "lib", "app"]);
/// ```
#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    graph: DiGraph<N, ()>,
    indices: HashMap<N, NodeIndex>,
}

impl<N> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            graph: DiGraph::new(),
            indices: HashMap::new(),
        }
    }
}

impl<N> DependencyGraph<N>
where
    N: Clone + Ord + Hash + Debug,
{
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph containing the given nodes and no edges.
    pub fn from_nodes(nodes: impl IntoIterator<Item = N>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node);
        }
        graph
    }

    /// Add a node. Returns `false` if it was already present.
    pub fn add_node(&mut self, node: N) -> bool {
        if self.indices.contains_key(&node) {
            return false;
        }
        let idx = self.graph.add_node(node.clone());
        self.indices.insert(node, idx);
        true
    }

    /// Check if the graph contains a node.
    pub fn contains(&self, node: &N) -> bool {
        self.indices.contains_key(node)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All nodes, in node order.
    pub fn nodes(&self) -> Vec<N> {
        let mut nodes: Vec<N> = self.indices.keys().cloned().collect();
        nodes.sort();
        nodes
    }

    /// Insert the edge `from -> to` ("from depends on to").
    ///
    /// Inserting an edge that already exists is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if either endpoint is not a node.
    pub fn add_directed_edge(&mut self, from: &N, to: &N) -> Result<(), GraphError> {
        let a = self.index_of(from)?;
        let b = self.index_of(to)?;
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
        Ok(())
    }

    /// Check if the edge `a -> b` exists.
    pub fn has_directed_edge(&self, a: &N, b: &N) -> bool {
        match (self.indices.get(a), self.indices.get(b)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Direct dependencies of a node (edge targets), in node order.
    pub fn dependencies(&self, node: &N) -> Vec<N> {
        self.neighbors(node, Direction::Outgoing)
    }

    /// Direct dependents of a node (edge sources), in node order.
    pub fn dependents(&self, node: &N) -> Vec<N> {
        self.neighbors(node, Direction::Incoming)
    }

    /// Get every node with a directed path reaching `node`.
    ///
    /// These are the nodes that depend on `node`, directly or transitively.
    /// The node itself is only included when it lies on a cycle.
    ///
    /// # Example
    ///
    /// ```
    /// use reloadkit::core::graph::DependencyGraph;
    ///
    /// let mut graph = DependencyGraph::from_nodes(["a", "b", "c", "d"]);
    /// graph.add_directed_edge(&"b", &"a").unwrap();
    /// graph.add_directed_edge(&"c", &"b").unwrap();
    ///
    /// let ancestors = graph.get_ancestors(&"a");
    /// assert_eq!(ancestors.into_iter().collect::<Vec<_>>(), vec!["b", "c"]);
    /// ```
    pub fn get_ancestors(&self, node: &N) -> BTreeSet<N> {
        let Some(&start) = self.indices.get(node) else {
            return BTreeSet::new();
        };

        let mut result = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for pred in self.graph.neighbors_directed(current, Direction::Incoming) {
                if visited.insert(pred) {
                    result.insert(self.graph[pred].clone());
                    queue.push_back(pred);
                }
            }
        }

        result
    }

    /// Get every maximal set of mutually reachable nodes.
    ///
    /// Every node appears in exactly one component. Components are sorted by
    /// their smallest member.
    pub fn strongly_connected_components(&self) -> Vec<BTreeSet<N>> {
        let mut components: Vec<BTreeSet<N>> = tarjan_scc(&self.graph)
            .into_iter()
            .map(|scc| scc.into_iter().map(|idx| self.graph[idx].clone()).collect())
            .collect();
        components.sort();
        components
    }

    /// Get the components that are real cycles.
    ///
    /// A singleton component only counts when its node has a self edge.
    pub fn cycles(&self) -> Vec<BTreeSet<N>> {
        self.strongly_connected_components()
            .into_iter()
            .filter(|scc| match scc.len() {
                0 => false,
                1 => scc.iter().all(|n| self.has_directed_edge(n, n)),
                _ => true,
            })
            .collect()
    }

    /// Traverse dependencies before the nodes that depend on them.
    pub fn child_before_parent(&self) -> Traversal<'_, N> {
        Traversal::new(self, Direction::Outgoing)
    }

    /// Traverse dependents before the nodes they depend on.
    pub fn parent_before_child(&self) -> Traversal<'_, N> {
        Traversal::new(self, Direction::Incoming)
    }

    fn index_of(&self, node: &N) -> Result<NodeIndex, GraphError> {
        self.indices
            .get(node)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(format!("{node:?}")))
    }

    fn neighbors(&self, node: &N, dir: Direction) -> Vec<N> {
        let Some(&idx) = self.indices.get(node) else {
            return Vec::new();
        };
        let mut result: Vec<N> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n].clone())
            .collect();
        result.sort();
        result.dedup();
        result
    }
}

/// An ordered walk over a [`DependencyGraph`] that can prune itself.
///
/// A node is ready once none of its blockers is still pending. Blockers are
/// the dependencies (child-before-parent) or the dependents
/// (parent-before-child). Nodes that were pruned count as settled.
///
/// When every pending node is blocked, the remaining nodes contain a cycle.
/// The walk then yields the smallest node whose pending blockers all lie in
/// its own strongly connected component, so cycle members surface before
/// the nodes waiting on them and the walk always terminates.
#[derive(Debug)]
pub struct Traversal<'g, N> {
    graph: &'g DependencyGraph<N>,
    blockers: Direction,
    component: Vec<usize>,
    pending: Vec<bool>,
    order: BTreeMap<N, NodeIndex>,
    current: Option<NodeIndex>,
}

impl<'g, N> Traversal<'g, N>
where
    N: Clone + Ord + Hash + Debug,
{
    fn new(graph: &'g DependencyGraph<N>, blockers: Direction) -> Self {
        let count = graph.graph.node_count();
        let mut component = vec![0; count];
        for (id, scc) in tarjan_scc(&graph.graph).into_iter().enumerate() {
            for idx in scc {
                component[idx.index()] = id;
            }
        }

        Self {
            graph,
            blockers,
            component,
            pending: vec![true; count],
            order: graph
                .indices
                .iter()
                .map(|(node, &idx)| (node.clone(), idx))
                .collect(),
            current: None,
        }
    }

    /// Remove the current node and every pending node that transitively
    /// depends on it.
    ///
    /// Returns the removed nodes with the current node first and the rest in
    /// node order. Returns an empty list when there is no current node (before
    /// the first `next()`, or when called twice for the same node).
    ///
    /// # Example
    ///
    /// ```
    /// use reloadkit::core::graph::DependencyGraph;
    ///
    /// let mut graph = DependencyGraph::from_nodes(["a", "b", "c", "x"]);
    /// graph.add_directed_edge(&"b", &"a").unwrap();
    /// graph.add_directed_edge(&"c", &"b").unwrap();
    ///
    /// let mut walk = graph.child_before_parent();
    /// assert_eq!(walk.next(), Some("a"));
    /// assert_eq!(walk.remove_ancestors(), vec!["a", "b", "c"]);
    /// assert_eq!(walk.next(), Some("x"));
    /// assert_eq!(walk.next(), None);
    /// ```
    pub fn remove_ancestors(&mut self) -> Vec<N> {
        let Some(current) = self.current.take() else {
            return Vec::new();
        };
        let g = &self.graph.graph;

        let mut others = BTreeSet::new();
        let mut visited = HashSet::from([current]);
        let mut queue = VecDeque::from([current]);

        while let Some(idx) = queue.pop_front() {
            for pred in g.neighbors_directed(idx, Direction::Incoming) {
                if visited.insert(pred) {
                    queue.push_back(pred);
                    if self.pending[pred.index()] {
                        others.insert(g[pred].clone());
                    }
                }
            }
        }

        for node in &others {
            if let Some(idx) = self.order.remove(node) {
                self.pending[idx.index()] = false;
            }
        }

        let mut removed = Vec::with_capacity(others.len() + 1);
        removed.push(g[current].clone());
        removed.extend(others);
        removed
    }

    /// Number of nodes that have not been yielded or removed yet.
    pub fn remaining(&self) -> usize {
        self.order.len()
    }

    fn blocking(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .graph
            .neighbors_directed(idx, self.blockers)
            .filter(|n| self.pending[n.index()])
    }

    fn is_ready(&self, idx: NodeIndex) -> bool {
        self.blocking(idx).next().is_none()
    }

    fn is_ready_within_component(&self, idx: NodeIndex) -> bool {
        let own = self.component[idx.index()];
        self.blocking(idx).all(|n| self.component[n.index()] == own)
    }
}

impl<N> Iterator for Traversal<'_, N>
where
    N: Clone + Ord + Hash + Debug,
{
    type Item = N;

    fn next(&mut self) -> Option<N> {
        self.current = None;

        let next = self
            .order
            .values()
            .copied()
            .find(|&idx| self.is_ready(idx))
            .or_else(|| {
                self.order
                    .values()
                    .copied()
                    .find(|&idx| self.is_ready_within_component(idx))
            })
            .or_else(|| self.order.values().next().copied())?;

        let node = self.graph.graph[next].clone();
        self.order.remove(&node);
        self.pending[next.index()] = false;
        self.current = Some(next);
        Some(node)
    }
}
