// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, TargetdagError};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Position in the workflow definition; breaks topological ties.
    index: usize,
    /// Direct dependencies, sorted.
    deps: Vec<String>,
    /// Direct dependents, in declaration order.
    dependents: Vec<String>,
}

/// In-memory DAG keyed by target name, with a precomputed topological order.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
    order: Vec<String>,
}

impl DagGraph {
    /// Build the graph from `(name, direct dependencies)` pairs given in
    /// declaration order.
    ///
    /// Dependencies naming something that is not a declared target are
    /// ignored. Fails with [`TargetdagError::Cycle`] listing every target on
    /// the first cycle found.
    pub fn build<'a, I>(targets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, Vec<String>)>,
    {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();
        let mut declared: Vec<String> = Vec::new();

        // First pass: create nodes with their dependency lists.
        for (index, (name, deps)) in targets.into_iter().enumerate() {
            let deps: BTreeSet<String> = deps.into_iter().filter(|d| d != name).collect();
            nodes.insert(
                name.to_string(),
                DagNode {
                    index,
                    deps: deps.into_iter().collect(),
                    dependents: Vec::new(),
                },
            );
            declared.push(name.to_string());
        }

        let names: HashSet<String> = declared.iter().cloned().collect();
        for node in nodes.values_mut() {
            node.deps.retain(|d| names.contains(d));
        }

        // Second pass: populate dependents based on deps.
        for task_name in declared.iter() {
            let deps = nodes
                .get(task_name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(task_name.clone());
                }
            }
        }

        detect_cycles(&declared, &nodes)?;
        let order = topological_order(&declared, &nodes);

        Ok(Self { nodes, order })
    }

    /// All target names in topological order (ties by declaration order).
    pub fn topo_order(&self) -> &[String] {
        &self.order
    }

    /// Iterate target names in topological order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Immediate dependencies of a target, sorted by name.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a target.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Every target reachable downstream of `name` (excluding `name`).
    pub fn descendants_of(&self, name: &str) -> HashSet<String> {
        self.walk(vec![name.to_string()], |n| self.dependents_of(n))
    }

    /// `names` plus everything upstream of them.
    pub fn with_ancestors(&self, names: &[String]) -> HashSet<String> {
        let mut out = self.walk(names.to_vec(), |n| self.dependencies_of(n));
        out.extend(names.iter().filter(|n| self.contains(n)).cloned());
        out
    }

    fn walk<'s, F>(&'s self, start: Vec<String>, next: F) -> HashSet<String>
    where
        F: Fn(&str) -> &'s [String],
    {
        let mut stack: Vec<String> = start
            .iter()
            .flat_map(|n| next(n).iter().cloned())
            .collect();
        let mut seen = HashSet::new();

        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            stack.extend(next(&name).iter().cloned());
        }

        seen
    }
}

/// Cycle detection over the dependency edges using petgraph's SCCs.
///
/// Edge direction: dep -> target.
fn detect_cycles(declared: &[String], nodes: &HashMap<String, DagNode>) -> Result<()> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in declared {
        graph.add_node(name.as_str());
    }
    for name in declared {
        if let Some(node) = nodes.get(name) {
            for dep in node.deps.iter() {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }
    }

    for component in tarjan_scc(&graph) {
        if component.len() > 1 {
            let mut members: Vec<String> = component.iter().map(|s| s.to_string()).collect();
            members.sort_by_key(|m| nodes.get(m).map(|n| n.index).unwrap_or(usize::MAX));
            return Err(TargetdagError::Cycle(members));
        }
    }

    Ok(())
}

/// Kahn's algorithm, always releasing the earliest-declared ready target.
fn topological_order(declared: &[String], nodes: &HashMap<String, DagNode>) -> Vec<String> {
    let mut remaining: HashMap<&str, usize> = nodes
        .iter()
        .map(|(name, node)| (name.as_str(), node.deps.len()))
        .collect();

    let mut ready: BTreeSet<(usize, &str)> = nodes
        .iter()
        .filter(|(_, node)| node.deps.is_empty())
        .map(|(name, node)| (node.index, name.as_str()))
        .collect();

    let mut order = Vec::with_capacity(declared.len());

    while let Some(entry) = ready.pop_first() {
        let (_, name) = entry;
        order.push(name.to_string());

        if let Some(node) = nodes.get(name) {
            for dependent in node.dependents.iter() {
                if let Some(count) = remaining.get_mut(dependent.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        let index = nodes.get(dependent).map(|n| n.index).unwrap_or(usize::MAX);
                        ready.insert((index, dependent.as_str()));
                    }
                }
            }
        }
    }

    order
}
