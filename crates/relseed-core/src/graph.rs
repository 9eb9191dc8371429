use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::schema::SchemaModel;

/// "Entity requires entity" graph built from required relations only.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Entity names in definition order.
    nodes: Vec<String>,
    /// entity -> entities it requires.
    requires: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build a graph from explicit nodes and `(dependent, requirement)` edges.
    ///
    /// Self edges and edges touching unknown nodes are ignored.
    pub fn from_edges<'a>(
        nodes: impl IntoIterator<Item = &'a str>,
        edges: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut graph = DependencyGraph::default();
        for node in nodes {
            if !graph.requires.contains_key(node) {
                graph.nodes.push(node.to_string());
                graph.requires.insert(node.to_string(), BTreeSet::new());
            }
        }
        for (dependent, requirement) in edges {
            graph.add_edge(dependent, requirement);
        }
        graph
    }

    fn add_edge(&mut self, dependent: &str, requirement: &str) {
        if dependent == requirement || !self.requires.contains_key(requirement) {
            return;
        }
        if let Some(targets) = self.requires.get_mut(dependent) {
            targets.insert(requirement.to_string());
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn requirements(&self, entity: &str) -> Option<&BTreeSet<String>> {
        self.requires.get(entity)
    }

    pub fn edge_count(&self) -> usize {
        self.requires.values().map(BTreeSet::len).sum()
    }
}

/// Build the dependency graph for a schema: `A -> B` iff `A` has a required
/// relation to `B` and `A != B`.
pub fn build_dependency_graph(schema: &SchemaModel) -> DependencyGraph {
    let mut graph = DependencyGraph::from_edges(
        schema.entities.iter().map(|entity| entity.name.as_str()),
        std::iter::empty(),
    );

    for entity in &schema.entities {
        for target in entity.required_targets() {
            graph.add_edge(&entity.name, target);
        }
    }

    graph
}

/// Linear creation order plus the entities that could only be appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationOrder {
    /// Every entity exactly once.
    pub order: Vec<String>,
    /// Entities left over by a cycle, appended in definition order.
    pub unresolved: Vec<String>,
}

/// Kahn's algorithm over required-relation edges.
///
/// Ready entities are taken in definition order, so the result only depends on
/// the input order. Entities stuck on a cycle are appended at the end in
/// definition order and reported in `unresolved`.
pub fn creation_order(graph: &DependencyGraph) -> CreationOrder {
    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for node in &graph.nodes {
        let requires = graph.requires.get(node).map(BTreeSet::len).unwrap_or(0);
        indegree.insert(node.as_str(), requires);
    }
    for node in &graph.nodes {
        if let Some(targets) = graph.requires.get(node) {
            for target in targets {
                dependents
                    .entry(target.as_str())
                    .or_default()
                    .push(node.as_str());
            }
        }
    }

    let mut ready: VecDeque<&str> = graph
        .nodes
        .iter()
        .map(String::as_str)
        .filter(|node| indegree.get(node).copied() == Some(0))
        .collect();

    let mut order = Vec::with_capacity(graph.nodes.len());
    let mut emitted: BTreeSet<&str> = BTreeSet::new();

    while let Some(node) = ready.pop_front() {
        order.push(node.to_string());
        emitted.insert(node);

        if let Some(children) = dependents.get(node) {
            for child in children {
                if let Some(count) = indegree.get_mut(child) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.push_back(*child);
                    }
                }
            }
        }
    }

    let unresolved: Vec<String> = graph
        .nodes
        .iter()
        .filter(|node| !emitted.contains(node.as_str()))
        .cloned()
        .collect();
    order.extend(unresolved.iter().cloned());

    CreationOrder { order, unresolved }
}

/// Summary of dependency graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub summary: DependencySummary,
    pub order: Vec<String>,
    /// Non-empty when required relations form a cycle; such schemas are only
    /// seeded on a best-effort basis.
    pub cycle: Vec<String>,
}

impl DependencyReport {
    pub fn has_cycle(&self) -> bool {
        !self.cycle.is_empty()
    }
}

/// Build a deterministic dependency report for a schema.
pub fn build_dependency_report(schema: &SchemaModel) -> DependencyReport {
    let graph = build_dependency_graph(schema);
    let summary = DependencySummary {
        nodes: graph.nodes.len(),
        edges: graph.edge_count(),
    };
    let CreationOrder { order, unresolved } = creation_order(&graph);

    DependencyReport {
        summary,
        order,
        cycle: unresolved,
    }
}
