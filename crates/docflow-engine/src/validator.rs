//! Static checks run against a definition before it is saved or executed.
//!
//! Errors make a definition invalid; warnings never do. The pairwise
//! back-and-forth check is the one that decides validity for cycles, so a
//! loop through three or more nodes passes validation and is only reported
//! as a warning. The execution engine's depth limit is what stops such a
//! loop at run time.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use docflow_core::types::{Definition, NodeKind};

/// Outcome of validating a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate a workflow definition. All checks run; nothing short-circuits.
pub fn validate_workflow(definition: &Definition) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !definition.nodes.iter().any(|n| n.kind == NodeKind::Trigger) {
        errors.push("Workflow must have at least one trigger".to_string());
    }

    let orphaned = count_orphans(definition);
    if orphaned > 0 {
        errors.push(format!(
            "{} node(s) are not connected to the workflow",
            orphaned
        ));
    }

    if has_back_and_forth_edge(definition) {
        errors.push("Workflow contains circular dependencies".to_string());
    }

    let node_ids: HashSet<&str> = definition.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &definition.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint.as_str()) {
                errors.push(format!(
                    "Edge {} references unknown node {}",
                    edge.id, endpoint
                ));
            }
        }
    }

    for cycle in find_cycles(definition) {
        // One- and two-node loops are already errors.
        if cycle.len() < 3 {
            continue;
        }
        let mut path = cycle.clone();
        path.push(cycle[0].clone());
        warnings.push(format!("Cycle detected through nodes {}", path.join(" -> ")));
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Non-trigger nodes that appear in no edge at all.
fn count_orphans(definition: &Definition) -> usize {
    let connected: HashSet<&str> = definition
        .edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();

    definition
        .nodes
        .iter()
        .filter(|n| n.kind != NodeKind::Trigger && !connected.contains(n.id.as_str()))
        .count()
}

/// Any ordered pair of edges `(e1, e2)` with `e1: a -> b` and `e2: b -> a`.
/// The pair may be the same edge, so a self-loop counts.
fn has_back_and_forth_edge(definition: &Definition) -> bool {
    definition.edges.iter().any(|e1| {
        definition
            .edges
            .iter()
            .any(|e2| e1.source == e2.target && e1.target == e2.source)
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Cycles closed by each back edge found in a depth-first search, as node
/// id sequences. Nodes are visited in declared order so output is stable.
fn find_cycles(definition: &Definition) -> Vec<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &definition.edges {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let mut marks: HashMap<&str, Mark> = definition
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), Mark::Unvisited))
        .collect();
    let mut stack = Vec::new();
    let mut cycles = Vec::new();
    let mut seen: HashSet<Vec<String>> = HashSet::new();

    for node in &definition.nodes {
        if marks.get(node.id.as_str()) == Some(&Mark::Unvisited) {
            visit(
                node.id.as_str(),
                &adjacency,
                &mut marks,
                &mut stack,
                &mut cycles,
                &mut seen,
            );
        }
    }
    cycles
}

fn visit<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
    seen: &mut HashSet<Vec<String>>,
) {
    marks.insert(node, Mark::OnStack);
    stack.push(node);

    for &next in adjacency.get(node).map(Vec::as_slice).unwrap_or_default() {
        match marks.get(next).copied() {
            Some(Mark::Unvisited) => visit(next, adjacency, marks, stack, cycles, seen),
            Some(Mark::OnStack) => {
                if let Some(start) = stack.iter().position(|n| *n == next) {
                    let cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                    let mut key = cycle.clone();
                    key.sort();
                    if seen.insert(key) {
                        cycles.push(cycle);
                    }
                }
            }
            // Done, or a dangling target reported elsewhere.
            _ => {}
        }
    }

    stack.pop();
    marks.insert(node, Mark::Done);
}
