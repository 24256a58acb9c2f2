//! Structural graph validation.
//!
//! Every problem is reported as data in a [`ValidationReport`]; validation
//! never panics and has no side effects, so re-running it on an unchanged
//! graph yields identical results. The runtime refuses to start a run for a
//! graph whose report is not ok.

use crate::registry::NodeRegistry;
use loomcore::{Graph, ValidationError, ValidationReport};
use std::collections::HashMap;

/// Check a graph against the registry's declared node types.
pub fn validate(graph: &Graph, registry: &NodeRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();

    for node in &graph.nodes {
        if !registry.contains(&node.node_type) {
            report.push(ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
        }
    }

    check_edges(graph, registry, &mut report);
    check_duplicate_targets(graph, registry, &mut report);
    check_required_inputs(graph, registry, &mut report);

    if let Some(path) = find_cycle(graph) {
        report.push(ValidationError::Cycle { path });
    }

    report
}

fn check_edges(graph: &Graph, registry: &NodeRegistry, report: &mut ValidationReport) {
    for edge in &graph.edges {
        let source = graph.node(&edge.source);
        let target = graph.node(&edge.target);

        if source.is_none() {
            report.push(ValidationError::DanglingEdge {
                edge_id: edge.id.clone(),
                detail: format!("source node '{}' not found", edge.source),
            });
        }
        if target.is_none() {
            report.push(ValidationError::DanglingEdge {
                edge_id: edge.id.clone(),
                detail: format!("target node '{}' not found", edge.target),
            });
        }

        // Handle checks only make sense when the node exists and its type is
        // registered; unknown types are already reported above.
        if let Some(spec) = source.and_then(|n| registry.spec(&n.node_type)) {
            if spec.output(&edge.source_handle).is_none() {
                report.push(ValidationError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    detail: format!(
                        "output port '{}' not declared by type '{}'",
                        edge.source_handle, spec.node_type
                    ),
                });
            }
        }
        if let Some(spec) = target.and_then(|n| registry.spec(&n.node_type)) {
            if spec.input(&edge.target_handle).is_none() {
                report.push(ValidationError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    detail: format!(
                        "input port '{}' not declared by type '{}'",
                        edge.target_handle, spec.node_type
                    ),
                });
            }
        }
    }
}

fn check_duplicate_targets(graph: &Graph, registry: &NodeRegistry, report: &mut ValidationReport) {
    let mut seen: HashMap<(&str, &str), u32> = HashMap::new();
    for edge in &graph.edges {
        let Some(port) = graph
            .node(&edge.target)
            .and_then(|n| registry.spec(&n.node_type))
            .and_then(|s| s.input(&edge.target_handle))
        else {
            continue;
        };
        if port.fan_in {
            continue;
        }
        let count = seen
            .entry((edge.target.as_str(), edge.target_handle.as_str()))
            .or_insert(0);
        *count += 1;
        if *count == 2 {
            report.push(ValidationError::DuplicateTarget {
                node_id: edge.target.clone(),
                port: edge.target_handle.clone(),
            });
        }
    }
}

fn check_required_inputs(graph: &Graph, registry: &NodeRegistry, report: &mut ValidationReport) {
    for node in &graph.nodes {
        let Some(spec) = registry.spec(&node.node_type) else {
            continue;
        };
        for port in spec.inputs.iter().filter(|p| p.required) {
            let fed = graph
                .edges
                .iter()
                .any(|e| e.target == node.id && e.target_handle == port.name);
            if !fed {
                report.push(ValidationError::MissingRequiredInput {
                    node_id: node.id.clone(),
                    port: port.name.clone(),
                });
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Depth-first search over edges, reporting the first cycle found as the
/// offending node sequence (first node repeated at the end).
fn find_cycle(graph: &Graph) -> Option<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &graph.edges {
        if graph.node(&edge.source).is_some() && graph.node(&edge.target).is_some() {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
    }

    let mut colors: HashMap<&str, Color> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    for node in &graph.nodes {
        if colors.get(node.id.as_str()).copied().unwrap_or(Color::White) == Color::White {
            if let Some(path) = dfs(node.id.as_str(), &adjacency, &mut colors, &mut stack) {
                return Some(path);
            }
        }
    }
    None
}

fn dfs<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    colors: &mut HashMap<&'a str, Color>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    colors.insert(node, Color::Gray);
    stack.push(node);

    for &next in adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]) {
        match colors.get(next).copied().unwrap_or(Color::White) {
            Color::Gray => {
                let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                path.push(next.to_string());
                return Some(path);
            }
            Color::White => {
                if let Some(path) = dfs(next, adjacency, colors, stack) {
                    return Some(path);
                }
            }
            Color::Black => {}
        }
    }

    stack.pop();
    colors.insert(node, Color::Black);
    None
}
