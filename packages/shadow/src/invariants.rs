//! Olympus-Shadow: Power-Invariant Checker (PIL)
//!
//! A fixed, ordered set of invariant predicates over the authority
//! graph. Each predicate is a pure function returning a (possibly
//! empty) violation list; the checker aggregates and sorts by
//! invariant id. No predicate panics.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{AuthorityGraph, EdgeType, NodeType};

/// One invariant violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Invariant id (PIL-xxx)
    pub invariant_id: String,
    pub name: String,
    pub explanation: String,
    /// Offending node ids
    pub nodes: Vec<String>,
    /// Offending edge indices
    pub edges: Vec<usize>,
}

/// The ordered power-invariant checker.
#[derive(Debug, Default, Clone, Copy)]
pub struct PowerInvariantChecker;

impl PowerInvariantChecker {
    pub fn new() -> Self {
        Self
    }

    /// Run every invariant in id order and aggregate violations.
    pub fn check(&self, graph: &AuthorityGraph) -> Vec<InvariantViolation> {
        let checks: [fn(&AuthorityGraph) -> Vec<InvariantViolation>; 8] = [
            universal_authority,
            self_elevation,
            authority_accumulation,
            sandbox_escape,
            scope_violation,
            cross_domain_leakage,
            infinite_persistence,
            session_boundary,
        ];

        let mut violations: Vec<InvariantViolation> =
            checks.iter().flat_map(|check| check(graph)).collect();
        violations.sort_by(|a, b| a.invariant_id.cmp(&b.invariant_id));
        debug!(violations = violations.len(), "power-invariant check complete");
        violations
    }
}

fn violation(
    id: &str,
    name: &str,
    explanation: String,
    nodes: Vec<String>,
    edges: Vec<usize>,
) -> InvariantViolation {
    InvariantViolation {
        invariant_id: id.to_string(),
        name: name.to_string(),
        explanation,
        nodes,
        edges,
    }
}

/// PIL-001: an actor that both controls a wildcard resource and holds
/// an elevation path has authority without any bound.
fn universal_authority(graph: &AuthorityGraph) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    for (actor_idx, actor) in graph.nodes().iter().enumerate() {
        if actor.node_type != NodeType::Actor {
            continue;
        }
        let controls_wildcard = graph.edges_from(actor_idx).any(|(_, e)| {
            e.edge_type == EdgeType::Controls
                && graph
                    .node(e.target)
                    .is_some_and(|n| n.attributes.get("wildcard").map(String::as_str) == Some("true"))
        });
        let elevates = graph
            .edges_from(actor_idx)
            .any(|(_, e)| e.edge_type == EdgeType::ElevatesTo);
        if controls_wildcard && elevates {
            let edges = graph
                .edges_from(actor_idx)
                .filter(|(_, e)| {
                    matches!(e.edge_type, EdgeType::Controls | EdgeType::ElevatesTo)
                })
                .map(|(i, _)| i)
                .collect();
            out.push(violation(
                "PIL-001",
                "universal-authority",
                format!("actor {} controls a wildcard resource while elevating", actor.id),
                vec![actor.id.clone()],
                edges,
            ));
        }
    }
    out
}

/// PIL-002: an elevation edge nothing approved.
fn self_elevation(graph: &AuthorityGraph) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    for (idx, edge) in graph.edges().iter().enumerate() {
        if edge.edge_type != EdgeType::ElevatesTo {
            continue;
        }
        if edge.attributes.get("approved").map(String::as_str) != Some("true") {
            let source = graph.node(edge.source).map(|n| n.id.clone()).unwrap_or_default();
            let target = graph.node(edge.target).map(|n| n.id.clone()).unwrap_or_default();
            out.push(violation(
                "PIL-002",
                "self-elevation",
                format!("{source} elevates to {target} without an approval grant"),
                vec![source, target],
                vec![idx],
            ));
        }
    }
    out
}

/// PIL-003: an actor holding three or more authority edges.
fn authority_accumulation(graph: &AuthorityGraph) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    for (actor_idx, actor) in graph.nodes().iter().enumerate() {
        if actor.node_type != NodeType::Actor {
            continue;
        }
        let authority_edges: Vec<usize> = graph
            .edges_from(actor_idx)
            .filter(|(_, e)| matches!(e.edge_type, EdgeType::Controls | EdgeType::Accesses))
            .map(|(i, _)| i)
            .collect();
        if authority_edges.len() >= 3 {
            out.push(violation(
                "PIL-003",
                "authority-accumulation",
                format!(
                    "actor {} accumulates {} authority edges",
                    actor.id,
                    authority_edges.len()
                ),
                vec![actor.id.clone()],
                authority_edges,
            ));
        }
    }
    out
}

/// PIL-004: any edge leaving the sandbox boundary.
fn sandbox_escape(graph: &AuthorityGraph) -> Vec<InvariantViolation> {
    boundary_exits(graph, "sandbox", "PIL-004", "sandbox-escape")
}

/// PIL-005: foreign-scoped access by a self-declared requester.
fn scope_violation(graph: &AuthorityGraph) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    for (idx, edge) in graph.edges().iter().enumerate() {
        if edge.edge_type != EdgeType::Accesses {
            continue;
        }
        if edge.attributes.get("scope").map(String::as_str) != Some("foreign") {
            continue;
        }
        let Some(source) = graph.node(edge.source) else {
            continue;
        };
        if source.attributes.get("declared_scope").map(String::as_str) == Some("self") {
            out.push(violation(
                "PIL-005",
                "scope-violation",
                format!("{} declares self scope but accesses foreign resources", source.id),
                vec![source.id.clone()],
                vec![idx],
            ));
        }
    }
    out
}

/// PIL-006: a transfer edge crossing a boundary.
fn cross_domain_leakage(graph: &AuthorityGraph) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    for (idx, edge) in graph.edges().iter().enumerate() {
        if edge.edge_type != EdgeType::TransfersTo {
            continue;
        }
        let crosses = edge.attributes.get("cross_boundary").map(String::as_str) == Some("true")
            || graph.boundaries().iter().any(|(_, members)| {
                members.contains(&edge.source) && !members.contains(&edge.target)
            });
        if crosses {
            let source = graph.node(edge.source).map(|n| n.id.clone()).unwrap_or_default();
            let target = graph.node(edge.target).map(|n| n.id.clone()).unwrap_or_default();
            out.push(violation(
                "PIL-006",
                "cross-domain-leakage",
                format!("{source} transfers data across a domain boundary to {target}"),
                vec![source, target],
                vec![idx],
            ));
        }
    }
    out
}

/// PIL-007: persistence with no expiry.
fn infinite_persistence(graph: &AuthorityGraph) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    for (idx, edge) in graph.edges().iter().enumerate() {
        if edge.edge_type != EdgeType::PersistsBeyond {
            continue;
        }
        if !edge.attributes.contains_key("expiry") {
            let source = graph.node(edge.source).map(|n| n.id.clone()).unwrap_or_default();
            out.push(violation(
                "PIL-007",
                "infinite-persistence",
                format!("{source} persists beyond its boundary with no expiry"),
                vec![source],
                vec![idx],
            ));
        }
    }
    out
}

/// PIL-008: authority reaching out of the session boundary.
fn session_boundary(graph: &AuthorityGraph) -> Vec<InvariantViolation> {
    boundary_exits(graph, "session", "PIL-008", "session-boundary")
}

fn boundary_exits(
    graph: &AuthorityGraph,
    boundary: &str,
    id: &str,
    name: &str,
) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    for (idx, edge) in graph.edges().iter().enumerate() {
        if !matches!(edge.edge_type, EdgeType::Controls | EdgeType::Accesses) {
            continue;
        }
        if graph.in_boundary(boundary, edge.source) && !graph.in_boundary(boundary, edge.target) {
            let source = graph.node(edge.source).map(|n| n.id.clone()).unwrap_or_default();
            let target = graph.node(edge.target).map(|n| n.id.clone()).unwrap_or_default();
            out.push(violation(
                id,
                name,
                format!("{source} reaches {target} outside the {boundary} boundary"),
                vec![source, target],
                vec![idx],
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AuthorityGraph, EdgeType, NodeType};

    fn base_graph() -> (AuthorityGraph, usize) {
        let mut g = AuthorityGraph::new();
        let requester = g.add_node("requester", NodeType::Actor, "agent");
        (g, requester)
    }

    #[test]
    fn test_isolated_wildcard_control_is_not_universal_authority() {
        // The single-capability shape of an unrestricted-execution
        // request: wildcard control without elevation.
        let (mut g, requester) = base_graph();
        let ops = g.add_node("operations:*", NodeType::Resource, "wildcard");
        g.set_node_attr(ops, "wildcard", "true");
        g.add_edge(requester, ops, EdgeType::Controls);
        g.set_node_attr(requester, "unaudited", "true");

        let violations = PowerInvariantChecker::new().check(&g);
        assert!(violations.is_empty(), "unexpected: {violations:?}");
    }

    #[test]
    fn test_wildcard_plus_elevation_is_universal_authority() {
        let (mut g, requester) = base_graph();
        let ops = g.add_node("operations:*", NodeType::Resource, "wildcard");
        g.set_node_attr(ops, "wildcard", "true");
        g.add_edge(requester, ops, EdgeType::Controls);
        let role = g.add_node("privileged-role", NodeType::Actor, "role");
        g.add_edge(requester, role, EdgeType::ElevatesTo);

        let violations = PowerInvariantChecker::new().check(&g);
        let ids: Vec<&str> = violations.iter().map(|v| v.invariant_id.as_str()).collect();
        // The unapproved elevation also trips PIL-002; ids arrive sorted.
        assert_eq!(ids, vec!["PIL-001", "PIL-002"]);
    }

    #[test]
    fn test_accumulation_needs_three_edges() {
        let (mut g, requester) = base_graph();
        for i in 0..3 {
            let r = g.add_node(format!("res-{i}"), NodeType::Resource, "generic");
            g.add_edge(requester, r, EdgeType::Accesses);
        }
        let violations = PowerInvariantChecker::new().check(&g);
        assert!(violations.iter().any(|v| v.invariant_id == "PIL-003"));
    }

    #[test]
    fn test_scope_violation_requires_self_declaration() {
        let (mut g, requester) = base_graph();
        let store = g.add_node("credential-store", NodeType::Resource, "secrets");
        let e = g.add_edge(requester, store, EdgeType::Accesses);
        g.set_edge_attr(e, "scope", "foreign");

        // Without a self declaration: clean.
        assert!(PowerInvariantChecker::new().check(&g).is_empty());

        g.set_node_attr(requester, "declared_scope", "self");
        let violations = PowerInvariantChecker::new().check(&g);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant_id, "PIL-005");
    }

    #[test]
    fn test_persistence_without_expiry() {
        let (mut g, requester) = base_graph();
        let session = g.add_node("session", NodeType::Boundary, "session-boundary");
        g.add_to_boundary("session", requester);
        g.add_edge(requester, session, EdgeType::PersistsBeyond);

        let violations = PowerInvariantChecker::new().check(&g);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant_id, "PIL-007");
    }

    #[test]
    fn test_session_exit_detected() {
        let (mut g, requester) = base_graph();
        g.add_to_boundary("session", requester);
        let outside = g.add_node("foreign-domain", NodeType::Resource, "tenant");
        g.add_edge(requester, outside, EdgeType::Accesses);

        let violations = PowerInvariantChecker::new().check(&g);
        assert!(violations.iter().any(|v| v.invariant_id == "PIL-008"));
    }
}
