//! Olympus-Shadow: Authority Graph
//!
//! Per-decision arena graph built from the capability matches by a
//! fixed construction table. Nodes and edges are indexed by small
//! integers; boundaries are sets of those indices. Graphs are never
//! persisted and never shared across decisions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use olympus_corpus::{CapabilityClass, Provenance};

use crate::analyzer::CapabilityReport;

/// Node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeType {
    Actor,
    Resource,
    Boundary,
}

/// Edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeType {
    #[serde(rename = "CONTROLS")]
    Controls,
    #[serde(rename = "ACCESSES")]
    Accesses,
    #[serde(rename = "ELEVATES_TO")]
    ElevatesTo,
    #[serde(rename = "IMPERSONATES")]
    Impersonates,
    #[serde(rename = "TRANSFERS_TO")]
    TransfersTo,
    #[serde(rename = "PERSISTS_BEYOND")]
    PersistsBeyond,
}

/// Graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub subtype: String,
    pub attributes: BTreeMap<String, String>,
}

/// Graph edge over node indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub edge_type: EdgeType,
    pub attributes: BTreeMap<String, String>,
}

/// The per-decision authority graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorityGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    boundaries: BTreeMap<String, BTreeSet<usize>>,
}

impl AuthorityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, deduplicating by id. Returns its index.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        node_type: NodeType,
        subtype: impl Into<String>,
    ) -> usize {
        let id = id.into();
        if let Some(idx) = self.nodes.iter().position(|n| n.id == id) {
            return idx;
        }
        self.nodes.push(Node {
            id,
            node_type,
            subtype: subtype.into(),
            attributes: BTreeMap::new(),
        });
        self.nodes.len() - 1
    }

    pub fn set_node_attr(&mut self, idx: usize, key: impl Into<String>, value: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(idx) {
            node.attributes.insert(key.into(), value.into());
        }
    }

    /// Insert an edge. Returns its index.
    pub fn add_edge(&mut self, source: usize, target: usize, edge_type: EdgeType) -> usize {
        self.edges.push(Edge {
            source,
            target,
            edge_type,
            attributes: BTreeMap::new(),
        });
        self.edges.len() - 1
    }

    pub fn set_edge_attr(&mut self, idx: usize, key: impl Into<String>, value: impl Into<String>) {
        if let Some(edge) = self.edges.get_mut(idx) {
            edge.attributes.insert(key.into(), value.into());
        }
    }

    pub fn add_to_boundary(&mut self, boundary: impl Into<String>, node_idx: usize) {
        self.boundaries.entry(boundary.into()).or_default().insert(node_idx);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn boundaries(&self) -> &BTreeMap<String, BTreeSet<usize>> {
        &self.boundaries
    }

    pub fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)
    }

    pub fn node_by_id(&self, id: &str) -> Option<(usize, &Node)> {
        self.nodes.iter().enumerate().find(|(_, n)| n.id == id)
    }

    /// Edges leaving `source`, in insertion order.
    pub fn edges_from(&self, source: usize) -> impl Iterator<Item = (usize, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.source == source)
    }

    pub fn in_boundary(&self, boundary: &str, node_idx: usize) -> bool {
        self.boundaries
            .get(boundary)
            .is_some_and(|members| members.contains(&node_idx))
    }
}

/// Fixed capability→graph construction.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the authority graph for one decision.
    ///
    /// The construction table is closed: each capability class
    /// contributes a fixed node/edge shape, processed in capability id
    /// order so identical inputs yield identical indices.
    pub fn build(&self, report: &CapabilityReport, provenance: &Provenance) -> AuthorityGraph {
        let mut graph = AuthorityGraph::new();
        let requester = graph.add_node("requester", NodeType::Actor, "agent");

        if provenance.semantic_tags.contains("scope-self") {
            graph.set_node_attr(requester, "declared_scope", "self");
        }

        for m in &report.matches {
            let Some(class) = CapabilityClass::from_rule_id(&m.capability_id) else {
                continue;
            };
            match class {
                CapabilityClass::CredentialAccess => {
                    let store = graph.add_node("credential-store", NodeType::Resource, "secrets");
                    let e = graph.add_edge(requester, store, EdgeType::Accesses);
                    graph.set_edge_attr(e, "scope", "foreign");
                }
                CapabilityClass::UnrestrictedExecution => {
                    let ops = graph.add_node("operations:*", NodeType::Resource, "wildcard");
                    graph.set_node_attr(ops, "wildcard", "true");
                    let e = graph.add_edge(requester, ops, EdgeType::Controls);
                    graph.set_edge_attr(e, "scope", "any");
                }
                CapabilityClass::BulkDataExport => {
                    let dataset = graph.add_node("dataset", NodeType::Resource, "records");
                    let sink = graph.add_node("external-sink", NodeType::Actor, "external");
                    graph.add_edge(requester, dataset, EdgeType::Accesses);
                    let e = graph.add_edge(requester, sink, EdgeType::TransfersTo);
                    graph.set_edge_attr(e, "cross_boundary", "true");
                }
                CapabilityClass::PrivilegeElevation => {
                    let role = graph.add_node("privileged-role", NodeType::Actor, "role");
                    graph.add_edge(requester, role, EdgeType::ElevatesTo);
                }
                CapabilityClass::Impersonation => {
                    let other = graph.add_node("other-user", NodeType::Actor, "principal");
                    graph.add_edge(requester, other, EdgeType::Impersonates);
                }
                CapabilityClass::AuditEvasion => {
                    graph.set_node_attr(requester, "unaudited", "true");
                }
                CapabilityClass::InfinitePersistence => {
                    let session =
                        graph.add_node("session", NodeType::Boundary, "session-boundary");
                    graph.add_to_boundary("session", requester);
                    graph.add_edge(requester, session, EdgeType::PersistsBeyond);
                }
                CapabilityClass::BoundaryCrossing => {
                    let foreign =
                        graph.add_node("foreign-domain", NodeType::Resource, "tenant");
                    graph.add_to_boundary("tenant", foreign);
                    let e = graph.add_edge(requester, foreign, EdgeType::Accesses);
                    graph.set_edge_attr(e, "cross_boundary", "true");
                }
            }
        }

        graph
    }
}
