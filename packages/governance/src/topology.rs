//! Olympus-Governance: Intent Topology & Global Consistency (ITGCL)
//!
//! Builds the intent-interaction graph and evaluates the four global
//! invariants. Cycle detection is an iterative DFS and components use
//! union-find, both over sorted inputs so the derived properties are
//! order-independent.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::intent::IntentPriority;

/// One intent's topology-relevant surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentNode {
    pub intent_id: String,
    pub priority: IntentPriority,
    /// State keys the intent reads or writes
    #[serde(default)]
    pub state_keys: Vec<String>,
    /// External anchors the intent depends on
    #[serde(default)]
    pub external_anchors: Vec<String>,
    /// Resources claimed exclusively
    #[serde(default)]
    pub exclusive_resources: Vec<String>,
    /// Security strictness level, higher is stricter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<u8>,
    /// Availability strictness level, higher is stricter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_level: Option<u8>,
    /// Latency demand in milliseconds
    #[serde(default)]
    pub latency_budget_ms: f64,
    /// Throughput demand in requests per second
    #[serde(default)]
    pub throughput_rps: f64,
    /// Guarantees offered, as (resource, strictness) pairs
    #[serde(default)]
    pub guarantees: Vec<(String, u8)>,
}

/// Edge types of the interaction graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TopologyEdgeType {
    Read,
    Write,
    Constrain,
    Depend,
}

/// Conflict potential carried by every edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPotential {
    None,
    Low,
    High,
}

/// One typed edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub from: String,
    pub to: String,
    pub edge_type: TopologyEdgeType,
    pub resource: String,
    pub conflict: ConflictPotential,
}

/// The four global invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyInvariant {
    #[serde(rename = "NO_DUAL_EXCLUSIVE")]
    NoDualExclusive,
    #[serde(rename = "CONSTRAINT_MONOTONICITY")]
    ConstraintMonotonicity,
    #[serde(rename = "RESOURCE_FEASIBILITY")]
    ResourceFeasibility,
    #[serde(rename = "POLICY_COMPLIANCE")]
    PolicyCompliance,
}

/// Violation severity ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One invariant violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyViolation {
    pub invariant: TopologyInvariant,
    pub severity: ViolationSeverity,
    /// Affected intent ids
    pub affected: Vec<String>,
    pub resource: String,
    pub detail: String,
}

/// External policy hook (the fourth invariant). The default hook
/// reports nothing.
pub trait PolicyHook {
    fn check(&self, nodes: &[IntentNode]) -> Vec<TopologyViolation>;
}

/// No-op policy hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPolicyHook;

impl PolicyHook for NoopPolicyHook {
    fn check(&self, _nodes: &[IntentNode]) -> Vec<TopologyViolation> {
        Vec::new()
    }
}

/// Combined feasibility budgets for the whole intent set.
pub const TOTAL_LATENCY_BUDGET_MS: f64 = 1000.0;
pub const TOTAL_THROUGHPUT_BUDGET_RPS: f64 = 1000.0;

/// The full topology report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyReport {
    pub edges: Vec<TopologyEdge>,
    pub has_cycles: bool,
    /// Connected components as sorted id lists, in deterministic order
    pub components: Vec<Vec<String>>,
    /// Sorted by (severity desc, affected desc, resource asc)
    pub violations: Vec<TopologyViolation>,
    /// Set to "CONTRADICTORY" when any critical violation exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_override: Option<String>,
    pub should_block_proceed: bool,
}

/// Build the graph and evaluate the invariants.
pub fn evaluate(nodes: &[IntentNode], policy_hook: &dyn PolicyHook) -> TopologyReport {
    let edges = build_edges(nodes);
    let has_cycles = detect_cycles(nodes, &edges);
    let components = connected_components(nodes, &edges);

    let mut violations = Vec::new();
    violations.extend(no_dual_exclusive(nodes));
    violations.extend(constraint_monotonicity(nodes));
    violations.extend(resource_feasibility(nodes));
    violations.extend(policy_hook.check(nodes));

    violations.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.affected.len().cmp(&a.affected.len()))
            .then_with(|| a.resource.cmp(&b.resource))
    });

    let critical = violations
        .iter()
        .any(|v| v.severity == ViolationSeverity::Critical);
    debug!(
        edges = edges.len(),
        violations = violations.len(),
        has_cycles,
        "topology evaluated"
    );

    TopologyReport {
        edges,
        has_cycles,
        components,
        violations,
        status_override: critical.then(|| "CONTRADICTORY".to_string()),
        should_block_proceed: critical,
    }
}

fn build_edges(nodes: &[IntentNode]) -> Vec<TopologyEdge> {
    let mut edges = Vec::new();
    for (i, a) in nodes.iter().enumerate() {
        for b in nodes.iter().skip(i + 1) {
            // Shared state: WRITE with high conflict potential.
            for key in shared(&a.state_keys, &b.state_keys) {
                edges.push(TopologyEdge {
                    from: a.intent_id.clone(),
                    to: b.intent_id.clone(),
                    edge_type: TopologyEdgeType::Write,
                    resource: key,
                    conflict: ConflictPotential::High,
                });
            }
            // Shared anchor: DEPEND with low conflict potential.
            for anchor in shared(&a.external_anchors, &b.external_anchors) {
                edges.push(TopologyEdge {
                    from: a.intent_id.clone(),
                    to: b.intent_id.clone(),
                    edge_type: TopologyEdgeType::Depend,
                    resource: anchor,
                    conflict: ConflictPotential::Low,
                });
            }
            // Constraint conflict: differing strictness on the same
            // dimension.
            if let (Some(sa), Some(sb)) = (a.security_level, b.security_level) {
                edges.push(TopologyEdge {
                    from: a.intent_id.clone(),
                    to: b.intent_id.clone(),
                    edge_type: TopologyEdgeType::Constrain,
                    resource: "security".to_string(),
                    conflict: if sa != sb {
                        ConflictPotential::High
                    } else {
                        ConflictPotential::Low
                    },
                });
            }
            // Guarantee contention: both guarantee the same resource;
            // stricter is worse.
            for (resource, strict_a) in &a.guarantees {
                for (other, strict_b) in &b.guarantees {
                    if resource == other {
                        edges.push(TopologyEdge {
                            from: a.intent_id.clone(),
                            to: b.intent_id.clone(),
                            edge_type: TopologyEdgeType::Constrain,
                            resource: resource.clone(),
                            conflict: if strict_a != strict_b {
                                ConflictPotential::High
                            } else {
                                ConflictPotential::None
                            },
                        });
                    }
                }
            }
        }
    }
    edges
}

fn shared(a: &[String], b: &[String]) -> Vec<String> {
    let set: BTreeSet<&String> = b.iter().collect();
    let mut out: Vec<String> = a.iter().filter(|k| set.contains(k)).cloned().collect();
    out.sort();
    out
}

/// Iterative DFS over the directed WRITE/DEPEND edges, inputs sorted.
fn detect_cycles(nodes: &[IntentNode], edges: &[TopologyEdge]) -> bool {
    let mut ids: Vec<&str> = nodes.iter().map(|n| n.intent_id.as_str()).collect();
    ids.sort_unstable();
    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in edges {
        if matches!(edge.edge_type, TopologyEdgeType::Write | TopologyEdgeType::Depend) {
            adjacency
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.as_str());
        }
    }
    for targets in adjacency.values_mut() {
        targets.sort_unstable();
    }

    // 0 = unvisited, 1 = on stack, 2 = done
    let mut state: BTreeMap<&str, u8> = ids.iter().map(|id| (*id, 0u8)).collect();
    for &start in &ids {
        if state[start] != 0 {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        state.insert(start, 1);
        while let Some((node, next_child)) = stack.pop() {
            let children = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if next_child < children.len() {
                stack.push((node, next_child + 1));
                let child = children[next_child];
                match state.get(child).copied().unwrap_or(0) {
                    0 => {
                        state.insert(child, 1);
                        stack.push((child, 0));
                    }
                    1 => return true,
                    _ => {}
                }
            } else {
                state.insert(node, 2);
            }
        }
    }
    false
}

/// Union-find over undirected edges; components sorted internally and
/// by their smallest member.
fn connected_components(nodes: &[IntentNode], edges: &[TopologyEdge]) -> Vec<Vec<String>> {
    let ids: Vec<&str> = {
        let mut v: Vec<&str> = nodes.iter().map(|n| n.intent_id.as_str()).collect();
        v.sort_unstable();
        v
    };
    let index: BTreeMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut parent: Vec<usize> = (0..ids.len()).collect();

    fn find(parent: &mut Vec<usize>, mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for edge in edges {
        let (Some(&a), Some(&b)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        else {
            continue;
        };
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra != rb {
            parent[ra.max(rb)] = ra.min(rb);
        }
    }

    let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (i, id) in ids.iter().enumerate() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(id.to_string());
    }
    groups.into_values().collect()
}

fn no_dual_exclusive(nodes: &[IntentNode]) -> Vec<TopologyViolation> {
    let mut claims: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for node in nodes {
        for resource in &node.exclusive_resources {
            claims
                .entry(resource.as_str())
                .or_default()
                .push(node.intent_id.as_str());
        }
    }
    claims
        .into_iter()
        .filter(|(_, claimants)| claimants.len() > 1)
        .map(|(resource, claimants)| TopologyViolation {
            invariant: TopologyInvariant::NoDualExclusive,
            severity: ViolationSeverity::Critical,
            affected: claimants.iter().map(|s| s.to_string()).collect(),
            resource: resource.to_string(),
            detail: format!("{} intents claim {resource} exclusively", claimants.len()),
        })
        .collect()
}

fn constraint_monotonicity(nodes: &[IntentNode]) -> Vec<TopologyViolation> {
    let mut out = Vec::new();
    for a in nodes {
        for b in nodes {
            if a.intent_id == b.intent_id {
                continue;
            }
            // Lower-priority intents must not be stricter than
            // higher-priority ones.
            if a.priority.weight() > b.priority.weight() {
                let stricter_security = matches!(
                    (a.security_level, b.security_level),
                    (Some(high), Some(low)) if low > high
                );
                let stricter_availability = matches!(
                    (a.availability_level, b.availability_level),
                    (Some(high), Some(low)) if low > high
                );
                if stricter_security || stricter_availability {
                    let dimension = if stricter_security {
                        "security"
                    } else {
                        "availability"
                    };
                    out.push(TopologyViolation {
                        invariant: TopologyInvariant::ConstraintMonotonicity,
                        severity: ViolationSeverity::High,
                        affected: vec![a.intent_id.clone(), b.intent_id.clone()],
                        resource: dimension.to_string(),
                        detail: format!(
                            "lower-priority {} is stricter than {} on {dimension}",
                            b.intent_id, a.intent_id
                        ),
                    });
                }
            }
        }
    }
    out
}

fn resource_feasibility(nodes: &[IntentNode]) -> Vec<TopologyViolation> {
    let mut out = Vec::new();
    let total_latency: f64 = nodes.iter().map(|n| n.latency_budget_ms).sum();
    if total_latency > TOTAL_LATENCY_BUDGET_MS {
        out.push(TopologyViolation {
            invariant: TopologyInvariant::ResourceFeasibility,
            severity: ViolationSeverity::High,
            affected: nodes
                .iter()
                .filter(|n| n.latency_budget_ms > 0.0)
                .map(|n| n.intent_id.clone())
                .collect(),
            resource: "latency".to_string(),
            detail: format!(
                "combined latency demand {total_latency:.0}ms exceeds {TOTAL_LATENCY_BUDGET_MS:.0}ms"
            ),
        });
    }
    let total_throughput: f64 = nodes.iter().map(|n| n.throughput_rps).sum();
    if total_throughput > TOTAL_THROUGHPUT_BUDGET_RPS {
        out.push(TopologyViolation {
            invariant: TopologyInvariant::ResourceFeasibility,
            severity: ViolationSeverity::High,
            affected: nodes
                .iter()
                .filter(|n| n.throughput_rps > 0.0)
                .map(|n| n.intent_id.clone())
                .collect(),
            resource: "throughput".to_string(),
            detail: format!(
                "combined throughput demand {total_throughput:.0}rps exceeds {TOTAL_THROUGHPUT_BUDGET_RPS:.0}rps"
            ),
        });
    }
    out
}
