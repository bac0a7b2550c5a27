//! Girth-constrained graph-doubling construction (RCJ).
//!
//! Starting from one cycle of the target girth, each round copies the whole
//! graph, then joins original and copy through fresh variable nodes at the
//! check nodes a weight-propagation pass marked as safe join points. Rounds
//! double the loop count until the requested size is reached.
//!
//! Nodes live in an arena keyed by (type, index); adjacency is stored as
//! index lists into the opposite partition, never as owning references.

use crate::cancel::CancelToken;
use crate::error::{Cancelled, SearchError};
use crate::sparse::{DokMatrix, SparseMatrix};
use log::info;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeType {
    Check,
    Variable,
}

type NodeKey = (NodeType, usize);

const UNSET_WEIGHT: usize = usize::MAX;

/// One arena node: its neighbors in the opposite partition, the rollout
/// weight, and the label of the seed loop it belongs to (0 for connector
/// nodes created between loops).
#[derive(Clone, Debug)]
pub struct RcjNode {
    pub connections: Vec<usize>,
    pub weight: usize,
    pub loop_label: usize,
}

impl Default for RcjNode {
    fn default() -> Self {
        Self {
            connections: Vec::new(),
            weight: 0,
            loop_label: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
    checks: BTreeMap<usize, RcjNode>,
    variables: BTreeMap<usize, RcjNode>,
    loops: usize,
}

impl Graph {
    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Adds an isolated node and returns its index within its partition.
    pub fn create_node(&mut self, node_type: NodeType) -> usize {
        let partition = match node_type {
            NodeType::Check => &mut self.checks,
            NodeType::Variable => &mut self.variables,
        };
        let index = partition.len();
        partition.insert(index, RcjNode::default());
        index
    }

    /// Adds the edge (check, variable); re-adding is a no-op.
    pub fn connect(&mut self, check: usize, variable: usize) {
        let check_node = self.checks.get_mut(&check).expect("unknown check node");
        if check_node.connections.contains(&variable) {
            return;
        }
        check_node.connections.push(variable);
        self.variables
            .get_mut(&variable)
            .expect("unknown variable node")
            .connections
            .push(check);
    }

    fn connect_pair(&mut self, a: NodeKey, b: NodeKey) {
        match (a, b) {
            ((NodeType::Check, c), (NodeType::Variable, v))
            | ((NodeType::Variable, v), (NodeType::Check, c)) => self.connect(c, v),
            _ => panic!("edges must join a check node and a variable node"),
        }
    }

    fn node(&self, key: NodeKey) -> &RcjNode {
        let partition = match key.0 {
            NodeType::Check => &self.checks,
            NodeType::Variable => &self.variables,
        };
        partition.get(&key.1).expect("unknown node")
    }

    fn node_mut(&mut self, key: NodeKey) -> &mut RcjNode {
        let partition = match key.0 {
            NodeType::Check => &mut self.checks,
            NodeType::Variable => &mut self.variables,
        };
        partition.get_mut(&key.1).expect("unknown node")
    }

    /// The graph as a parity-check matrix: rows are check nodes, columns are
    /// variable nodes.
    pub fn parity_check_matrix(&self) -> SparseMatrix {
        let mut h = DokMatrix::zero(self.checks.len(), self.variables.len());
        for (&i, node) in &self.checks {
            for &j in &node.connections {
                h.set(i, j, 1);
            }
        }
        h.to_csr()
    }
}

/// Builds the RCJ graph for the given girth with `count`/2 seed loops,
/// `count` a power of two greater than 1.
pub fn build(cancel: &CancelToken, girth: usize, count: usize) -> Result<Graph, SearchError> {
    if count <= 1 {
        return Err(SearchError::InvalidParameter(
            "count must be greater than 1".to_string(),
        ));
    }
    if !count.is_power_of_two() {
        return Err(SearchError::InvalidParameter(
            "count must be a power of 2".to_string(),
        ));
    }
    if girth % 2 == 1 || girth < 4 {
        return Err(SearchError::InvalidParameter(
            "girth must be an even number >= 4".to_string(),
        ));
    }

    info!("building RCJ({girth},{count})");
    let mut graph = Graph::default();
    let mut current = vec![make_loop(girth, &mut graph)];

    while current.len() < count / 2 {
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
        clear_weights(&mut graph, &current);
        update_weights(cancel, girth, &current, &mut graph)?;
        let copied = copy_graph(cancel, &current, &mut graph)?;
        connect_graphs(&current, &copied, &mut graph);
        current.extend(copied);
    }
    Ok(graph)
}

/// One cycle of `girth` nodes, alternating check and variable.
fn make_loop(girth: usize, graph: &mut Graph) -> Vec<NodeKey> {
    let nodes: Vec<NodeKey> = (0..girth)
        .map(|i| {
            let t = if i % 2 == 0 {
                NodeType::Check
            } else {
                NodeType::Variable
            };
            (t, graph.create_node(t))
        })
        .collect();
    graph.loops += 1;
    let label = graph.loops;
    for &key in &nodes {
        graph.node_mut(key).loop_label = label;
    }
    for i in 0..girth {
        graph.connect_pair(nodes[i], nodes[(i + 1) % girth]);
    }
    nodes
}

fn clear_weights(graph: &mut Graph, current: &[Vec<NodeKey>]) {
    for loop_nodes in current {
        for &key in loop_nodes {
            graph.node_mut(key).weight = UNSET_WEIGHT;
        }
    }
}

/// Labels join points: starting from the least-connected check node of the
/// first loop, repeatedly marks a node weight 1 and rolls the weights out;
/// each rollout nominates the check nodes far enough away as further join
/// candidates, until none are left.
fn update_weights(
    cancel: &CancelToken,
    girth: usize,
    current: &[Vec<NodeKey>],
    graph: &mut Graph,
) -> Result<(), Cancelled> {
    let first_loop = &current[0];
    let mut start = first_loop[0];
    let mut connections = graph.node(start).connections.len();
    for &key in first_loop {
        if key.0 == NodeType::Check && graph.node(key).connections.len() < connections {
            start = key;
            connections = graph.node(key).connections.len();
        }
    }

    graph.node_mut(start).weight = 1;
    let mut candidates: BTreeSet<usize> = BTreeSet::new();
    loop {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        roll_out(girth, start, &mut candidates, graph);
        let next = match candidates.iter().next() {
            Some(&index) => index,
            None => break,
        };
        candidates.remove(&next);
        start = (NodeType::Check, next);
        graph.node_mut(start).weight = 1;
    }
    Ok(())
}

/// Breadth-first weight propagation from `start`. A node is relabeled only
/// when the new weight is smaller; check nodes reaching girth/2 − 2 stop the
/// front and become join candidates.
fn roll_out(
    girth: usize,
    start: NodeKey,
    candidates: &mut BTreeSet<usize>,
    graph: &mut Graph,
) {
    let max_weight = girth / 2 - 2;
    let mut weight = graph.node(start).weight + 1;
    let mut node_type = NodeType::Variable;
    let mut frontier = graph.node(start).connections.clone();

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for index in frontier {
            let node = graph.node_mut((node_type, index));
            if node.weight <= weight {
                continue;
            }
            if node_type == NodeType::Check
                && node.weight >= max_weight
                && node.weight != UNSET_WEIGHT
            {
                // Its earlier nomination no longer stands.
                candidates.remove(&index);
            }
            node.weight = weight;
            if node_type == NodeType::Check && node.weight >= max_weight {
                candidates.insert(index);
                continue;
            }
            next.extend(node.connections.iter().copied());
        }
        frontier = next;
        node_type = match node_type {
            NodeType::Check => NodeType::Variable,
            NodeType::Variable => NodeType::Check,
        };
        weight += 1;
    }
}

/// Duplicates every node and edge. The copied loops receive fresh loop
/// labels; the key lists of the copies are returned in the same order as
/// `current`.
fn copy_graph(
    cancel: &CancelToken,
    current: &[Vec<NodeKey>],
    graph: &mut Graph,
) -> Result<Vec<Vec<NodeKey>>, Cancelled> {
    let variables: Vec<(usize, Vec<usize>)> = graph
        .variables
        .iter()
        .map(|(&i, node)| (i, node.connections.clone()))
        .collect();

    let checks_needed = graph.checks.len();
    let check_offset = graph.checks.len();
    for _ in 0..checks_needed {
        graph.create_node(NodeType::Check);
    }

    let mut variable_map: BTreeMap<usize, usize> = BTreeMap::new();
    for (old_variable, connections) in variables {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let v = graph.create_node(NodeType::Variable);
        for c in connections {
            graph.connect(c + check_offset, v);
        }
        variable_map.insert(old_variable, v);
    }

    let mut copies = Vec::with_capacity(current.len());
    for loop_nodes in current {
        let copied: Vec<NodeKey> = loop_nodes
            .iter()
            .map(|&(t, i)| match t {
                NodeType::Check => (NodeType::Check, i + check_offset),
                NodeType::Variable => (NodeType::Variable, variable_map[&i]),
            })
            .collect();
        graph.loops += 1;
        let label = graph.loops;
        for &key in &copied {
            graph.node_mut(key).loop_label = label;
        }
        copies.push(copied);
    }
    Ok(copies)
}

/// Joins each weight-1 node of `a` to its counterpart in `b` through a new
/// variable node.
fn connect_graphs(a: &[Vec<NodeKey>], b: &[Vec<NodeKey>], graph: &mut Graph) {
    for (i, loop_nodes) in a.iter().enumerate() {
        for (j, &key) in loop_nodes.iter().enumerate() {
            if graph.node(key).weight == 1 {
                let v = graph.create_node(NodeType::Variable);
                graph.connect_pair(key, (NodeType::Variable, v));
                graph.connect_pair(b[i][j], (NodeType::Variable, v));
            }
        }
    }
}
