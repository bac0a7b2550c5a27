//! Shortest-cycle recovery on the Tanner graph.
//!
//! Where [`crate::girth`] only reports cycle lengths, this module returns an
//! actual shortest cycle as the alternating sequence of check and variable
//! nodes along it.

use crate::girth::{tanner_adjacency, TannerAdjacency};
use crate::sparse::SparseMatrix;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

/// One node on a cycle: a check node (row) or variable node (column) index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node {
    pub index: usize,
    pub check: bool,
}

/// A cycle as the list of nodes along it, starting at a check node. The
/// closing edge back to the first node is implicit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cycle(pub Vec<Node>);

impl Cycle {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Equality up to traversal direction: both orientations around the
    /// cycle describe the same cycle.
    pub fn equivalent(&self, other: &Cycle) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        if self.0.is_empty() {
            return true;
        }
        if self.0[0] != other.0[0] {
            return false;
        }
        let t1 = &self.0[1..];
        let t2 = &other.0[1..];
        t1.iter().eq(t2.iter()) || t1.iter().eq(t2.iter().rev())
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}:{}", if n.check { "c" } else { "v" }, n.index)?;
        }
        write!(f, "]")
    }
}

/// Returns a cycle from the set of smallest cycles of the Tanner graph of
/// `m`, or an empty cycle if the graph is acyclic. Start-node scans share a
/// shrinking length bound; with `parallel` they run on the rayon pool.
pub fn smallest_cycle(m: &SparseMatrix, parallel: bool) -> Cycle {
    let (rows, _) = m.dims();
    let adjacency = tanner_adjacency(m);
    let best: Mutex<Vec<Node>> = Mutex::new(Vec::new());
    let scan = |index: usize| {
        let cap = {
            let guard = best.lock().expect("cycle bound lock poisoned");
            if guard.is_empty() {
                None
            } else {
                Some(guard.len() - 2)
            }
        };
        let found = smallest_cycle_from(&adjacency, index, cap);
        let mut guard = best.lock().expect("cycle bound lock poisoned");
        if guard.is_empty() || (!found.is_empty() && guard.len() > found.len()) {
            *guard = found;
        }
    };
    if parallel {
        (0..rows).into_par_iter().for_each(scan);
    } else {
        (0..rows).for_each(scan);
    }
    Cycle(best.into_inner().expect("cycle bound lock poisoned"))
}

/// BFS with per-level parent maps, as in the girth scan, but when a cycle
/// closes the two meeting branches are walked back through the level history
/// to materialize the node path.
fn smallest_cycle_from(
    adjacency: &TannerAdjacency,
    check_index: usize,
    min_girth: Option<usize>,
) -> Vec<Node> {
    let rows = adjacency.rows.len();
    let mut hop: BTreeMap<usize, usize> = BTreeMap::new();
    for &v in &adjacency.rows[check_index] {
        hop.insert(v, check_index);
    }
    if hop.len() <= 1 {
        return Vec::new();
    }
    let mut history = vec![hop];

    let level_cap = min_girth.map_or(usize::MAX, |g| g / 2 + 1);
    for level in 1..(2 * rows).min(level_cap) {
        let mut hop: BTreeMap<usize, usize> = BTreeMap::new();
        let prev: Vec<(usize, usize)> = history[level - 1]
            .iter()
            .map(|(&node, &parent)| (node, parent))
            .collect();
        for (v, parent) in prev {
            let (neighbors, new_is_check) = if level % 2 == 0 {
                (&adjacency.rows[v], false)
            } else {
                (&adjacency.cols[v], true)
            };
            for &i in neighbors {
                if i == parent {
                    continue;
                }
                if let Some(&other_parent) = hop.get(&i) {
                    return meet_cycle(
                        &history,
                        check_index,
                        other_parent,
                        v,
                        Node {
                            index: i,
                            check: new_is_check,
                        },
                    );
                }
                if new_is_check && i == check_index {
                    return root_cycle(&history, check_index, v);
                }
                hop.insert(i, v);
            }
        }
        if hop.is_empty() {
            break;
        }
        history.push(hop);
    }
    Vec::new()
}

/// Two branches met at a freshly discovered node: the cycle is the root,
/// one branch down to the meeting node, and the other branch walked back up.
fn meet_cycle(
    history: &[BTreeMap<usize, usize>],
    check_index: usize,
    first_parent: usize,
    second_parent: usize,
    meeting: Node,
) -> Vec<Node> {
    let parents_are_checks = !meeting.check;
    let down = branch(history, first_parent, parents_are_checks);
    let up = branch(history, second_parent, parents_are_checks);

    let mut cycle = Vec::with_capacity(down.len() + up.len() + 2);
    cycle.push(Node {
        index: check_index,
        check: true,
    });
    cycle.extend(down);
    cycle.push(meeting);
    cycle.extend(up.into_iter().rev());
    cycle
}

/// A variable hop reached the root again: the cycle is the root plus the
/// branch leading to that variable node.
fn root_cycle(history: &[BTreeMap<usize, usize>], check_index: usize, last: usize) -> Vec<Node> {
    let mut cycle = Vec::with_capacity(history.len() + 1);
    cycle.push(Node {
        index: check_index,
        check: true,
    });
    cycle.extend(branch(history, last, false));
    cycle
}

/// Walks parents from `index` (a member of the newest history level) back to
/// the root, returning the nodes in root-to-node order. The root itself is
/// excluded.
fn branch(history: &[BTreeMap<usize, usize>], mut index: usize, mut check: bool) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(history.len());
    for level in (0..history.len()).rev() {
        nodes.push(Node { index, check });
        index = history[level][&index];
        check = !check;
    }
    nodes.reverse();
    nodes
}
