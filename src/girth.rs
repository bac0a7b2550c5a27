//! Tanner-graph girth scans.
//!
//! Every scan runs one BFS per check node. Levels alternate between variable
//! and check hops; each level keeps a map from node to the parent it was
//! reached through, and a cycle closes when a node is reached twice within a
//! level (or a variable hop returns to the start check node). A cycle closed
//! while expanding level `l` has length `2(l+1)`.
//!
//! Results are `Option<usize>`: `None` means no cycle was found within the
//! requested cap (or at all).

use crate::cancel::CancelToken;
use crate::gauss::thread_pool;
use crate::sparse::SparseMatrix;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::RwLock;

/// Row and column adjacency of the Tanner graph, cached so BFS hops avoid
/// rescanning the matrix for column supports.
pub(crate) struct TannerAdjacency {
    pub rows: Vec<Vec<usize>>,
    pub cols: Vec<Vec<usize>>,
}

pub(crate) fn tanner_adjacency(m: &SparseMatrix) -> TannerAdjacency {
    let (rows, cols) = m.dims();
    let row_adj: Vec<Vec<usize>> = (0..rows).map(|i| m.row(i).support().to_vec()).collect();
    let mut col_adj = vec![Vec::new(); cols];
    for (i, row) in row_adj.iter().enumerate() {
        for &j in row {
            col_adj[j].push(i);
        }
    }
    TannerAdjacency {
        rows: row_adj,
        cols: col_adj,
    }
}

/// A cheap necessary condition: a bipartite graph free of all cycles of
/// length ≤ `min_girth` has at most n^(1+2/min_girth) + n edges, n counting
/// both partitions. Returns false when the edge count alone rules the
/// target girth out.
pub fn girth_lower_bound_by_edges(m: &SparseMatrix, min_girth: usize) -> bool {
    let (rows, cols) = m.dims();
    let edges = m.edges();
    let n = (rows + cols) as f64;
    let bound = n.powf(1.0 + 1.0 / (min_girth as f64 / 2.0)) + n;
    (bound as usize) >= edges
}

/// The girth of the Tanner graph of `m`, or `None` if it is acyclic.
pub fn calculate_girth(cancel: &CancelToken, m: &SparseMatrix, threads: usize) -> Option<usize> {
    calculate_girth_lower_bound(cancel, m, None, threads)
}

/// Searches for cycles of length ≤ `smallest_girth` (unbounded when `None`)
/// and returns the shortest length found. The discovered lengths act as a
/// monotonically decreasing cap shared by all start-node tasks.
///
/// Panics if `smallest_girth` is odd or below 4. Under cancellation the
/// best-known result so far is returned, possibly `None`.
pub fn calculate_girth_lower_bound(
    cancel: &CancelToken,
    m: &SparseMatrix,
    smallest_girth: Option<usize>,
    threads: usize,
) -> Option<usize> {
    if let Some(g) = smallest_girth {
        assert!(g >= 4 && g % 2 == 0, "girth cap must be an even number >= 4");
    }
    let (rows, _) = m.dims();
    let adjacency = tanner_adjacency(m);
    let pool = thread_pool(threads);
    // (shrinking cap, best length found)
    let bound = RwLock::new((smallest_girth, None));
    pool.install(|| {
        (0..rows).into_par_iter().for_each(|index| {
            if cancel.is_cancelled() {
                return;
            }
            let cap = bound.read().expect("girth bound lock poisoned").0;
            if let Some(g) = cycle_search(cancel, &adjacency, index, cap) {
                let mut guard = bound.write().expect("girth bound lock poisoned");
                if guard.0.map_or(true, |cap| g <= cap) {
                    *guard = (Some(g), Some(g));
                }
            }
        });
    });
    bound.into_inner().expect("girth bound lock poisoned").1
}

/// True if any cycle strictly shorter than `cycle_len` exists. Short-circuits
/// across start nodes once one is found.
///
/// Panics if `cycle_len` < 4.
pub fn has_girth_smaller_than(
    cancel: &CancelToken,
    m: &SparseMatrix,
    cycle_len: usize,
    threads: usize,
) -> bool {
    assert!(cycle_len >= 4, "cycle length must be >= 4");
    let (rows, _) = m.dims();
    let adjacency = tanner_adjacency(m);
    let pool = thread_pool(threads);
    let smaller = RwLock::new(false);
    pool.install(|| {
        (0..rows).into_par_iter().for_each(|index| {
            if cancel.is_cancelled() || *smaller.read().expect("girth flag lock poisoned") {
                return;
            }
            if let Some(g) = cycle_search(cancel, &adjacency, index, Some(cycle_len)) {
                if g < cycle_len {
                    *smaller.write().expect("girth flag lock poisoned") = true;
                }
            }
        });
    });
    smaller.into_inner().expect("girth flag lock poisoned")
}

/// BFS from one check node, reporting the length of the first cycle closed
/// through it, capped at `max_girth` levels deep.
pub fn cycle_lower_bound(
    cancel: &CancelToken,
    m: &SparseMatrix,
    check_index: usize,
    max_girth: Option<usize>,
) -> Option<usize> {
    cycle_search(cancel, &tanner_adjacency(m), check_index, max_girth)
}

fn cycle_search(
    cancel: &CancelToken,
    adjacency: &TannerAdjacency,
    check_index: usize,
    max_girth: Option<usize>,
) -> Option<usize> {
    let rows = adjacency.rows.len();
    let mut hop: HashMap<usize, usize> = HashMap::new();
    for &v in &adjacency.rows[check_index] {
        hop.insert(v, check_index);
    }
    // A single outgoing edge can never close a loop through this node.
    if hop.len() <= 1 {
        return None;
    }
    let mut history = vec![hop];

    let level_cap = max_girth.map_or(usize::MAX, |g| g / 2 + 1);
    for level in 1..(2 * rows).min(level_cap) {
        if cancel.is_cancelled() {
            return None;
        }
        let prev = &history[level - 1];
        let mut hop: HashMap<usize, usize> = HashMap::new();
        for (&v, &parent) in prev {
            let neighbors = if level % 2 == 0 {
                &adjacency.rows[v]
            } else {
                &adjacency.cols[v]
            };
            for &i in neighbors {
                if i == parent {
                    continue;
                }
                if hop.contains_key(&i) || (level % 2 == 1 && i == check_index) {
                    return Some((level + 1) * 2);
                }
                hop.insert(i, v);
            }
        }
        if hop.is_empty() {
            return None;
        }
        history.push(hop);
    }
    None
}
