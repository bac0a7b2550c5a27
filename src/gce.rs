//! Girth-constrained extension (GCE) construction, after Gao, Liu, Jiang,
//! and Chen, "Constructing LDPC Codes with Any Desired Girth".
//!
//! The Tanner graph grows outward from a seed cycle of the target length.
//! Every extension wires two existing check nodes together through a path of
//! fresh nodes long enough that no cycle shorter than the target can close.
//! Node indices live in two pools per partition: pending (not yet wired) and
//! committed; a node moves over exactly once.

use crate::cancel::CancelToken;
use crate::error::{BuildError, Cancelled, SearchError};
use crate::linearblock::{systematic, LinearBlock};
use crate::sparse::DokMatrix;
use log::{debug, info};
use std::collections::BTreeSet;

/// Searches for a GCE parity-check matrix of `check_nodes` × `variable_nodes`
/// with the given girth. `force` finishes incomplete attempts by best-effort
/// attachments that may violate the girth target. Each improved result is
/// handed to `checkpoint` before the search continues. `Ok(None)` means no
/// attempt produced a usable graph within `iterations`.
#[allow(clippy::too_many_arguments)]
pub fn search(
    cancel: &CancelToken,
    check_nodes: usize,
    variable_nodes: usize,
    girth: usize,
    iterations: usize,
    threads: usize,
    force: bool,
    mut checkpoint: Option<&mut dyn FnMut(&LinearBlock)>,
) -> Result<Option<LinearBlock>, SearchError> {
    if girth % 2 == 1 || girth < 4 {
        return Err(SearchError::InvalidParameter(
            "girth must be an even number >= 4".to_string(),
        ));
    }
    let x = girth / 2;
    if x > check_nodes {
        return Err(SearchError::InvalidParameter(
            "girth not possible with the number of check nodes".to_string(),
        ));
    }
    if x > variable_nodes {
        return Err(SearchError::InvalidParameter(
            "girth not possible with the number of variable nodes".to_string(),
        ));
    }
    if variable_nodes <= check_nodes {
        return Err(SearchError::InvalidParameter(
            "GCE codes need more variable nodes than check nodes".to_string(),
        ));
    }

    let mut best: Option<LinearBlock> = None;
    let mut best_remaining = usize::MAX;
    for iter in 0..iterations {
        debug!("iteration {iter}");
        let mut state = GceState::new(check_nodes, variable_nodes);
        match extend_graph(cancel, &mut state, girth) {
            Ok(()) => {}
            Err(AttemptFailure::Cancelled) => return Err(Cancelled.into()),
            Err(AttemptFailure::Incomplete(msg)) => {
                debug!("iteration {iter} failed: {msg}");
            }
        }
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }

        // Attempts are ranked by how many nodes they failed to place.
        let remaining = state.remaining();
        if best.is_some() && best_remaining <= remaining {
            debug!("previous attempt was at least as good");
            continue;
        }
        let finished = state.finished();
        if !finished {
            if !state.cn.exhausted() {
                debug!("check nodes must be exhausted for a usable attempt");
                continue;
            }
            if !force {
                info!("attempt {iter} incomplete; consider enabling force");
                continue;
            }
            force_extend(cancel, &mut state, girth)?;
        }

        let block = match systematic(cancel, &state.h.to_csr(), threads) {
            Ok(block) => block,
            Err(BuildError::Cancelled(cancelled)) => return Err(cancelled.into()),
            Err(BuildError::NotSystematic) => continue,
        };
        if let Some(cb) = checkpoint.as_deref_mut() {
            cb(&block);
        }
        best = Some(block);
        best_remaining = remaining;
        if finished {
            break;
        }
    }
    if cancel.is_cancelled() {
        return Err(Cancelled.into());
    }
    Ok(best)
}

enum AttemptFailure {
    Incomplete(String),
    Cancelled,
}

struct GceState {
    h: DokMatrix,
    cn: NodePool,
    vn: NodePool,
}

impl GceState {
    fn new(check_nodes: usize, variable_nodes: usize) -> Self {
        Self {
            h: DokMatrix::zero(check_nodes, variable_nodes),
            cn: NodePool::new(check_nodes),
            vn: NodePool::new(variable_nodes),
        }
    }

    fn finished(&self) -> bool {
        self.cn.exhausted() && self.vn.exhausted()
    }

    fn remaining(&self) -> usize {
        self.cn.remaining() + self.vn.remaining()
    }
}

/// A partition's node indices, split into the pending pool (never wired) and
/// the committed pool. Together they always cover 0..count.
struct NodePool {
    committed: Vec<usize>,
    pending: Vec<usize>,
}

impl NodePool {
    fn new(count: usize) -> Self {
        Self {
            committed: Vec::new(),
            pending: (0..count).collect(),
        }
    }

    /// Commits and returns the oldest pending node.
    fn pop(&mut self) -> usize {
        let node = self.pending.remove(0);
        self.committed.push(node);
        node
    }

    fn pop_all(&mut self) {
        self.committed.append(&mut self.pending);
    }

    fn exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn extend_graph(
    cancel: &CancelToken,
    state: &mut GceState,
    girth: usize,
) -> Result<(), AttemptFailure> {
    let x = girth / 2;

    // Step 1: wire x check nodes and x variable nodes into a cycle of
    // exactly the target length.
    debug!("step 1 of 4");
    for i in 0..x {
        state.h.set(i, i, 1);
        state.h.set((i + 1) % x, i, 1);
        state.cn.pop();
        state.vn.pop();
    }

    // Step 2: exhaust the check nodes by connecting far-apart committed
    // check pairs through paths of fresh nodes.
    debug!("step 2 of 4");
    let h_const = if x % 2 == 1 { (x - 1) / 2 } else { x / 2 - 1 };
    while !state.cn.exhausted() {
        let (hops, dist) = if state.cn.remaining() >= h_const {
            (h_const, x - (x % 2))
        } else {
            (state.cn.remaining(), 2 * (x - state.cn.remaining() - 1))
        };
        let (c1, c2) = find_two_nodes(&state.h, &state.cn.committed, dist).ok_or_else(|| {
            AttemptFailure::Incomplete(format!(
                "no check pair far enough apart to exhaust check nodes ({} pending); \
                 the matrix may be too small for the requested girth",
                state.cn.remaining()
            ))
        })?;
        connect(state, c1, c2, hops)?;
        if cancel.is_cancelled() {
            return Err(AttemptFailure::Cancelled);
        }
    }

    // Step 3: exhaust the variable nodes one at a time.
    debug!("step 3 of 4");
    while !state.vn.exhausted() {
        let (c1, c2) = find_two_nodes(&state.h, &state.cn.committed, 2 * x - 2).ok_or_else(|| {
            AttemptFailure::Incomplete(format!(
                "no check pair far enough apart to exhaust variable nodes ({} pending); \
                 the matrix may be too small for the requested girth",
                state.vn.remaining()
            ))
        })?;
        connect(state, c1, c2, 0)?;
        if cancel.is_cancelled() {
            return Err(AttemptFailure::Cancelled);
        }
    }

    // Step 4: add degree-raising edges wherever a check and a variable node
    // are still far enough apart.
    debug!("step 4 of 4");
    while let Some((c1, v)) = find_two_nodes(&state.h, &state.cn.committed, 2 * x - 1) {
        state.h.set(c1, v, 1);
        if cancel.is_cancelled() {
            return Err(AttemptFailure::Cancelled);
        }
    }
    Ok(())
}

/// Best-effort completion for attempts that exhausted the check nodes but
/// not the variable nodes. The round-robin attachments ignore the girth
/// target.
fn force_extend(
    cancel: &CancelToken,
    state: &mut GceState,
    girth: usize,
) -> Result<(), Cancelled> {
    let x = girth / 2;
    debug!("force step 1 of 2");
    while let Some((c1, v)) = find_two_nodes(&state.h, &state.cn.committed, 2 * x - 1) {
        state.h.set(c1, v, 1);
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
    }

    debug!("force step 2 of 2");
    if !state.vn.exhausted() {
        let mut hosts = state.cn.committed.clone();
        hosts.sort_by_key(|&c| state.h.row_weight(c));
        // Spread the leftovers across the lightest check nodes instead of
        // dangling them all from one.
        for (i, &v) in state.vn.pending.iter().enumerate() {
            state.h.set(hosts[i % hosts.len()], v, 1);
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
        }
        state.vn.pop_all();
    }
    Ok(())
}

/// Builds the path c1 — v₀ — c — v₁ — … — v_hops — c2 out of `hops` fresh
/// check nodes and `hops + 1` fresh variable nodes.
fn connect(
    state: &mut GceState,
    c1: usize,
    c2: usize,
    hops: usize,
) -> Result<(), AttemptFailure> {
    if state.cn.remaining() < hops || state.vn.remaining() < hops + 1 {
        return Err(AttemptFailure::Incomplete(
            "ran out of pending nodes while extending the graph".to_string(),
        ));
    }
    let mut v = state.vn.pop();
    state.h.set(c1, v, 1);
    for _ in 0..hops {
        let c = state.cn.pop();
        state.h.set(c, v, 1);
        v = state.vn.pop();
        state.h.set(c, v, 1);
    }
    state.h.set(c2, v, 1);
    Ok(())
}

/// Finds a committed check node c1 and any node at BFS distance ≥ `dist`
/// from it. Candidates for c1 are tried lightest row first; among the nodes
/// on the qualifying BFS frontier the least connected wins, ties to the
/// smallest index. Even distances land on check nodes, odd on variables.
fn find_two_nodes(h: &DokMatrix, check_indices: &[usize], dist: usize) -> Option<(usize, usize)> {
    let mut candidates = check_indices.to_vec();
    candidates.sort_by_key(|&c| h.row_weight(c));
    for c1 in candidates {
        if let Some(node) = node_at_distance(h, c1, dist) {
            return Some((c1, node));
        }
    }
    None
}

/// Frontier BFS from a check node with global visited sets, so levels hold
/// nodes at exact distances. Returns the least-connected node at distance
/// `at_least`, or `None` when the frontier dies out first.
fn node_at_distance(h: &DokMatrix, check_index: usize, at_least: usize) -> Option<usize> {
    let (_, cols) = h.dims();
    let mut check_history: BTreeSet<usize> = BTreeSet::new();
    let mut variable_history: BTreeSet<usize> = BTreeSet::new();
    check_history.insert(check_index);
    let mut current = vec![check_index];

    let mut level = 0;
    while level <= 2 * cols && level < at_least {
        let mut next = Vec::new();
        if level % 2 == 0 {
            for &c in &current {
                for v in h.row_support(c) {
                    if variable_history.insert(v) {
                        next.push(v);
                    }
                }
            }
        } else {
            for &v in &current {
                for c in h.column_support(v) {
                    if check_history.insert(c) {
                        next.push(c);
                    }
                }
            }
        }
        level += 1;
        current = next;
    }
    if level < at_least || current.is_empty() {
        return None;
    }
    let frontier_is_variable = at_least % 2 == 1;
    current.sort_unstable();
    current.into_iter().min_by_key(|&n| {
        if frontier_is_variable {
            h.column_weight(n)
        } else {
            h.row_weight(n)
        }
    })
}
