//! Tanner-graph export.

use crate::sparse::SparseMatrix;
use petgraph::graph::UnGraph;

/// One side of the bipartite Tanner graph: a parity check (row) or a code
/// symbol (column).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TannerNode {
    Check(usize),
    Variable(usize),
}

/// The Tanner graph of `m` as an undirected petgraph graph: check nodes
/// first, then variable nodes, one edge per non-zero entry.
pub fn tanner_graph(m: &SparseMatrix) -> UnGraph<TannerNode, ()> {
    let (rows, cols) = m.dims();
    let mut graph = UnGraph::with_capacity(rows + cols, m.edges());
    let checks: Vec<_> = (0..rows)
        .map(|i| graph.add_node(TannerNode::Check(i)))
        .collect();
    let variables: Vec<_> = (0..cols)
        .map(|j| graph.add_node(TannerNode::Variable(j)))
        .collect();
    for i in 0..rows {
        for &j in m.row(i).support() {
            graph.add_edge(checks[i], variables[j], ());
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::girth::calculate_girth;
    use petgraph::algo::connected_components;

    /// E − V + C counts independent cycles; zero means forest.
    fn cycle_rank(m: &SparseMatrix) -> usize {
        let graph = tanner_graph(m);
        let c = connected_components(&graph);
        graph.edge_count() + c - graph.node_count()
    }

    #[test]
    fn shape() {
        let m = SparseMatrix::from_dense(2, 3, &[1, 1, 0, 0, 1, 1]);
        let graph = tanner_graph(&m);
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn girth_agrees_with_cycle_rank() {
        let cancel = CancelToken::new();
        let cyclic = SparseMatrix::from_dense(2, 2, &[1, 1, 1, 1]);
        assert!(cycle_rank(&cyclic) > 0);
        assert!(calculate_girth(&cancel, &cyclic, 1).is_some());

        let forest = SparseMatrix::identity(5);
        assert_eq!(cycle_rank(&forest), 0);
        assert!(calculate_girth(&cancel, &forest, 1).is_none());

        let tree = SparseMatrix::from_dense(2, 3, &[1, 1, 0, 0, 1, 1]);
        assert_eq!(cycle_rank(&tree), 0);
        assert!(calculate_girth(&cancel, &tree, 1).is_none());
    }
}
