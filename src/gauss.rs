//! Gaussian–Jordan elimination over GF(2) with column pivoting.
//!
//! The lower-triangular pass produces row echelon form and the rank; a
//! second pass clears above the diagonal for reduced row echelon form.
//! Column swaps are recorded so callers can recover the permutation that
//! makes the result systematic. Row XOR is the only mutation inside the
//! elimination loops and always targets rows disjoint from the pivot row,
//! so the per-row tasks run in parallel without locking.

use crate::cancel::CancelToken;
use crate::error::Cancelled;
use crate::sparse::SparseMatrix;
use log::{debug, warn};
use rayon::ThreadPool;

/// Result of a full elimination: the reduced matrix (truncated to `rank`
/// rows when the input had dependent rows), the column permutation applied,
/// and the rank.
#[derive(Clone, Debug)]
pub struct Reduction {
    pub matrix: SparseMatrix,
    pub column_order: Vec<usize>,
    pub rank: usize,
}

/// Builds a pool with `threads` workers; 0 means one per CPU.
pub(crate) fn thread_pool(threads: usize) -> ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .expect("must be able to construct thread pool")
}

pub fn gaussian_jordan_gf2(
    cancel: &CancelToken,
    h: &SparseMatrix,
    threads: usize,
) -> Result<Reduction, Cancelled> {
    debug!("preparing matrix for Gaussian-Jordan elimination");
    let (rows, cols) = h.dims();
    let mut result = h.clone();
    let mut column_order: Vec<usize> = (0..cols).collect();
    let pool = thread_pool(threads);

    let rank = lower_triangular(cancel, rows.min(cols), &mut result, &mut column_order, &pool)?;
    if rank != rows {
        warn!("only {rank} rows of {rows} linearly independent");
    }

    upper_triangular(cancel, rows.min(cols), &mut result, &pool)?;
    debug!("Gaussian-Jordan elimination complete");

    if rank != rows {
        result = result.slice(0, 0, rank, cols);
    }
    Ok(Reduction {
        matrix: result,
        column_order,
        rank,
    })
}

/// Rank of `h`, computed by the row echelon pass alone on a scratch copy.
pub fn calculate_rank(
    cancel: &CancelToken,
    h: &SparseMatrix,
    threads: usize,
) -> Result<usize, Cancelled> {
    let (rows, cols) = h.dims();
    let mut tmp = h.clone();
    let mut column_order: Vec<usize> = (0..cols).collect();
    let pool = thread_pool(threads);
    lower_triangular(cancel, rows.min(cols), &mut tmp, &mut column_order, &pool)
}

fn lower_triangular(
    cancel: &CancelToken,
    limit: usize,
    m: &mut SparseMatrix,
    column_order: &mut [usize],
    pool: &ThreadPool,
) -> Result<usize, Cancelled> {
    debug!("row echelon pass");
    let mut rows_with_pivots = 0;
    for r in 0..limit {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let pivots = match pivots_swap_return(m, r, column_order) {
            Some(pivots) => pivots,
            None => continue,
        };
        rows_with_pivots += 1;

        // The pivot ends up in row r; every lower row with a 1 in column r
        // absorbs it.
        let pivot_row = *pivots.last().expect("pivot list is non-empty");
        m.swap_rows(r, pivot_row);

        let targets: Vec<usize> = m.column_support(r).into_iter().filter(|&i| i > r).collect();
        if !targets.is_empty() {
            pool.install(|| m.xor_rows_into(r, &targets));
        }
    }

    if rows_with_pivots != limit {
        debug!(
            "consolidating {} linearly dependent rows to the bottom",
            limit - rows_with_pivots
        );
        let mut curr = 0;
        while curr < limit {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            if m.at(curr, curr) == 0 {
                let mut replace = curr + 1;
                while replace < limit && m.at(replace, replace) == 0 {
                    replace += 1;
                }
                if replace == limit {
                    // Everything below is zero; the matrix is ordered.
                    break;
                }
                // The row swap needs no bookkeeping but the column swap does.
                m.swap_rows(curr, replace);
                m.swap_columns(curr, replace);
                column_order.swap(curr, replace);
            }
            curr += 1;
        }
    }

    Ok(rows_with_pivots)
}

fn upper_triangular(
    cancel: &CancelToken,
    limit: usize,
    m: &mut SparseMatrix,
    pool: &ThreadPool,
) -> Result<(), Cancelled> {
    debug!("reduced row echelon pass");
    for r in 0..limit {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if m.at(r, r) == 0 {
            continue;
        }
        let targets: Vec<usize> = m.column_support(r).into_iter().filter(|&i| i != r).collect();
        if !targets.is_empty() {
            pool.install(|| m.xor_rows_into(r, &targets));
        }
    }
    Ok(())
}

/// Returns the rows carrying a 1 in column `r`, swapping a later column into
/// position `r` first if none of them sit at or below the diagonal. `None`
/// means no pivot can be produced for this row: the remaining rows span
/// nothing new.
fn pivots_swap_return(
    m: &mut SparseMatrix,
    r: usize,
    column_order: &mut [usize],
) -> Option<Vec<usize>> {
    let mut pivots = m.column_support(r);
    if pivots.last().map_or(true, |&last| last < r) {
        let col = find_pivot_col(m, r)?;
        m.swap_columns(r, col);
        column_order.swap(r, col);
        pivots = m.column_support(r);
    }
    Some(pivots)
}

/// The last non-zero column of the first row at or below `for_row` whose last
/// non-zero column lies beyond `for_row`.
fn find_pivot_col(m: &SparseMatrix, for_row: usize) -> Option<usize> {
    let (rows, _) = m.dims();
    for r in for_row..rows {
        if let Some(&col) = m.row(r).support().last() {
            if col > for_row {
                return Some(col);
            }
        }
    }
    None
}

/// Applies a column permutation: column `c` of the result is column
/// `order[c]` of `h`.
pub fn column_swapped(h: &SparseMatrix, order: &[usize]) -> SparseMatrix {
    let (rows, cols) = h.dims();
    assert_eq!(cols, order.len(), "order length must equal column count");
    let mut result = SparseMatrix::zero(rows, cols);
    for (c, &c1) in order.iter().enumerate() {
        for i in h.column_support(c1) {
            result.set(i, c, 1);
        }
    }
    result
}

/// Tests G·Hᵀ = 0 over GF(2).
pub fn validate_hg(g: &SparseMatrix, h: &SparseMatrix) -> bool {
    let (g_rows, _) = g.dims();
    let (h_rows, _) = h.dims();
    (0..g_rows).all(|i| (0..h_rows).all(|j| g.row(i).dot(h.row(j)) == 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_rank_systematic_input_is_unchanged() {
        let h = SparseMatrix::from_dense(
            3,
            7,
            &[1, 0, 0, 1, 1, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 1],
        );
        let red = gaussian_jordan_gf2(&CancelToken::new(), &h, 0).unwrap();
        assert_eq!(red.rank, 3);
        assert_eq!(red.matrix, h);
        assert_eq!(red.column_order, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn dependent_row_is_truncated() {
        // Row 2 equals row 0 XOR row 1.
        let h = SparseMatrix::from_dense(
            4,
            5,
            &[1, 1, 0, 0, 0, 0, 1, 1, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 1, 1],
        );
        let red = gaussian_jordan_gf2(&CancelToken::new(), &h, 0).unwrap();
        assert_eq!(red.rank, 3);
        let (rows, cols) = red.matrix.dims();
        assert_eq!((rows, cols), (3, 5));
        assert_eq!(red.matrix.slice(0, 0, 3, 3), SparseMatrix::identity(3));
    }

    #[test]
    fn rank_of_identity_and_repeats() {
        let cancel = CancelToken::new();
        assert_eq!(calculate_rank(&cancel, &SparseMatrix::identity(5), 0).unwrap(), 5);
        let repeated = SparseMatrix::from_dense(2, 2, &[1, 1, 1, 1]);
        assert_eq!(calculate_rank(&cancel, &repeated, 0).unwrap(), 1);
    }

    #[test]
    fn cancelled_elimination_reports_it() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let h = SparseMatrix::identity(4);
        assert!(gaussian_jordan_gf2(&cancel, &h, 1).is_err());
        assert!(calculate_rank(&cancel, &h, 1).is_err());
    }

    #[test]
    fn column_swapped_permutes() {
        let h = SparseMatrix::from_dense(2, 3, &[1, 0, 1, 0, 1, 0]);
        let swapped = column_swapped(&h, &[2, 0, 1]);
        assert_eq!(swapped, SparseMatrix::from_dense(2, 3, &[1, 1, 0, 0, 0, 1]));
    }

    #[test]
    fn validate_detects_mismatch() {
        let g = SparseMatrix::from_dense(1, 3, &[1, 1, 0]);
        let h_good = SparseMatrix::from_dense(1, 3, &[1, 1, 1]);
        let h_bad = SparseMatrix::from_dense(1, 3, &[1, 0, 0]);
        assert!(validate_hg(&g, &h_good));
        assert!(!validate_hg(&g, &h_bad));
    }
}
