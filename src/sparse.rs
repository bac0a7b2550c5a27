//! Sparse vectors and matrices over GF(2).
//!
//! Two matrix representations are provided. [`SparseMatrix`] is
//! row-compressed (one sorted support list per row) and backs everything that
//! mutates or scans rows: elimination, girth scans, decoders. [`DokMatrix`]
//! is a dictionary-of-keys map suited to the cell-at-a-time construction done
//! by the code searches, and freezes into a `SparseMatrix` when done.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid support for sparse vector: {0}")]
pub struct InvalidSupport(pub String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid sparse matrix: {0}")]
pub struct InvalidMatrix(pub String);

/// A GF(2) vector stored as the ordered list of its non-zero positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparseVector {
    len: usize,
    support: Vec<usize>,
}

impl SparseVector {
    pub fn zero(len: usize) -> Self {
        Self {
            len,
            support: Vec::new(),
        }
    }

    /// Builds a vector from dense 0/1 entries. Any non-zero byte counts as 1.
    pub fn from_bits(bits: &[u8]) -> Self {
        Self {
            len: bits.len(),
            support: bits
                .iter()
                .enumerate()
                .filter(|(_, &b)| b != 0)
                .map(|(i, _)| i)
                .collect(),
        }
    }

    pub fn from_support(len: usize, mut support: Vec<usize>) -> Result<Self, InvalidSupport> {
        support.sort_unstable();
        support.dedup();
        if let Some(&max) = support.last() {
            if max >= len {
                return Err(InvalidSupport(format!(
                    "index {max} out of range for length {len}"
                )));
            }
        }
        Ok(Self { len, support })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Non-zero positions in ascending order.
    #[inline]
    pub fn support(&self) -> &[usize] {
        &self.support
    }

    #[inline]
    pub fn hamming_weight(&self) -> usize {
        self.support.len()
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.support.is_empty()
    }

    pub fn at(&self, i: usize) -> u8 {
        assert!(i < self.len, "index {} out of range for length {}", i, self.len);
        u8::from(self.support.binary_search(&i).is_ok())
    }

    /// Sets position `i` to `value` mod 2.
    pub fn set(&mut self, i: usize, value: u8) {
        assert!(i < self.len, "index {} out of range for length {}", i, self.len);
        match (self.support.binary_search(&i), value & 1) {
            (Ok(pos), 0) => {
                self.support.remove(pos);
            }
            (Err(pos), 1) => {
                self.support.insert(pos, i);
            }
            _ => {}
        }
    }

    pub fn flip(&mut self, i: usize) {
        let value = self.at(i) ^ 1;
        self.set(i, value);
    }

    /// Number of positions where `self` and `other` differ.
    pub fn hamming_distance(&self, other: &Self) -> usize {
        assert_eq!(self.len, other.len, "vector lengths must match");
        let mut count = 0;
        let (mut i, mut j) = (0, 0);
        while i < self.support.len() && j < other.support.len() {
            match self.support[i].cmp(&other.support[j]) {
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => {
                    count += 1;
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    count += 1;
                    j += 1;
                }
            }
        }
        count + (self.support.len() - i) + (other.support.len() - j)
    }

    /// In GF(2) addition and subtraction are both XOR.
    pub fn xor_assign(&mut self, other: &Self) {
        assert_eq!(self.len, other.len, "vector lengths must match");
        let mut merged = Vec::with_capacity(self.support.len() + other.support.len());
        let (mut i, mut j) = (0, 0);
        while i < self.support.len() && j < other.support.len() {
            match self.support[i].cmp(&other.support[j]) {
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => {
                    merged.push(self.support[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(other.support[j]);
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.support[i..]);
        merged.extend_from_slice(&other.support[j..]);
        self.support = merged;
    }

    /// Dot product over GF(2): the parity of the overlap.
    pub fn dot(&self, other: &Self) -> u8 {
        let mut overlap = 0usize;
        let (mut i, mut j) = (0, 0);
        while i < self.support.len() && j < other.support.len() {
            match self.support[i].cmp(&other.support[j]) {
                std::cmp::Ordering::Equal => {
                    overlap += 1;
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        (overlap % 2) as u8
    }

    /// The sub-vector covering positions `start..end`.
    pub fn slice(&self, start: usize, end: usize) -> SparseVector {
        assert!(start <= end && end <= self.len, "slice out of range");
        let support = self
            .support
            .iter()
            .filter(|&&i| start <= i && i < end)
            .map(|&i| i - start)
            .collect();
        SparseVector {
            len: end - start,
            support,
        }
    }
}

impl fmt::Display for SparseVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for i in 0..self.len {
            write!(f, "{}", self.at(i))?;
        }
        Ok(())
    }
}

/// A GF(2) matrix in row-compressed form: one [`SparseVector`] per row.
///
/// Serialized as `{rows, cols, data}` where `data` holds the per-row ordered
/// non-zero column indices; deserialization rejects unsorted or out-of-range
/// entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix", into = "RawMatrix")]
pub struct SparseMatrix {
    cols: usize,
    rows: Vec<SparseVector>,
}

impl SparseMatrix {
    pub fn zero(rows: usize, cols: usize) -> Self {
        Self {
            cols,
            rows: vec![SparseVector::zero(cols); rows],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zero(n, n);
        for i in 0..n {
            m.set(i, i, 1);
        }
        m
    }

    /// Builds a matrix from dense row-major 0/1 entries. Handy in tests.
    pub fn from_dense(rows: usize, cols: usize, bits: &[u8]) -> Self {
        assert_eq!(bits.len(), rows * cols, "need rows * cols entries");
        Self {
            cols,
            rows: bits.chunks(cols).map(SparseVector::from_bits).collect(),
        }
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.rows.len(), self.cols)
    }

    pub fn at(&self, i: usize, j: usize) -> u8 {
        self.rows[i].at(j)
    }

    pub fn set(&mut self, i: usize, j: usize, value: u8) {
        self.rows[i].set(j, value);
    }

    #[inline]
    pub fn row(&self, i: usize) -> &SparseVector {
        &self.rows[i]
    }

    /// Column `j` as a vector of length `rows`. Built by scanning rows, so
    /// prefer caching the result when a column is read repeatedly.
    pub fn column(&self, j: usize) -> SparseVector {
        SparseVector {
            len: self.rows.len(),
            support: self.column_support(j),
        }
    }

    /// Row indices with a 1 in column `j`, ascending.
    pub fn column_support(&self, j: usize) -> Vec<usize> {
        assert!(j < self.cols, "column {} out of range", j);
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.support.binary_search(&j).is_ok())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        self.rows.swap(a, b);
    }

    pub fn swap_columns(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for row in &mut self.rows {
            let has_a = row.support.binary_search(&a).is_ok();
            let has_b = row.support.binary_search(&b).is_ok();
            if has_a != has_b {
                row.set(a, u8::from(has_b));
                row.set(b, u8::from(has_a));
            }
        }
    }

    /// Row `dst` becomes `src XOR dst`.
    pub fn add_rows(&mut self, src: usize, dst: usize) {
        assert_ne!(src, dst, "source and destination rows must differ");
        let src_row = self.rows[src].clone();
        self.rows[dst].xor_assign(&src_row);
    }

    /// XORs row `src` into every row listed in `targets`, one parallel task
    /// per target row. Targets must be distinct and must not contain `src`;
    /// each task then mutates a disjoint row and no locking is needed.
    pub fn xor_rows_into(&mut self, src: usize, targets: &[usize]) {
        let mut selected = vec![false; self.rows.len()];
        for &t in targets {
            assert_ne!(t, src, "source row cannot be a target");
            selected[t] = true;
        }
        let src_row = self.rows[src].clone();
        self.rows
            .par_iter_mut()
            .enumerate()
            .filter(|(i, _)| selected[*i])
            .for_each(|(_, row)| row.xor_assign(&src_row));
    }

    /// The sub-matrix of `row_count` rows and `col_count` columns starting at
    /// `(row_start, col_start)`.
    pub fn slice(
        &self,
        row_start: usize,
        col_start: usize,
        row_count: usize,
        col_count: usize,
    ) -> SparseMatrix {
        assert!(row_start + row_count <= self.rows.len(), "row slice out of range");
        assert!(col_start + col_count <= self.cols, "column slice out of range");
        SparseMatrix {
            cols: col_count,
            rows: self.rows[row_start..row_start + row_count]
                .iter()
                .map(|row| row.slice(col_start, col_start + col_count))
                .collect(),
        }
    }

    /// Matrix-vector product over GF(2): each entry is the parity of the
    /// overlap between a row and `v`. This is the syndrome map for a
    /// parity-check matrix.
    pub fn mul_vector(&self, v: &SparseVector) -> SparseVector {
        assert_eq!(v.len(), self.cols, "vector length must equal column count");
        SparseVector {
            len: self.rows.len(),
            support: self
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| row.dot(v) == 1)
                .map(|(i, _)| i)
                .collect(),
        }
    }

    /// Vector-matrix product over GF(2): the XOR of the rows selected by the
    /// non-zeros of `v`. This is the encoding map for a generator matrix.
    pub fn vector_mul(&self, v: &SparseVector) -> SparseVector {
        assert_eq!(v.len(), self.rows.len(), "vector length must equal row count");
        let mut result = SparseVector::zero(self.cols);
        for &i in v.support() {
            result.xor_assign(&self.rows[i]);
        }
        result
    }

    /// Total number of non-zero entries, which is also the edge count of the
    /// induced Tanner graph.
    pub fn edges(&self) -> usize {
        self.rows.iter().map(|row| row.hamming_weight()).sum()
    }
}

impl fmt::Display for SparseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Vec<usize>>,
}

impl TryFrom<RawMatrix> for SparseMatrix {
    type Error = InvalidMatrix;

    fn try_from(raw: RawMatrix) -> Result<Self, InvalidMatrix> {
        if raw.data.len() != raw.rows {
            return Err(InvalidMatrix(format!(
                "expected {} rows, found {}",
                raw.rows,
                raw.data.len()
            )));
        }
        let mut rows = Vec::with_capacity(raw.rows);
        for (i, support) in raw.data.into_iter().enumerate() {
            if !support.windows(2).all(|w| w[0] < w[1]) {
                return Err(InvalidMatrix(format!("row {i} support is not ascending")));
            }
            if support.last().is_some_and(|&max| max >= raw.cols) {
                return Err(InvalidMatrix(format!(
                    "row {} has a column index outside 0..{}",
                    i, raw.cols
                )));
            }
            rows.push(SparseVector {
                len: raw.cols,
                support,
            });
        }
        Ok(SparseMatrix {
            cols: raw.cols,
            rows,
        })
    }
}

impl From<SparseMatrix> for RawMatrix {
    fn from(m: SparseMatrix) -> Self {
        RawMatrix {
            rows: m.rows.len(),
            cols: m.cols,
            data: m.rows.into_iter().map(|row| row.support).collect(),
        }
    }
}

/// A GF(2) matrix as a dictionary of keys, for cheap cell-at-a-time
/// construction. Freeze with [`DokMatrix::to_csr`] once the structure is
/// settled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DokMatrix {
    rows: usize,
    cols: usize,
    data: BTreeMap<usize, BTreeSet<usize>>,
}

impl DokMatrix {
    pub fn zero(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn at(&self, i: usize, j: usize) -> u8 {
        assert!(i < self.rows && j < self.cols, "index out of range");
        u8::from(self.data.get(&i).is_some_and(|row| row.contains(&j)))
    }

    pub fn set(&mut self, i: usize, j: usize, value: u8) {
        assert!(i < self.rows && j < self.cols, "index out of range");
        if value & 1 == 1 {
            self.data.entry(i).or_default().insert(j);
        } else if let Some(row) = self.data.get_mut(&i) {
            row.remove(&j);
        }
    }

    pub fn row_support(&self, i: usize) -> Vec<usize> {
        self.data
            .get(&i)
            .map(|row| row.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn row_weight(&self, i: usize) -> usize {
        self.data.get(&i).map_or(0, BTreeSet::len)
    }

    pub fn column_support(&self, j: usize) -> Vec<usize> {
        self.data
            .iter()
            .filter(|(_, row)| row.contains(&j))
            .map(|(&i, _)| i)
            .collect()
    }

    pub fn column_weight(&self, j: usize) -> usize {
        self.data.values().filter(|row| row.contains(&j)).count()
    }

    pub fn clear_row(&mut self, i: usize) {
        assert!(i < self.rows, "index out of range");
        self.data.remove(&i);
    }

    /// Copies `other` into this matrix with its top-left corner at
    /// `(row_offset, col_offset)`.
    pub fn set_matrix(&mut self, other: &DokMatrix, row_offset: usize, col_offset: usize) {
        assert!(row_offset + other.rows <= self.rows, "row offset out of range");
        assert!(col_offset + other.cols <= self.cols, "column offset out of range");
        for (&i, row) in &other.data {
            for &j in row {
                self.set(i + row_offset, j + col_offset, 1);
            }
        }
    }

    pub fn to_csr(&self) -> SparseMatrix {
        SparseMatrix {
            cols: self.cols,
            rows: (0..self.rows)
                .map(|i| SparseVector {
                    len: self.cols,
                    support: self.row_support(i),
                })
                .collect(),
        }
    }
}
