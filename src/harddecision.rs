//! Hard-decision bit-flipping decoders for the binary symmetric channel.
//!
//! The decoders are exchangeable capabilities behind [`BitFlip`]: given the
//! current syndrome and codeword they flip one bit per round until the
//! syndrome clears. [`bit_flipping`] is the shared driver loop.

use crate::sparse::{SparseMatrix, SparseVector};
use nalgebra::DMatrix;

pub trait BitFlip {
    /// One flipping round. Returns the next codeword and whether decoding is
    /// finished (the syndrome was zero).
    fn flip(&mut self, syndrome: &SparseVector, codeword: &SparseVector) -> (SparseVector, bool);

    /// Clears per-codeword state. Call before decoding the next codeword.
    fn reset(&mut self);
}

/// Runs `alg` for up to `max_iterations` rounds, recomputing the syndrome
/// from `h` each time.
pub fn bit_flipping(
    alg: &mut dyn BitFlip,
    h: &SparseMatrix,
    codeword: &SparseVector,
    max_iterations: usize,
) -> SparseVector {
    let mut result = codeword.clone();
    for _ in 0..max_iterations {
        let syndrome = h.mul_vector(&result);
        let (next, done) = alg.flip(&syndrome, &result);
        result = next;
        if done {
            break;
        }
    }
    result
}

fn arg_max_int(values: &[i64]) -> usize {
    let mut result = 0;
    let mut max = values[0];
    for (i, &v) in values.iter().enumerate().skip(1) {
        if max < v {
            result = i;
            max = v;
        }
    }
    result
}

fn arg_max_float(values: &[f64]) -> usize {
    let mut result = 0;
    let mut max = values[0];
    for (i, &v) in values.iter().enumerate().skip(1) {
        if max < v {
            result = i;
            max = v;
        }
    }
    result
}

/// Gallager's hard-decision rule: flip the bit participating in the most
/// unsatisfied parity checks. E[n] = 2·|{m ∈ M(n) : s_m = 1}| − |M(n)|;
/// the first maximal index wins ties.
pub struct Gallager<'a> {
    h: &'a SparseMatrix,
    e_n: Vec<i64>,
    column_cache: Option<Vec<Vec<usize>>>,
}

impl<'a> Gallager<'a> {
    pub fn new(h: &'a SparseMatrix) -> Self {
        Self {
            h,
            e_n: Vec::new(),
            column_cache: None,
        }
    }

    fn ensure_cache(&mut self) {
        if self.column_cache.is_some() {
            return;
        }
        let (_, cols) = self.h.dims();
        self.e_n = vec![0; cols];
        self.column_cache = Some((0..cols).map(|n| self.h.column_support(n)).collect());
    }

    fn next_e(&mut self, syndrome: &SparseVector) {
        let column_cache = self.column_cache.as_ref().expect("cache built before use");
        let unsatisfied = syndrome.support();
        for (n, checks) in column_cache.iter().enumerate() {
            let mut hits = 0i64;
            let (mut i, mut j) = (0, 0);
            while i < checks.len() && j < unsatisfied.len() {
                match checks[i].cmp(&unsatisfied[j]) {
                    std::cmp::Ordering::Equal => {
                        hits += 1;
                        i += 1;
                        j += 1;
                    }
                    std::cmp::Ordering::Less => i += 1,
                    std::cmp::Ordering::Greater => j += 1,
                }
            }
            self.e_n[n] = 2 * hits - checks.len() as i64;
        }
    }
}

impl BitFlip for Gallager<'_> {
    fn flip(&mut self, syndrome: &SparseVector, codeword: &SparseVector) -> (SparseVector, bool) {
        if syndrome.is_zero() {
            return (codeword.clone(), true);
        }
        self.ensure_cache();
        self.next_e(syndrome);
        let n = arg_max_int(&self.e_n);
        let mut next = codeword.clone();
        next.flip(n);
        (next, false)
    }

    fn reset(&mut self) {
        // No per-codeword state; E is recomputed from scratch each round.
    }
}

/// DWBF-F, after Chang and Su, "Dynamic Weighted Bit-Flipping Decoding
/// Algorithms for LDPC Codes": a reliability weight per edge feeds the
/// flipping function and is re-derived from the flipping function after
/// every flip.
///
/// `alpha` must lie strictly between 0 and 1; `eta` is the reliability
/// threshold, usually 0.
pub struct Dwbf<'a> {
    alpha: f64,
    eta: f64,
    h: &'a SparseMatrix,
    original: Option<SparseVector>,
    reliability: Option<DMatrix<f64>>,
    e_n: Vec<f64>,
    row_cache: Option<Vec<Vec<usize>>>,
    column_cache: Option<Vec<Vec<usize>>>,
}

impl<'a> Dwbf<'a> {
    pub fn new(h: &'a SparseMatrix, alpha: f64, eta: f64) -> Self {
        Self {
            alpha,
            eta,
            h,
            original: None,
            reliability: None,
            e_n: Vec::new(),
            row_cache: None,
            column_cache: None,
        }
    }

    fn init(&mut self, codeword: &SparseVector) {
        assert!(
            self.alpha > 0.0 && self.alpha < 1.0,
            "0 < alpha < 1 is required but found {}",
            self.alpha
        );
        let (rows, cols) = self.h.dims();
        self.original = Some(codeword.clone());
        self.reliability = Some(DMatrix::from_element(rows, cols, 1.0));
        self.e_n = vec![0.0; cols];
        if self.row_cache.is_none() {
            self.row_cache = Some((0..rows).map(|m| self.h.row(m).support().to_vec()).collect());
        }
        if self.column_cache.is_none() {
            self.column_cache = Some((0..cols).map(|n| self.h.column_support(n)).collect());
        }
    }

    /// E[n] = −(1−2z_n)(1−2c_n) − α·Σ_{m∈M(n)} (1−2s_m)·r[m,n], the sum
    /// taken by merging the column support with the non-zero syndrome rows.
    fn next_e(&mut self, syndrome: &SparseVector, codeword: &SparseVector) {
        let original = self.original.as_ref().expect("initialized before use");
        let reliability = self.reliability.as_ref().expect("initialized before use");
        let column_cache = self.column_cache.as_ref().expect("initialized before use");
        let unsatisfied = syndrome.support();
        for (n, checks) in column_cache.iter().enumerate() {
            let mut sum = 0.0;
            let mut j = 0;
            for &m in checks {
                while j < unsatisfied.len() && unsatisfied[j] < m {
                    j += 1;
                }
                if j < unsatisfied.len() && unsatisfied[j] == m {
                    sum -= reliability[(m, n)];
                } else {
                    sum += reliability[(m, n)];
                }
            }
            let hard = (1 - 2 * i64::from(original.at(n))) * (1 - 2 * i64::from(codeword.at(n)));
            self.e_n[n] = -(hard as f64) - self.alpha * sum;
        }
    }

    /// r[m,n] = min over the other symbols of check m of max(−E − η, 0).
    fn next_reliability(&mut self) {
        let reliability = self.reliability.as_mut().expect("initialized before use");
        let row_cache = self.row_cache.as_ref().expect("initialized before use");
        let (rows, cols) = (reliability.nrows(), reliability.ncols());
        for m in 0..rows {
            for n in 0..cols {
                let mut min = 0.0;
                let mut found = false;
                for &n1 in &row_cache[m] {
                    if n1 == n {
                        continue;
                    }
                    let v = threshold(-self.e_n[n1], self.eta);
                    if !found || min > v {
                        min = v;
                        found = true;
                    }
                }
                reliability[(m, n)] = min;
            }
        }
    }
}

impl BitFlip for Dwbf<'_> {
    fn flip(&mut self, syndrome: &SparseVector, codeword: &SparseVector) -> (SparseVector, bool) {
        if syndrome.is_zero() {
            return (codeword.clone(), true);
        }
        if self.original.is_none() || self.reliability.is_none() {
            self.init(codeword);
        }
        self.next_e(syndrome, codeword);
        let n = arg_max_float(&self.e_n);
        for e in &mut self.e_n {
            *e = -*e;
        }
        let mut next = codeword.clone();
        next.flip(n);
        self.next_reliability();
        (next, false)
    }

    fn reset(&mut self) {
        self.original = None;
        self.reliability = None;
    }
}

fn threshold(value: f64, eta: f64) -> f64 {
    if value >= eta {
        value - eta
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hamming_7_4() -> SparseMatrix {
        SparseMatrix::from_dense(
            3,
            7,
            &[1, 0, 0, 1, 1, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 1],
        )
    }

    #[test]
    fn gallager_fixes_any_single_bit_error() {
        let h = hamming_7_4();
        let codeword = SparseVector::from_bits(&[0, 0, 0, 1, 0, 1, 1]);
        assert!(h.mul_vector(&codeword).is_zero());
        for flipped in 0..7 {
            let mut alg = Gallager::new(&h);
            let mut received = codeword.clone();
            received.flip(flipped);
            let fixed = bit_flipping(&mut alg, &h, &received, 20);
            assert_eq!(fixed, codeword, "failed to fix a flip of bit {flipped}");
        }
    }

    #[test]
    fn dwbf_fixes_any_single_bit_error() {
        let h = hamming_7_4();
        let codeword = SparseVector::from_bits(&[0, 0, 0, 1, 0, 1, 1]);
        for flipped in 0..7 {
            let mut alg = Dwbf::new(&h, 0.5, 0.0);
            let mut received = codeword.clone();
            received.flip(flipped);
            let fixed = bit_flipping(&mut alg, &h, &received, 20);
            assert_eq!(fixed, codeword, "failed to fix a flip of bit {flipped}");
        }
    }

    #[test]
    fn dwbf_is_idempotent_on_codewords() {
        let h = hamming_7_4();
        let codeword = SparseVector::from_bits(&[0, 0, 0, 1, 0, 1, 1]);
        let mut alg = Dwbf::new(&h, 0.5, 0.0);
        let result = bit_flipping(&mut alg, &h, &codeword, 20);
        assert_eq!(result, codeword);
    }

    #[test]
    #[should_panic(expected = "0 < alpha < 1")]
    fn dwbf_rejects_alpha_out_of_range() {
        let h = hamming_7_4();
        // A non-codeword so the decoder actually initializes.
        let received = SparseVector::from_bits(&[1, 0, 0, 0, 0, 0, 0]);
        let mut alg = Dwbf::new(&h, 1.5, 0.0);
        bit_flipping(&mut alg, &h, &received, 5);
    }

    #[test]
    fn reset_clears_codeword_state() {
        let h = hamming_7_4();
        let codeword = SparseVector::from_bits(&[0, 0, 0, 1, 0, 1, 1]);
        let mut alg = Dwbf::new(&h, 0.5, 0.0);
        for flipped in [1, 4] {
            alg.reset();
            let mut received = codeword.clone();
            received.flip(flipped);
            assert_eq!(bit_flipping(&mut alg, &h, &received, 20), codeword);
        }
    }
}
