//! Binary erasure channel symbols and the peeling decoder.

use crate::sparse::SparseMatrix;
use std::collections::BTreeSet;

/// A received symbol on the binary erasure channel: a known bit or an
/// erasure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErasureBit {
    Zero,
    One,
    Erased,
}

impl ErasureBit {
    pub fn from_bit(bit: u8) -> Self {
        if bit & 1 == 1 {
            ErasureBit::One
        } else {
            ErasureBit::Zero
        }
    }

    #[inline]
    pub fn is_erased(self) -> bool {
        self == ErasureBit::Erased
    }
}

/// An erasure-repair capability. `flip` returns the next codeword and
/// whether the decoder is finished with it.
pub trait ErasureDecoder {
    fn flip(&mut self, current: &[ErasureBit]) -> (Vec<ErasureBit>, bool);
}

/// Drives an [`ErasureDecoder`] to completion. The decoder copies its input,
/// so no copy is made here.
pub fn flipping(alg: &mut dyn ErasureDecoder, codeword: &[ErasureBit]) -> Vec<ErasureBit> {
    let (mut result, mut done) = alg.flip(codeword);
    while !done {
        (result, done) = alg.flip(&result);
    }
    result
}

/// The peeling decoder: any parity check with exactly one erased symbol
/// determines that symbol as the XOR of the others. Repeats until no check
/// makes progress. Correct whenever the erasure pattern contains no stopping
/// set; one pass resolves at least one erasure, so the pass count is bounded
/// by the erasure count plus one.
pub struct Peeling<'a> {
    h: &'a SparseMatrix,
    check_to_vars: Option<Vec<Vec<usize>>>,
    var_to_checks: Option<Vec<Vec<usize>>>,
}

impl<'a> Peeling<'a> {
    pub fn new(h: &'a SparseMatrix) -> Self {
        Self {
            h,
            check_to_vars: None,
            var_to_checks: None,
        }
    }

    fn ensure_caches(&mut self) {
        if self.check_to_vars.is_some() {
            return;
        }
        let (rows, cols) = self.h.dims();
        let check_to_vars: Vec<Vec<usize>> =
            (0..rows).map(|i| self.h.row(i).support().to_vec()).collect();
        let mut var_to_checks = vec![Vec::new(); cols];
        for (check, vars) in check_to_vars.iter().enumerate() {
            for &v in vars {
                var_to_checks[v].push(check);
            }
        }
        self.check_to_vars = Some(check_to_vars);
        self.var_to_checks = Some(var_to_checks);
    }
}

impl ErasureDecoder for Peeling<'_> {
    fn flip(&mut self, current: &[ErasureBit]) -> (Vec<ErasureBit>, bool) {
        let (_, cols) = self.h.dims();
        assert_eq!(
            current.len(),
            cols,
            "codeword length {} required but found {}",
            cols,
            current.len()
        );
        self.ensure_caches();
        let check_to_vars = self.check_to_vars.as_ref().expect("cache built above");
        let var_to_checks = self.var_to_checks.as_ref().expect("cache built above");

        let mut result = current.to_vec();
        loop {
            let erased: Vec<usize> = result
                .iter()
                .enumerate()
                .filter(|(_, bit)| bit.is_erased())
                .map(|(i, _)| i)
                .collect();
            if erased.is_empty() {
                return (result, true);
            }
            let mut progress = false;
            let mut visited: BTreeSet<usize> = BTreeSet::new();
            for &v in &erased {
                for &check in &var_to_checks[v] {
                    if !visited.insert(check) {
                        continue;
                    }
                    progress |= peel_check(&mut result, &check_to_vars[check]);
                }
            }
            if !progress {
                return (result, true);
            }
        }
    }
}

/// Resolves the check's single erased symbol if there is exactly one.
fn peel_check(codeword: &mut [ErasureBit], vars: &[usize]) -> bool {
    let mut missing = None;
    let mut parity = 0u8;
    for &v in vars {
        match codeword[v] {
            ErasureBit::Erased => {
                if missing.is_some() {
                    return false;
                }
                missing = Some(v);
            }
            ErasureBit::One => parity ^= 1,
            ErasureBit::Zero => {}
        }
    }
    match missing {
        Some(v) => {
            codeword[v] = ErasureBit::from_bit(parity);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ErasureBit::{Erased, One, Zero};

    #[test]
    fn recovers_three_erasures() {
        let h = SparseMatrix::from_dense(
            4,
            6,
            &[
                1, 1, 0, 1, 0, 0, 0, 1, 1, 0, 1, 0, 1, 0, 0, 0, 1, 1, 0, 0, 1, 1, 0, 1,
            ],
        );
        let mut alg = Peeling::new(&h);
        let received = [Zero, Zero, One, Erased, Erased, Erased];
        let actual = flipping(&mut alg, &received);
        assert_eq!(actual, vec![Zero, Zero, One, Zero, One, One]);
    }

    #[test]
    fn stopping_set_is_left_erased() {
        // Both variables sit in both checks: neither check ever has exactly
        // one erasure.
        let h = SparseMatrix::from_dense(2, 2, &[1, 1, 1, 1]);
        let mut alg = Peeling::new(&h);
        let received = [Erased, Erased];
        let actual = flipping(&mut alg, &received);
        assert_eq!(actual, vec![Erased, Erased]);
    }

    #[test]
    fn clean_codeword_is_untouched() {
        let h = SparseMatrix::from_dense(2, 3, &[1, 1, 0, 0, 1, 1]);
        let mut alg = Peeling::new(&h);
        let received = [One, One, One];
        let (result, done) = alg.flip(&received);
        assert!(done);
        assert_eq!(result, received.to_vec());
    }
}
