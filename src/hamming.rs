//! Systematic Hamming codes.

use crate::cancel::CancelToken;
use crate::error::SearchError;
use crate::linearblock::{systematic, LinearBlock};
use crate::sparse::DokMatrix;

/// Creates the Hamming code with `parity_symbols` parity symbols: codeword
/// length 2^p − 1, message length 2^p − 1 − p. The columns of H are the
/// binary expansions of 1..=n, so every single-bit error has a distinct
/// syndrome; the code corrects one bit error or detects two.
pub fn new(
    cancel: &CancelToken,
    parity_symbols: usize,
    threads: usize,
) -> Result<LinearBlock, SearchError> {
    if parity_symbols < 3 {
        return Err(SearchError::InvalidParameter(
            "hamming codes require >= 3 parity symbols".to_string(),
        ));
    }
    let n = (1usize << parity_symbols) - 1;
    let mut h = DokMatrix::zero(parity_symbols, n);
    for i in 1..=n {
        for j in 0..parity_symbols {
            if i & (1 << j) != 0 {
                h.set(j, i - 1, 1);
            }
        }
    }
    Ok(systematic(cancel, &h.to_csr(), threads)?)
}
