//! Gallager's random LDPC construction.
//!
//! H is wc stacked K×N bands (K = m/wc, N = m/wc·wr). The first band carries
//! wr consecutive ones per row; each further band is a random column
//! permutation of it, accepted only while the stack keeps the requested
//! girth and stays full-rank.

use crate::cancel::CancelToken;
use crate::error::{BuildError, Cancelled, SearchError};
use crate::gauss::calculate_rank;
use crate::girth::calculate_girth_lower_bound;
use crate::linearblock::{systematic, LinearBlock};
use crate::sparse::DokMatrix;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

/// Searches for a Gallager LDPC code for a message of `message_bits` bits
/// with column weight `wc`, row weight `wr`, and no cycle shorter than
/// `smallest_cycle_allowed`. Each rejected band consumes one iteration;
/// `Ok(None)` means the budget ran out. The first acceptable H wins.
#[allow(clippy::too_many_arguments)]
pub fn search<R: Rng + ?Sized>(
    cancel: &CancelToken,
    message_bits: usize,
    wc: usize,
    wr: usize,
    smallest_cycle_allowed: usize,
    max_iterations: usize,
    threads: usize,
    rng: &mut R,
) -> Result<Option<LinearBlock>, SearchError> {
    if wc < 3 {
        return Err(SearchError::InvalidParameter(
            "wc must be greater than or equal to 3".to_string(),
        ));
    }
    if wc >= wr {
        return Err(SearchError::InvalidParameter(format!(
            "wc ({wc}) must be less than wr ({wr})"
        )));
    }
    if message_bits % wc != 0 {
        return Err(SearchError::InvalidParameter(format!(
            "wc ({wc}) must divide the message size ({message_bits})"
        )));
    }
    if smallest_cycle_allowed % 2 != 0 {
        return Err(SearchError::InvalidParameter(
            "smallest allowed cycle must be an even number".to_string(),
        ));
    }
    if smallest_cycle_allowed < 4 {
        return Err(SearchError::InvalidParameter(
            "smallest allowed cycle must be at least 4".to_string(),
        ));
    }

    let band_rows = message_bits / wc;
    let n = band_rows * wr;
    let mut first_band = DokMatrix::zero(band_rows, n);
    for i in 0..band_rows {
        let offset = i * wr;
        for col in 0..wr {
            first_band.set(i, col + offset, 1);
        }
    }

    let mut iterations = max_iterations;
    while iterations > 0 {
        if let Some(block) = attempt(
            cancel,
            message_bits,
            n,
            band_rows,
            wc,
            smallest_cycle_allowed,
            threads,
            &first_band,
            &mut iterations,
            rng,
        )? {
            debug!("Gallager H matrix found");
            return Ok(Some(block));
        }
    }
    Ok(None)
}

#[allow(clippy::too_many_arguments)]
fn attempt<R: Rng + ?Sized>(
    cancel: &CancelToken,
    message_bits: usize,
    n: usize,
    band_rows: usize,
    wc: usize,
    smallest_cycle_allowed: usize,
    threads: usize,
    first_band: &DokMatrix,
    iterations: &mut usize,
    rng: &mut R,
) -> Result<Option<LinearBlock>, SearchError> {
    let mut h = DokMatrix::zero(message_bits, n);
    let mut band = 0;
    while band < wc && *iterations > 0 {
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
        *iterations -= 1;
        debug!("iterations remaining {}", *iterations);

        let sub = if band == 0 {
            first_band.clone()
        } else {
            permute_columns(first_band, rng)
        };
        place_band(&mut h, &sub, band);

        // The stack so far must keep the girth and add K independent rows.
        let csr = h.to_csr();
        if let Some(girth) =
            calculate_girth_lower_bound(cancel, &csr, Some(smallest_cycle_allowed), threads)
        {
            if girth < smallest_cycle_allowed {
                continue;
            }
        }
        if calculate_rank(cancel, &csr, threads)? != (band + 1) * band_rows {
            continue;
        }
        band += 1;
    }
    if band != wc {
        return Ok(None);
    }

    match systematic(cancel, &h.to_csr(), threads) {
        Ok(block) => Ok(Some(block)),
        Err(BuildError::Cancelled(cancelled)) => Err(cancelled.into()),
        // A degenerate reduction; let the search try another stack.
        Err(BuildError::NotSystematic) => Ok(None),
    }
}

fn permute_columns<R: Rng + ?Sized>(m: &DokMatrix, rng: &mut R) -> DokMatrix {
    let (rows, cols) = m.dims();
    let mut idx: Vec<usize> = (0..cols).collect();
    idx.shuffle(rng);
    // Column i of the result is column idx[i] of the input.
    let mut destination = vec![0; cols];
    for (i, &source) in idx.iter().enumerate() {
        destination[source] = i;
    }
    let mut result = DokMatrix::zero(rows, cols);
    for r in 0..rows {
        for c in m.row_support(r) {
            result.set(r, destination[c], 1);
        }
    }
    result
}

/// Overwrites band `index` of `h` (rows index·K..(index+1)·K) with `sub`.
fn place_band(h: &mut DokMatrix, sub: &DokMatrix, index: usize) {
    let (band_rows, _) = sub.dims();
    let offset = index * band_rows;
    for r in 0..band_rows {
        h.clear_row(offset + r);
    }
    h.set_matrix(sub, offset, 0);
}
