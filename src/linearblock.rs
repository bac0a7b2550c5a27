//! The linear block code product: a parity-check matrix H, the column
//! permutation taking codewords to systematic order, and the systematic
//! generator G with G·Hᵀ = 0.

use crate::bec::ErasureBit;
use crate::cancel::CancelToken;
use crate::error::BuildError;
use crate::gauss::{self, gaussian_jordan_gf2};
use crate::sparse::{SparseMatrix, SparseVector};
use log::debug;
use serde::{Deserialize, Serialize};

/// The systematic companion data of a parity-check matrix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Systematic {
    #[serde(rename = "HColumnOrder")]
    column_order: Vec<usize>,
    #[serde(rename = "G")]
    generator: SparseMatrix,
}

impl Systematic {
    #[inline]
    pub fn column_order(&self) -> &[usize] {
        &self.column_order
    }

    #[inline]
    pub fn generator(&self) -> &SparseMatrix {
        &self.generator
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearBlock {
    #[serde(rename = "H")]
    parity: SparseMatrix,
    #[serde(rename = "Processing")]
    processing: Systematic,
}

impl LinearBlock {
    #[inline]
    pub fn parity(&self) -> &SparseMatrix {
        &self.parity
    }

    #[inline]
    pub fn processing(&self) -> &Systematic {
        &self.processing
    }

    /// Number of message bits k.
    pub fn message_length(&self) -> usize {
        self.processing.generator.dims().0
    }

    /// Number of parity checks m.
    pub fn parity_symbols(&self) -> usize {
        self.parity.dims().0
    }

    /// Number of code symbols n.
    pub fn codeword_length(&self) -> usize {
        self.parity.dims().1
    }

    pub fn code_rate(&self) -> f64 {
        self.message_length() as f64 / self.codeword_length() as f64
    }

    /// Encodes a k-bit message into an n-bit codeword.
    ///
    /// Panics if the message length is wrong: that is a caller bug.
    pub fn encode(&self, message: &SparseVector) -> SparseVector {
        let k = self.message_length();
        assert_eq!(
            message.len(),
            k,
            "message length {} required but found {}",
            k,
            message.len()
        );
        let systematic_codeword = self.processing.generator.vector_mul(message);
        to_non_systematic(&systematic_codeword, &self.processing.column_order)
    }

    /// Encodes for a binary erasure channel: the codeword with every bit
    /// known.
    pub fn encode_erasure(&self, message: &SparseVector) -> Vec<ErasureBit> {
        let codeword = self.encode(message);
        (0..codeword.len())
            .map(|i| ErasureBit::from_bit(codeword.at(i)))
            .collect()
    }

    /// Extracts the message from a codeword.
    pub fn decode(&self, codeword: &SparseVector) -> SparseVector {
        assert_eq!(
            codeword.len(),
            self.codeword_length(),
            "codeword length {} required but found {}",
            self.codeword_length(),
            codeword.len()
        );
        to_systematic(codeword, &self.processing.column_order).slice(0, self.message_length())
    }

    /// Extracts the message symbols from an erasure-channel codeword;
    /// unresolved erasures stay erased.
    pub fn decode_erasure(&self, codeword: &[ErasureBit]) -> Vec<ErasureBit> {
        assert_eq!(
            codeword.len(),
            self.codeword_length(),
            "codeword length {} required but found {}",
            self.codeword_length(),
            codeword.len()
        );
        let mut systematic = to_systematic_erasure(codeword, &self.processing.column_order);
        systematic.truncate(self.message_length());
        systematic
    }

    /// s = H·cᵀ; zero exactly when `codeword` is in the code.
    pub fn syndrome(&self, codeword: &SparseVector) -> SparseVector {
        self.parity.mul_vector(codeword)
    }

    /// Checks G·Hᵀ = 0 over the systematically ordered H.
    pub fn validate(&self) -> bool {
        gauss::validate_hg(
            &self.processing.generator,
            &gauss::column_swapped(&self.parity, &self.processing.column_order),
        )
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Derives the systematic companion of `h` and packages the pair.
///
/// Row-reduces `h` with column pivoting, checks the reduced matrix leads
/// with an identity block, reads off A from [I‖A], and forms G = [Iₖ‖Aᵀ].
/// For full-rank `h` the stored parity matrix is `h` itself and the column
/// order is rotated so that applying it to `h` row-reduces to [A‖I] — the
/// message symbols come first. When `h` has dependent rows, the effective
/// parity-check matrix [A‖I] with rank rows replaces it and the order is
/// trivial; the row space is preserved.
pub fn systematic(
    cancel: &CancelToken,
    h: &SparseMatrix,
    threads: usize,
) -> Result<LinearBlock, BuildError> {
    debug!("creating generator matrix from H matrix");
    let reduction = gaussian_jordan_gf2(cancel, h, threads)?;
    let (rank, n) = reduction.matrix.dims();

    debug!("validating row reduced matrix");
    for i in 0..rank {
        let mut leading = reduction
            .matrix
            .row(i)
            .support()
            .iter()
            .take_while(|&&c| c < rank);
        if leading.next() != Some(&i) || leading.next().is_some() {
            return Err(BuildError::NotSystematic);
        }
    }

    debug!("extracting A matrix from row reduced matrix");
    let k = n - rank;
    let a = reduction.matrix.slice(0, rank, rank, k);

    debug!("creating generator matrix");
    let mut generator = SparseMatrix::zero(k, n);
    for i in 0..k {
        generator.set(i, i, 1);
    }
    for j in 0..rank {
        for &i in a.row(j).support() {
            generator.set(i, k + j, 1);
        }
    }
    debug!("generator matrix complete");

    let (h_rows, _) = h.dims();
    let block = if rank == h_rows {
        // Rotate the pivot columns to the tail so the permutation sends H to
        // [A | I] and message symbols lead the codeword.
        let mut column_order = Vec::with_capacity(n);
        column_order.extend_from_slice(&reduction.column_order[rank..]);
        column_order.extend_from_slice(&reduction.column_order[..rank]);
        LinearBlock {
            parity: h.clone(),
            processing: Systematic {
                column_order,
                generator,
            },
        }
    } else {
        let mut parity = SparseMatrix::zero(rank, n);
        for j in 0..rank {
            for &i in a.row(j).support() {
                parity.set(j, i, 1);
            }
            parity.set(j, k + j, 1);
        }
        LinearBlock {
            parity,
            processing: Systematic {
                column_order: (0..n).collect(),
                generator,
            },
        }
    };
    Ok(block)
}

/// Scatters a systematic codeword back to transmitted order:
/// `result[ordering[i]] = codeword[i]`.
pub fn to_non_systematic(codeword: &SparseVector, ordering: &[usize]) -> SparseVector {
    assert_eq!(
        codeword.len(),
        ordering.len(),
        "vector length must equal ordering length"
    );
    let mut result = SparseVector::zero(codeword.len());
    for &i in codeword.support() {
        result.set(ordering[i], 1);
    }
    result
}

/// Gathers a transmitted codeword into systematic order:
/// `result[i] = codeword[ordering[i]]`.
pub fn to_systematic(codeword: &SparseVector, ordering: &[usize]) -> SparseVector {
    assert_eq!(
        codeword.len(),
        ordering.len(),
        "vector length must equal ordering length"
    );
    let mut result = SparseVector::zero(codeword.len());
    for (i, &source) in ordering.iter().enumerate() {
        if codeword.at(source) == 1 {
            result.set(i, 1);
        }
    }
    result
}

pub fn to_non_systematic_erasure(codeword: &[ErasureBit], ordering: &[usize]) -> Vec<ErasureBit> {
    assert_eq!(
        codeword.len(),
        ordering.len(),
        "vector length must equal ordering length"
    );
    let mut result = vec![ErasureBit::Zero; codeword.len()];
    for (i, &bit) in codeword.iter().enumerate() {
        result[ordering[i]] = bit;
    }
    result
}

pub fn to_systematic_erasure(codeword: &[ErasureBit], ordering: &[usize]) -> Vec<ErasureBit> {
    assert_eq!(
        codeword.len(),
        ordering.len(),
        "vector length must equal ordering length"
    );
    ordering.iter().map(|&source| codeword[source]).collect()
}
