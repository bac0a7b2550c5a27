//! Persistence of codes and simulation results, plus the channel-simulation
//! runners that wire a stored code to the benchmark harness.
//!
//! Two artefacts round-trip as JSON: the code itself (H with its systematic
//! companion) and per-decoder result files keyed by channel error
//! probability. A result file is bound to its decoder by a type tag and to
//! its code by the MD5 digest of H's canonical string form; either mismatch
//! refuses the load.

use crate::bec::ErasureBit;
use crate::benchmark::{self, Stats};
use crate::cancel::CancelToken;
use crate::error::SimulationError;
use crate::linearblock::LinearBlock;
use crate::random::seeded_thread_rng;
use crate::sparse::{SparseMatrix, SparseVector};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Message sizes up to this many bits are swept exhaustively by trial index;
/// larger codes draw seeded-random messages.
const EXHAUSTIVE_MESSAGE_BITS: usize = 30;

/// The decoders result files can belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderKind {
    BscGallager,
    BscDwbf,
    BecPeeling,
}

impl DecoderKind {
    pub fn type_info(self) -> &'static str {
        match self {
            DecoderKind::BscGallager => "BSC:harddecision/Gallager",
            DecoderKind::BscDwbf => "BSC:harddecision/DWBF-F",
            DecoderKind::BecPeeling => "BEC:iterative/Peeling",
        }
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.type_info())
    }
}

/// A result artefact: which decoder produced it, which code it belongs to,
/// and the per-probability statistics (keys are the probabilities formatted
/// as strings).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    #[serde(rename = "TypeInfo")]
    pub type_info: String,
    #[serde(rename = "ECCInfo")]
    pub ecc_info: String,
    #[serde(rename = "Stats")]
    pub stats: BTreeMap<String, Stats>,
}

impl SimulationStats {
    pub fn new(kind: DecoderKind, block: &LinearBlock) -> Self {
        Self {
            type_info: kind.type_info().to_string(),
            ecc_info: md5_digest(block.parity()),
            stats: BTreeMap::new(),
        }
    }

    fn key(probability: f64) -> String {
        format!("{probability}")
    }

    pub fn stats_for(&self, probability: f64) -> Option<&Stats> {
        self.stats.get(&Self::key(probability))
    }

    pub fn set_stats(&mut self, probability: f64, stats: Stats) {
        self.stats.insert(Self::key(probability), stats);
    }

    /// Refuses results that belong to another decoder or another code.
    pub fn validate_against(
        &self,
        kind: DecoderKind,
        h: &SparseMatrix,
    ) -> Result<(), SimulationError> {
        if self.type_info != kind.type_info() {
            return Err(SimulationError::TypeMismatch {
                expected: kind.type_info().to_string(),
                found: self.type_info.clone(),
            });
        }
        let digest = md5_digest(h);
        if self.ecc_info != digest {
            return Err(SimulationError::CodeMismatch {
                expected: digest,
                found: self.ecc_info.clone(),
            });
        }
        Ok(())
    }
}

/// MD5 hex digest of the canonical (dense digit rows) string form of H.
pub fn md5_digest(h: &SparseMatrix) -> String {
    hex::encode(Md5::digest(h.to_string().as_bytes()))
}

pub fn load_code(path: &Path) -> Result<LinearBlock, SimulationError> {
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

pub fn save_code(path: &Path, block: &LinearBlock, overwrite: bool) -> Result<(), SimulationError> {
    check_file_writable(path, overwrite)?;
    fs::write(path, serde_json::to_vec(block)?)?;
    Ok(())
}

/// Loads a result artefact; a missing file is not an error, just `None`.
pub fn load_results(path: &Path) -> Result<Option<SimulationStats>, SimulationError> {
    if !path.try_exists()? {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&fs::read(path)?)?))
}

pub fn save_results(path: &Path, results: &SimulationStats) -> Result<(), SimulationError> {
    fs::write(path, serde_json::to_vec(results)?)?;
    Ok(())
}

/// Copies an existing non-empty file to a uuid-suffixed backup before it
/// gets overwritten, unless overwriting was explicitly allowed.
pub fn check_file_writable(path: &Path, overwrite: bool) -> Result<(), SimulationError> {
    if !overwrite && path.try_exists()? && fs::metadata(path)?.len() > 0 {
        fs::copy(path, format!("{}-backup-{}", path.display(), Uuid::new_v4()))?;
    }
    Ok(())
}

/// Messages for trial `trial`: exhaustive for small codes, seeded-random
/// otherwise.
fn trial_message(message_length: usize, trial: usize) -> SparseVector {
    let mut message = SparseVector::zero(message_length);
    if message_length <= EXHAUSTIVE_MESSAGE_BITS {
        let target = trial % ((1usize << message_length) - 1);
        for i in 0..message_length {
            if target & (1 << i) != 0 {
                message.set(i, 1);
            }
        }
        return message;
    }
    benchmark::random_message(message_length, &mut seeded_thread_rng())
}

/// Runs a binary symmetric channel simulation of `block` at one crossover
/// probability: ⌊p·n⌋ random bit flips per trial, repaired by `repair`,
/// scored by the error fractions left in the codeword, the decoded message,
/// and the parity symbols.
#[allow(clippy::too_many_arguments)]
pub fn run_bsc<R>(
    cancel: &CancelToken,
    block: &LinearBlock,
    crossover_probability: f64,
    trials: usize,
    threads: usize,
    repair: R,
    previous: Stats,
    checkpoint: Option<&mut dyn FnMut(&Stats)>,
) -> Stats
where
    R: Fn(&SparseVector, &SparseVector) -> SparseVector + Sync,
{
    let n = block.codeword_length();
    let k = block.message_length();
    let m = block.parity_symbols();
    benchmark::benchmark_bsc(
        cancel,
        trials,
        threads,
        |trial| trial_message(k, trial),
        |message| block.encode(message),
        move |codeword| {
            let count = (crossover_probability * n as f64) as usize;
            benchmark::random_flip_bit_count(codeword, count, &mut seeded_thread_rng())
        },
        repair,
        |message, codeword, repaired| {
            let codeword_errors = codeword.hamming_distance(repaired);
            let decoded = block.decode(repaired);
            let message_errors = decoded.hamming_distance(message);
            let parity_errors = codeword_errors - message_errors;
            (
                codeword_errors as f64 / n as f64,
                message_errors as f64 / k as f64,
                parity_errors as f64 / m as f64,
            )
        },
        checkpoint,
        previous,
    )
}

/// Runs a binary erasure channel simulation of `block` at one erasure
/// probability: ⌊p·n⌋ random erasures per trial, scored by the erasures the
/// decoder failed to resolve.
#[allow(clippy::too_many_arguments)]
pub fn run_bec<R>(
    cancel: &CancelToken,
    block: &LinearBlock,
    erasure_probability: f64,
    trials: usize,
    threads: usize,
    repair: R,
    previous: Stats,
    checkpoint: Option<&mut dyn FnMut(&Stats)>,
) -> Stats
where
    R: Fn(&Vec<ErasureBit>, &Vec<ErasureBit>) -> Vec<ErasureBit> + Sync,
{
    let n = block.codeword_length();
    let k = block.message_length();
    let m = block.parity_symbols();
    benchmark::benchmark_bec(
        cancel,
        trials,
        threads,
        |trial| trial_message(k, trial),
        |message| block.encode_erasure(message),
        move |codeword| {
            let count = (erasure_probability * n as f64) as usize;
            benchmark::random_erase_count(codeword, count, &mut seeded_thread_rng())
        },
        repair,
        |_message, _codeword, repaired| {
            let codeword_errors = benchmark::erased_count(repaired);
            let decoded = block.decode_erasure(repaired);
            let message_errors = benchmark::erased_count(&decoded);
            let parity_errors = codeword_errors - message_errors;
            (
                codeword_errors as f64 / n as f64,
                message_errors as f64 / k as f64,
                parity_errors as f64 / m as f64,
            )
        },
        checkpoint,
        previous,
    )
}
