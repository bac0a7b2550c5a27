//! Trial-parallel channel benchmarking.
//!
//! One generic trial loop serves the three channel families; they differ
//! only in the codeword type flowing between the caller's collaborators.
//! Trials run on a dedicated pool and report their metric triples over a
//! channel to the calling thread, which performs the Welford updates
//! serially and invokes the checkpoint after each one. The final aggregate
//! is independent of trial completion order.

use crate::avgstd::AvgStd;
use crate::bec::ErasureBit;
use crate::cancel::CancelToken;
use crate::gauss::thread_pool;
use crate::sparse::SparseVector;
use crossbeam_channel::unbounded;
use nalgebra::DVector;
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::thread;

/// Per-trial error fractions: codeword, message, parity.
pub type TrialMetrics = (f64, f64, f64);

/// Running statistics over the per-trial error fractions left after the
/// decoder repaired the channel's damage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub codeword_errors: AvgStd,
    pub message_errors: AvgStd,
    pub parity_errors: AvgStd,
}

impl Stats {
    /// Number of trials folded in so far.
    pub fn trials(&self) -> usize {
        self.codeword_errors.count as usize
    }

    fn update(&mut self, (codeword, message, parity): TrialMetrics) {
        self.codeword_errors.update(codeword);
        self.message_errors.update(message);
        self.parity_errors.update(parity);
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{Codeword:{:.2}(+/-{:.2}), Message:{:.2}(+/-{:.2}), Parity:{:.2}(+/-{:.2})}}",
            self.codeword_errors.mean,
            self.codeword_errors.std_dev(),
            self.message_errors.mean,
            self.message_errors.std_dev(),
            self.parity_errors.mean,
            self.parity_errors.std_dev(),
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn run_trials<W, M, E, C, R, X>(
    cancel: &CancelToken,
    trials: usize,
    threads: usize,
    create_message: &M,
    encode: &E,
    channel: &C,
    repair: &R,
    metrics: &X,
    mut checkpoint: Option<&mut dyn FnMut(&Stats)>,
    previous: Stats,
) -> Stats
where
    M: Fn(usize) -> SparseVector + Sync,
    E: Fn(&SparseVector) -> W + Sync,
    C: Fn(&W) -> W + Sync,
    R: Fn(&W, &W) -> W + Sync,
    X: Fn(&SparseVector, &W, &W) -> TrialMetrics + Sync,
{
    let completed = previous.trials();
    if completed >= trials {
        return previous;
    }
    let mut stats = previous;
    let pool = thread_pool(threads);
    let (tx, rx) = unbounded();
    thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                (completed..trials).into_par_iter().for_each_with(tx, |tx, trial| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let message = create_message(trial);
                    let codeword = encode(&message);
                    let received = channel(&codeword);
                    let repaired = repair(&codeword, &received);
                    tx.send(metrics(&message, &codeword, &repaired)).ok();
                });
            });
        });
        // All senders drop when the trial loop finishes, ending this loop.
        for sample in rx {
            stats.update(sample);
            if let Some(cb) = checkpoint.as_deref_mut() {
                cb(&stats);
            }
        }
    });
    stats
}

/// Benchmarks a binary symmetric channel decoder over `trials` independent
/// trials on `threads` workers (0 means one per CPU). Aggregation resumes
/// from `previous`; if it already covers the trial count it is returned
/// unchanged. The checkpoint observes the aggregate after every trial.
#[allow(clippy::too_many_arguments)]
pub fn benchmark_bsc<M, E, C, R, X>(
    cancel: &CancelToken,
    trials: usize,
    threads: usize,
    create_message: M,
    encode: E,
    channel: C,
    repair: R,
    metrics: X,
    checkpoint: Option<&mut dyn FnMut(&Stats)>,
    previous: Stats,
) -> Stats
where
    M: Fn(usize) -> SparseVector + Sync,
    E: Fn(&SparseVector) -> SparseVector + Sync,
    C: Fn(&SparseVector) -> SparseVector + Sync,
    R: Fn(&SparseVector, &SparseVector) -> SparseVector + Sync,
    X: Fn(&SparseVector, &SparseVector, &SparseVector) -> TrialMetrics + Sync,
{
    run_trials(
        cancel, trials, threads, &create_message, &encode, &channel, &repair, &metrics,
        checkpoint, previous,
    )
}

/// [`benchmark_bsc`] for the binary erasure channel.
#[allow(clippy::too_many_arguments)]
pub fn benchmark_bec<M, E, C, R, X>(
    cancel: &CancelToken,
    trials: usize,
    threads: usize,
    create_message: M,
    encode: E,
    channel: C,
    repair: R,
    metrics: X,
    checkpoint: Option<&mut dyn FnMut(&Stats)>,
    previous: Stats,
) -> Stats
where
    M: Fn(usize) -> SparseVector + Sync,
    E: Fn(&SparseVector) -> Vec<ErasureBit> + Sync,
    C: Fn(&Vec<ErasureBit>) -> Vec<ErasureBit> + Sync,
    R: Fn(&Vec<ErasureBit>, &Vec<ErasureBit>) -> Vec<ErasureBit> + Sync,
    X: Fn(&SparseVector, &Vec<ErasureBit>, &Vec<ErasureBit>) -> TrialMetrics + Sync,
{
    run_trials(
        cancel, trials, threads, &create_message, &encode, &channel, &repair, &metrics,
        checkpoint, previous,
    )
}

/// [`benchmark_bsc`] for BPSK modulation over an AWGN channel.
#[allow(clippy::too_many_arguments)]
pub fn benchmark_bpsk<M, E, C, R, X>(
    cancel: &CancelToken,
    trials: usize,
    threads: usize,
    create_message: M,
    encode: E,
    channel: C,
    repair: R,
    metrics: X,
    checkpoint: Option<&mut dyn FnMut(&Stats)>,
    previous: Stats,
) -> Stats
where
    M: Fn(usize) -> SparseVector + Sync,
    E: Fn(&SparseVector) -> DVector<f64> + Sync,
    C: Fn(&DVector<f64>) -> DVector<f64> + Sync,
    R: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64> + Sync,
    X: Fn(&SparseVector, &DVector<f64>, &DVector<f64>) -> TrialMetrics + Sync,
{
    run_trials(
        cancel, trials, threads, &create_message, &encode, &channel, &repair, &metrics,
        checkpoint, previous,
    )
}

/// A uniformly random message of `len` bits.
pub fn random_message<R: Rng + ?Sized>(len: usize, rng: &mut R) -> SparseVector {
    let mut message = SparseVector::zero(len);
    for i in 0..len {
        if rng.gen::<bool>() {
            message.set(i, 1);
        }
    }
    message
}

/// A random message of `len` bits with Hamming weight exactly `ones`.
pub fn random_message_with_weight<R: Rng + ?Sized>(
    len: usize,
    ones: usize,
    rng: &mut R,
) -> SparseVector {
    assert!(ones <= len, "weight cannot exceed length");
    let mut message = SparseVector::zero(len);
    while message.hamming_weight() < ones {
        message.set(rng.gen_range(0..len), 1);
    }
    message
}

/// Flips `count` distinct random bits (capped at the vector length).
pub fn random_flip_bit_count<R: Rng + ?Sized>(
    input: &SparseVector,
    count: usize,
    rng: &mut R,
) -> SparseVector {
    let mut output = input.clone();
    let mut flips: BTreeSet<usize> = BTreeSet::new();
    while flips.len() < count && flips.len() < input.len() {
        flips.insert(rng.gen_range(0..input.len()));
    }
    for i in flips {
        output.flip(i);
    }
    output
}

/// Erases each position with overall probability `probability` by erasing
/// round(probability · n) distinct positions.
pub fn random_erase<R: Rng + ?Sized>(
    codeword: &[ErasureBit],
    probability: f64,
    rng: &mut R,
) -> Vec<ErasureBit> {
    let count = (probability * codeword.len() as f64).round() as usize;
    random_erase_count(codeword, count, rng)
}

/// Erases `count` distinct random positions (capped at the codeword length).
pub fn random_erase_count<R: Rng + ?Sized>(
    codeword: &[ErasureBit],
    count: usize,
    rng: &mut R,
) -> Vec<ErasureBit> {
    let mut output = codeword.to_vec();
    let mut erased: BTreeSet<usize> = BTreeSet::new();
    while erased.len() < count && erased.len() < codeword.len() {
        erased.insert(rng.gen_range(0..codeword.len()));
    }
    for i in erased {
        output[i] = ErasureBit::Erased;
    }
    output
}

/// The codeword with every bit marked known, for feeding an erasure channel.
pub fn bits_to_erased(codeword: &SparseVector) -> Vec<ErasureBit> {
    (0..codeword.len())
        .map(|i| ErasureBit::from_bit(codeword.at(i)))
        .collect()
}

pub fn erased_count(codeword: &[ErasureBit]) -> usize {
    codeword.iter().filter(|bit| bit.is_erased()).count()
}

/// Maps bits to BPSK symbols: 1 → +1.0, 0 → −1.0.
pub fn bits_to_bpsk(a: &SparseVector) -> DVector<f64> {
    DVector::from_fn(a.len(), |i, _| if a.at(i) == 1 { 1.0 } else { -1.0 })
}

/// Hard-decides BPSK symbols back to bits: values ≥ `boundary` become 1.
pub fn bpsk_to_bits(a: &DVector<f64>, boundary: f64) -> SparseVector {
    let mut result = SparseVector::zero(a.len());
    for i in 0..a.len() {
        if a[i] >= boundary {
            result.set(i, 1);
        }
    }
    result
}

/// Adds white Gaussian noise for the given E_b/N_0: with E_b = 1 the noise
/// deviation is sqrt(1 / (2·E_b/N_0)).
pub fn random_noise_bpsk<R: Rng + ?Sized>(
    bpsk: &DVector<f64>,
    eb_over_n0: f64,
    rng: &mut R,
) -> DVector<f64> {
    let sigma = (1.0 / (2.0 * eb_over_n0)).sqrt();
    DVector::from_fn(bpsk.len(), |i, _| {
        bpsk[i] + sigma * rng.sample::<f64, _>(StandardNormal)
    })
}

/// Bits that differ under the ≥ 0 hard decision.
pub fn hamming_distance_bpsk(a: &DVector<f64>, b: &DVector<f64>) -> usize {
    assert_eq!(a.len(), b.len(), "vector lengths must match");
    (0..a.len())
        .filter(|&i| (a[i] >= 0.0) != (b[i] >= 0.0))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    /// A deterministic noiseless loopback: repair hands back the original.
    fn loopback(trials: usize, threads: usize, previous: Stats) -> Stats {
        benchmark_bsc(
            &CancelToken::new(),
            trials,
            threads,
            |trial| {
                let mut m = SparseVector::zero(8);
                m.set(trial % 8, 1);
                m
            },
            |message| message.clone(),
            |codeword| codeword.clone(),
            |original, _received| original.clone(),
            |_message, codeword, repaired| {
                let errors = codeword.hamming_distance(repaired) as f64;
                (errors / 8.0, errors / 8.0, errors / 8.0)
            },
            None,
            previous,
        )
    }

    #[test]
    fn noiseless_loopback_has_zero_error() {
        let stats = loopback(100, 2, Stats::default());
        assert_eq!(stats.trials(), 100);
        assert_eq!(stats.codeword_errors.mean, 0.0);
        assert_eq!(stats.codeword_errors.sample_variance(), 0.0);
    }

    #[test]
    fn resume_skips_completed_trials() {
        let first = loopback(50, 1, Stats::default());
        let resumed = loopback(50, 1, first.clone());
        assert_eq!(first, resumed);
        let extended = loopback(80, 1, first);
        assert_eq!(extended.trials(), 80);
    }

    #[test]
    fn checkpoint_sees_every_update() {
        let mut seen = 0;
        let mut checkpoint = |stats: &Stats| {
            seen += 1;
            assert!(stats.trials() > 0);
        };
        let stats = benchmark_bsc(
            &CancelToken::new(),
            25,
            2,
            |_| SparseVector::zero(4),
            |message| message.clone(),
            |codeword| codeword.clone(),
            |original, _| original.clone(),
            |_, _, _| (0.0, 0.0, 0.0),
            Some(&mut checkpoint),
            Stats::default(),
        );
        assert_eq!(seen, 25);
        assert_eq!(stats.trials(), 25);
    }

    #[test]
    fn mean_is_independent_of_thread_count() {
        // The per-trial metric depends only on the trial index, so any
        // completion order folds to the same mean.
        let run = |threads| {
            benchmark_bsc(
                &CancelToken::new(),
                64,
                threads,
                |trial| {
                    let mut m = SparseVector::zero(8);
                    if trial % 4 == 0 {
                        m.set(0, 1);
                    }
                    m
                },
                |message| message.clone(),
                |codeword| codeword.clone(),
                |_, received| received.clone(),
                |_, codeword, _| (codeword.hamming_weight() as f64 / 8.0, 0.0, 0.0),
                None,
                Stats::default(),
            )
        };
        let serial = run(1);
        let parallel = run(4);
        assert!((serial.codeword_errors.mean - parallel.codeword_errors.mean).abs() < 1e-12);
        assert!(
            (serial.codeword_errors.sample_variance() - parallel.codeword_errors.sample_variance())
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn random_helpers_respect_counts() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let message = random_message_with_weight(32, 5, &mut rng);
        assert_eq!(message.hamming_weight(), 5);

        let flipped = random_flip_bit_count(&message, 3, &mut rng);
        assert_eq!(message.hamming_distance(&flipped), 3);

        let erased = random_erase_count(&bits_to_erased(&message), 7, &mut rng);
        assert_eq!(erased_count(&erased), 7);
        assert_eq!(erased_count(&random_erase(&erased, 0.0, &mut rng)), 7);
    }

    #[test]
    fn bpsk_round_trip() {
        let bits = SparseVector::from_bits(&[1, 0, 1, 1, 0]);
        let bpsk = bits_to_bpsk(&bits);
        assert_eq!(bpsk_to_bits(&bpsk, 0.0), bits);
        assert_eq!(hamming_distance_bpsk(&bpsk, &bits_to_bpsk(&bits)), 0);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
        // Strong signal: noise at E_b/N_0 = 100 rarely crosses zero.
        let noisy = random_noise_bpsk(&bpsk, 100.0, &mut rng);
        assert_eq!(bpsk_to_bits(&noisy, 0.0), bits);
    }
}
