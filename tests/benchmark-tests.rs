use linearblock::bec::{self, Peeling};
use linearblock::benchmark::{self, Stats};
use linearblock::cancel::CancelToken;
use linearblock::hamming;
use linearblock::harddecision::{bit_flipping, Gallager};
use linearblock::linearblock::LinearBlock;
use linearblock::random::seeded_thread_rng;
use linearblock::simulation;
use linearblock::sparse::SparseVector;

fn hamming_block() -> LinearBlock {
    hamming::new(&CancelToken::new(), 3, 0).unwrap()
}

fn indexed_message(trial: usize) -> SparseVector {
    let t = trial % 16;
    SparseVector::from_bits(&[
        (t & 1) as u8,
        ((t >> 1) & 1) as u8,
        ((t >> 2) & 1) as u8,
        ((t >> 3) & 1) as u8,
    ])
}

#[test]
fn bsc_single_flip_trials_all_repair() {
    let block = hamming_block();
    let cancel = CancelToken::new();
    let stats = benchmark::benchmark_bsc(
        &cancel,
        500,
        2,
        indexed_message,
        |message| block.encode(message),
        |codeword| benchmark::random_flip_bit_count(codeword, 1, &mut seeded_thread_rng()),
        |_original, received| {
            let mut alg = Gallager::new(block.parity());
            bit_flipping(&mut alg, block.parity(), received, 50)
        },
        |message, codeword, repaired| {
            let codeword_errors = codeword.hamming_distance(repaired);
            let message_errors = block.decode(repaired).hamming_distance(message);
            (
                codeword_errors as f64 / block.codeword_length() as f64,
                message_errors as f64 / block.message_length() as f64,
                (codeword_errors - message_errors) as f64 / block.parity_symbols() as f64,
            )
        },
        None,
        Stats::default(),
    );
    assert_eq!(stats.trials(), 500);
    assert_eq!(stats.codeword_errors.mean, 0.0);
    assert_eq!(stats.message_errors.mean, 0.0);
    assert_eq!(stats.parity_errors.mean, 0.0);
}

#[test]
fn bec_double_erasure_trials_all_repair() {
    let block = hamming_block();
    let cancel = CancelToken::new();
    let stats = benchmark::benchmark_bec(
        &cancel,
        500,
        2,
        indexed_message,
        |message| block.encode_erasure(message),
        |codeword| benchmark::random_erase_count(codeword, 2, &mut seeded_thread_rng()),
        |_original, received| {
            let mut alg = Peeling::new(block.parity());
            bec::flipping(&mut alg, received)
        },
        |_message, _codeword, repaired| {
            let codeword_errors = benchmark::erased_count(repaired);
            let message_errors = benchmark::erased_count(&block.decode_erasure(repaired));
            (
                codeword_errors as f64 / block.codeword_length() as f64,
                message_errors as f64 / block.message_length() as f64,
                (codeword_errors - message_errors) as f64 / block.parity_symbols() as f64,
            )
        },
        None,
        Stats::default(),
    );
    assert_eq!(stats.trials(), 500);
    assert_eq!(stats.codeword_errors.mean, 0.0);
}

#[test]
fn bpsk_strong_signal_rarely_errors() {
    let block = hamming_block();
    let cancel = CancelToken::new();
    let stats = benchmark::benchmark_bpsk(
        &cancel,
        500,
        2,
        indexed_message,
        |message| benchmark::bits_to_bpsk(&block.encode(message)),
        |codeword| benchmark::random_noise_bpsk(codeword, 8.0, &mut seeded_thread_rng()),
        |_original, received| {
            let hard = benchmark::bpsk_to_bits(received, 0.0);
            let mut alg = Gallager::new(block.parity());
            let fixed = bit_flipping(&mut alg, block.parity(), &hard, 20);
            benchmark::bits_to_bpsk(&fixed)
        },
        |message, codeword, repaired| {
            let codeword_errors = benchmark::hamming_distance_bpsk(codeword, repaired);
            let decoded = block.decode(&benchmark::bpsk_to_bits(repaired, 0.0));
            let message_errors = decoded.hamming_distance(message);
            (
                codeword_errors as f64 / block.codeword_length() as f64,
                message_errors as f64 / block.message_length() as f64,
                (codeword_errors.saturating_sub(message_errors)) as f64
                    / block.parity_symbols() as f64,
            )
        },
        None,
        Stats::default(),
    );
    assert_eq!(stats.trials(), 500);
    // At E_b/N_0 = 8 a double bit error inside one 7-bit codeword is
    // vanishingly rare, and single errors are always repaired.
    assert!(stats.codeword_errors.mean < 0.01);
}

#[test]
fn run_bsc_resumes_from_previous_stats() {
    let block = hamming_block();
    let cancel = CancelToken::new();
    let repair = |_original: &SparseVector, received: &SparseVector| {
        let mut alg = Gallager::new(block.parity());
        bit_flipping(&mut alg, block.parity(), received, 20)
    };
    let first = simulation::run_bsc(&cancel, &block, 0.1, 200, 2, &repair, Stats::default(), None);
    assert_eq!(first.trials(), 200);
    assert_eq!(first.codeword_errors.mean, 0.0);

    let unchanged = simulation::run_bsc(&cancel, &block, 0.1, 200, 2, &repair, first.clone(), None);
    assert_eq!(unchanged, first);

    let extended = simulation::run_bsc(&cancel, &block, 0.1, 300, 2, &repair, first, None);
    assert_eq!(extended.trials(), 300);
}

#[test]
fn run_bec_repairs_single_erasures() {
    let block = hamming_block();
    let cancel = CancelToken::new();
    let repair = |_original: &Vec<bec::ErasureBit>, received: &Vec<bec::ErasureBit>| {
        let mut alg = Peeling::new(block.parity());
        bec::flipping(&mut alg, received)
    };
    // p = 0.15 erases exactly one of the 7 symbols per trial.
    let stats = simulation::run_bec(&cancel, &block, 0.15, 200, 2, &repair, Stats::default(), None);
    assert_eq!(stats.trials(), 200);
    assert_eq!(stats.codeword_errors.mean, 0.0);
}

#[test]
fn cancelled_benchmark_keeps_previous_stats_consistent() {
    let block = hamming_block();
    let cancel = CancelToken::new();
    cancel.cancel();
    let repair = |_original: &SparseVector, received: &SparseVector| received.clone();
    let stats = simulation::run_bsc(&cancel, &block, 0.1, 100, 2, &repair, Stats::default(), None);
    // Every trial observed the cancellation before running.
    assert_eq!(stats.trials(), 0);
}
